//! # kvsstore
//!
//! Object-store data path for key-value SSDs:
//! - Order-preserving, size-bounded binary keys for object records
//! - Sparse page engine with lazy, loader-driven materialization
//! - Random-access read / write / zero / truncate / clone over objects
//! - Object store facade persisting pages and metadata to a KV medium
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ObjectStore                           │
//! │           (identity → keys, object cache, omap)             │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │                               │
//!                ▼                               ▼
//!   ┌─────────────────────┐          ┌─────────────────────┐
//!   │     DataObject      │          │      KeyCodec       │
//!   │ (read/write/clone)  │          │ (escape + layouts)  │
//!   └──────────┬──────────┘          └──────────┬──────────┘
//!              │                                │
//!              ▼                                ▼
//!   ┌─────────────────────┐          ┌─────────────────────┐
//!   │       PageSet       │─loader──▶│       Medium        │
//!   │   (sparse pages)    │◀─remover─│  (KV device, ext.)  │
//!   └─────────────────────┘          └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod pages;
pub mod data;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvsError, Result};
pub use config::Config;
pub use data::DataObject;
pub use key::{KeyBuf, ObjectIdentity};
pub use pages::{Page, PageRef, PageSet};
pub use store::{Medium, MemoryMedium, ObjectStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvsstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

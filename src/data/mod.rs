//! Data Module
//!
//! Random-access object contents over sparse pages.
//!
//! ## Responsibilities
//! - read / write / zero over a logical byte address space
//! - truncate with tail scrubbing of the last partial page
//! - cross-object range clone that preserves holes as explicit zeroes
//! - whole-object removal with one remover call per page
//!
//! ## Concurrency
//! A `DataObject` is not internally locked. Each operation assumes
//! exclusive access for its duration (`&mut self`); callers sharing an
//! object across threads wrap it in a lock. Pages handed out during an
//! operation stay alive until it returns, even if the set drops them.

mod object;

pub use object::DataObject;

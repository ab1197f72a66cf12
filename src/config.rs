//! Configuration for kvsstore
//!
//! Centralized configuration with sensible defaults.

use crate::error::{KvsError, Result};

/// Smallest page size accepted by [`Config::validate`]
pub const MIN_PAGE_SIZE: usize = 512;

/// Largest page size accepted by [`Config::validate`]
pub const MAX_PAGE_SIZE: usize = 1024 * 1024;

/// Number of pages addressable per object (data-block index is 16 bits)
pub const MAX_PAGES_PER_OBJECT: u64 = 1 << 16;

/// Main configuration for a kvsstore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Page Configuration
    // -------------------------------------------------------------------------
    /// Size of every page (power of two), shared by all page sets of a store
    pub page_size: usize,

    // -------------------------------------------------------------------------
    // Integrity Configuration
    // -------------------------------------------------------------------------
    /// Verify the CRC32 trailer of every page loaded from the medium
    pub verify_checksums: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 4096,
            verify_checksums: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the configuration describes a usable store
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two() {
            return Err(KvsError::Config(format!(
                "page size {} is not a power of two",
                self.page_size
            )));
        }
        if self.page_size < MIN_PAGE_SIZE || self.page_size > MAX_PAGE_SIZE {
            return Err(KvsError::Config(format!(
                "page size {} outside [{}, {}]",
                self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }

    /// Largest object size addressable with this page size
    pub fn max_object_size(&self) -> u64 {
        self.page_size as u64 * MAX_PAGES_PER_OBJECT
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the page size (must be a power of two)
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Enable or disable page checksum verification on load
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

//! Disk layer configuration
//!
//! Compile-time switches are Cargo features (`gpt`). Runtime limits live in
//! [`DiskConfig`], handed to the registry at construction.

/// Sector size assumed until the controller reports the real one
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Maximum number of registered disks
pub const MAX_DISKS: usize = 8;

/// Maximum number of partitions per disk
pub const MAX_PARTITIONS: usize = 16;

/// Largest sector size the staging buffer is sized for
pub const MAX_SECTOR_SIZE: u32 = 4096;

/// Runtime limits for a [`DiskRegistry`](crate::DiskRegistry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskConfig {
    pub default_sector_size: u32,
    pub max_disks: usize,
    pub max_partitions: usize,
}

impl DiskConfig {
    pub const DEFAULT: Self = Self::new();

    pub const fn new() -> Self {
        Self {
            default_sector_size: DEFAULT_SECTOR_SIZE,
            max_disks: MAX_DISKS,
            max_partitions: MAX_PARTITIONS,
        }
    }

    pub const fn with_max_disks(mut self, max_disks: usize) -> Self {
        self.max_disks = max_disks;
        self
    }

    pub const fn with_max_partitions(mut self, max_partitions: usize) -> Self {
        self.max_partitions = max_partitions;
        self
    }

    pub const fn with_default_sector_size(mut self, sector_size: u32) -> Self {
        self.default_sector_size = sector_size;
        self
    }
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

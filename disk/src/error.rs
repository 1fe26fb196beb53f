//! Error types for disk operations

use core::fmt;

/// Result type for disk operations
pub type Result<T> = core::result::Result<T, DiskError>;

/// Errors that can occur in the disk layer.
///
/// Every variant is also reported through a `log` line at the point where it
/// is raised, so callers that only care about success can drop the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    /// Disk id does not name a registered disk
    NoSuchDisk,

    /// Registry or partition table is full, or the arena could not grow
    AllocationFailed,

    /// Controller reported failure for a sector transfer
    DeviceIo {
        /// First sector of the failed transfer
        lba: u64,
    },

    /// Device info query failed
    InfoFailed,

    /// Controller reported a sector size we cannot address
    InvalidSectorSize(u32),

    /// No partition table loader recognised the disk
    NoPartitionTable,

    /// Request reaches past the end of the device
    OutOfBounds {
        /// Byte offset of the request
        offset: u64,
        /// Byte length of the request
        len: usize,
    },
}

impl DiskError {
    /// Get a human-readable description of the error
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoSuchDisk => "No such disk",
            Self::AllocationFailed => "Allocation failed",
            Self::DeviceIo { .. } => "Device I/O error",
            Self::InfoFailed => "Failed to load the disk information",
            Self::InvalidSectorSize(_) => "Invalid sector size",
            Self::NoPartitionTable => "Failed to load the disk partitions",
            Self::OutOfBounds { .. } => "Request out of bounds",
        }
    }
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceIo { lba } => write!(f, "{} at LBA {}", self.as_str(), lba),
            Self::InvalidSectorSize(size) => write!(f, "{}: {}", self.as_str(), size),
            Self::OutOfBounds { offset, len } => {
                write!(f, "{}: offset={} len={}", self.as_str(), offset, len)
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display_carries_context() {
        assert_eq!(
            DiskError::DeviceIo { lba: 7 }.to_string(),
            "Device I/O error at LBA 7"
        );
        assert_eq!(
            DiskError::OutOfBounds { offset: 1024, len: 3 }.to_string(),
            "Request out of bounds: offset=1024 len=3"
        );
        assert_eq!(DiskError::NoSuchDisk.to_string(), "No such disk");
    }
}

//! Mount layer interface.
//!
//! The VFS decides what a mounted partition looks like; the disk layer only
//! needs to register, find and drop registrations while reconciling. Mount
//! handles hold a [`PartitionId`], never the partition itself.

use core::fmt;

use slab::Slab;

use crate::config::{MAX_DISKS, MAX_PARTITIONS};
use crate::partition::PartitionId;

/// Registration class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountKind {
    /// A partition of a local disk
    Disk,
}

/// Handle to one registration, issued by the mount layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountHandle(pub usize);

impl fmt::Display for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vfs{}", self.0)
    }
}

/// What reconciliation needs from the mount layer.
pub trait Mounts {
    /// Expose `part` through the filesystem layer.
    ///
    /// `None` means the mount layer refused; the partition stays unmounted
    /// and the next sweep tries again.
    fn register(&mut self, kind: MountKind, part: PartitionId) -> Option<MountHandle>;

    /// Drop a registration. Unknown handles are ignored.
    fn unregister(&mut self, handle: MountHandle);

    /// Find the registration for `part`, if any.
    fn lookup(&self, kind: MountKind, part: PartitionId) -> Option<MountHandle>;
}

/// Registration record kept by [`MountTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mount {
    pub kind: MountKind,
    pub partition: PartitionId,
}

/// In-memory mount registry.
///
/// Serves as the VFS registration list until a filesystem layer takes over,
/// and as the mount layer in tests. Storage for `capacity` registrations is
/// taken up front; past that, `register` refuses instead of allocating.
#[derive(Debug)]
pub struct MountTable {
    mounts: Slab<Mount>,
    capacity: usize,
}

impl MountTable {
    /// Room for every partition of every disk at the default limits.
    pub fn new() -> Self {
        Self::with_capacity(MAX_DISKS * MAX_PARTITIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mounts: Slab::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, handle: MountHandle) -> Option<&Mount> {
        self.mounts.get(handle.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MountHandle, &Mount)> {
        self.mounts.iter().map(|(key, mount)| (MountHandle(key), mount))
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Mounts for MountTable {
    fn register(&mut self, kind: MountKind, part: PartitionId) -> Option<MountHandle> {
        if self.mounts.len() >= self.capacity {
            log::warn!(target: "disk", "VFS: Mount table full, not registering {}", part);
            return None;
        }
        let handle = MountHandle(self.mounts.insert(Mount {
            kind,
            partition: part,
        }));
        log::debug!(target: "disk", "VFS: Registered {} as {}", part, handle);
        Some(handle)
    }

    fn unregister(&mut self, handle: MountHandle) {
        if self.mounts.try_remove(handle.0).is_some() {
            log::debug!(target: "disk", "VFS: Unregistered {}", handle);
        }
    }

    fn lookup(&self, kind: MountKind, part: PartitionId) -> Option<MountHandle> {
        self.iter()
            .find(|(_, mount)| mount.kind == kind && mount.partition == part)
            .map(|(handle, _)| handle)
    }
}

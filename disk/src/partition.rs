// Partition information and reconciliation

use alloc::vec::Vec;
use core::fmt;

use slab::Slab;

use crate::disk::DiskId;
use crate::error::{DiskError, Result};
use crate::mount::{MountKind, Mounts};

/// Stable identity of a partition.
///
/// Survives rescans that rediscover the same `(start, length)`. The serial
/// keeps an id of an evicted partition from matching a later one that
/// happens to reuse its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionId {
    pub disk: DiskId,
    slot: usize,
    serial: u32,
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p{}", self.disk, self.slot)
    }
}

/// A contiguous sector range on a disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    id: PartitionId,
    /// First sector
    pub start: u64,
    /// Length in sectors
    pub length: u64,
    available: bool,
}

impl Partition {
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Owning disk (non-owning reference)
    pub fn disk(&self) -> DiskId {
        self.id.disk
    }

    /// Whether the last table pass reported this partition.
    pub fn is_available(&self) -> bool {
        self.available
    }
}

/// What a sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Partitions that were registered with the mount layer
    pub mounted: usize,
    /// Partitions that were dropped
    pub evicted: usize,
    /// Partitions that stayed
    pub kept: usize,
}

/// Partition table for a disk.
///
/// Entries live in a slab so their ids stay put while others come and go;
/// `order` keeps discovery order for iteration. Both are sized for
/// `max_partitions` up front, so an insert within the limit never allocates.
#[derive(Debug)]
pub struct PartitionTable {
    disk: DiskId,
    entries: Slab<Partition>,
    order: Vec<usize>,
    next_serial: u32,
    max_partitions: usize,
}

impl PartitionTable {
    pub fn new(disk: DiskId, max_partitions: usize) -> Self {
        Self {
            disk,
            entries: Slab::with_capacity(max_partitions),
            order: Vec::with_capacity(max_partitions),
            next_serial: 0,
            max_partitions,
        }
    }

    /// Look up `(start, length)` or insert it.
    ///
    /// `available` is applied in both cases. An existing entry keeps its id
    /// and the count does not change.
    pub fn add(&mut self, start: u64, length: u64, available: bool) -> Result<PartitionId> {
        let existing = self.order.iter().copied().find(|&slot| {
            let part = &self.entries[slot];
            part.start == start && part.length == length
        });
        if let Some(slot) = existing {
            let part = &mut self.entries[slot];
            part.available = available;
            return Ok(part.id);
        }

        if self.entries.len() >= self.max_partitions {
            log::warn!(target: "disk", "Disk: ({}) partition table full, dropping {}+{}", self.disk, start, length);
            return Err(DiskError::AllocationFailed);
        }
        self.order
            .try_reserve(1)
            .map_err(|_| DiskError::AllocationFailed)?;

        let entry = self.entries.vacant_entry();
        let id = PartitionId {
            disk: self.disk,
            slot: entry.key(),
            serial: self.next_serial,
        };
        entry.insert(Partition {
            id,
            start,
            length,
            available,
        });
        self.order.push(id.slot);
        self.next_serial = self.next_serial.wrapping_add(1);

        Ok(id)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: PartitionId) -> Option<&Partition> {
        self.entries
            .get(id.slot)
            .filter(|p| p.id == id)
    }

    /// Cursor walk: `None` yields the first partition, an id its successor.
    pub fn next(&self, cursor: Option<PartitionId>) -> Option<PartitionId> {
        let pos = match cursor {
            None => 0,
            Some(id) => {
                self.get(id)?;
                self.order.iter().position(|&slot| slot == id.slot)? + 1
            }
        };
        self.order.get(pos).map(|&slot| self.entries[slot].id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> + '_ {
        self.order.iter().map(|&slot| &self.entries[slot])
    }

    /// Block phase: mark every partition unavailable.
    pub fn block(&mut self) {
        for (_, part) in self.entries.iter_mut() {
            part.available = false;
        }
    }

    /// Sweep phase.
    ///
    /// Available partitions get a mount if they lack one. Unavailable ones
    /// lose their mount and are freed.
    pub fn sweep(&mut self, mounts: &mut dyn Mounts) -> SweepReport {
        let mut report = SweepReport::default();
        let entries = &mut self.entries;
        let disk = self.disk;

        self.order.retain(|&slot| {
            let part = &entries[slot];
            let mount = mounts.lookup(MountKind::Disk, part.id);

            if part.available {
                if mount.is_none() {
                    match mounts.register(MountKind::Disk, part.id) {
                        Some(_) => report.mounted += 1,
                        None => {
                            log::warn!(target: "disk", "Disk: ({}) failed to register partition {}", disk, part.id)
                        }
                    }
                }
                report.kept += 1;
                return true;
            }

            if let Some(handle) = mount {
                mounts.unregister(handle);
            }
            entries.remove(slot);
            report.evicted += 1;
            false
        });

        report
    }

    /// Evict everything, unmounting as needed.
    pub fn clear(&mut self, mounts: &mut dyn Mounts) -> SweepReport {
        self.block();
        self.sweep(mounts)
    }
}

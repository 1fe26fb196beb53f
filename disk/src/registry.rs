// Disk registry - device bookkeeping, scan and I/O entry points

use alloc::boxed::Box;
use alloc::vec::Vec;

use slab::Slab;

use crate::config::DiskConfig;
use crate::controller::{Controller, ControllerDispatch, ControllerKind, DeviceHandle, DiskOp};
use crate::disk::{Disk, DiskId};
use crate::error::{DiskError, Result};
use crate::io::{self, Transfer};
use crate::mount::Mounts;
use crate::partition::{PartitionId, PartitionTable};
use crate::scan::{self, ScanOutcome, TableLoader};
use crate::table::{self, DiskBlockIo};

/// Owner of every disk the kernel knows about.
///
/// Disks live in a slab so a [`DiskId`] stays valid while others are added
/// and removed; `order` keeps registration order for iteration.
pub struct DiskRegistry {
    config: DiskConfig,
    disks: Slab<Disk>,
    order: Vec<usize>,
    next_serial: u32,
    dispatch: ControllerDispatch,
    loaders: Vec<Box<dyn TableLoader>>,
}

impl DiskRegistry {
    pub fn new() -> Self {
        Self::with_config(DiskConfig::DEFAULT)
    }

    pub fn with_config(config: DiskConfig) -> Self {
        Self {
            config,
            disks: Slab::with_capacity(config.max_disks),
            order: Vec::with_capacity(config.max_disks),
            next_serial: 0,
            dispatch: ControllerDispatch::new(),
            loaders: table::default_loaders(),
        }
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    /// Replace the table loaders a rescan tries, in order.
    pub fn set_loaders(&mut self, loaders: Vec<Box<dyn TableLoader>>) {
        self.loaders = loaders;
    }

    pub fn install_controller(&mut self, controller: Box<dyn Controller>) {
        self.dispatch.install(controller);
    }

    pub fn dispatch_mut(&mut self) -> &mut ControllerDispatch {
        &mut self.dispatch
    }

    /// Register a device reported by a controller driver.
    ///
    /// The disk starts unavailable with the default sector size; a
    /// [`scan`](Self::scan) fills in the rest.
    pub fn add(&mut self, controller: ControllerKind, handle: DeviceHandle) -> Result<DiskId> {
        if self.disks.len() >= self.config.max_disks {
            log::error!(target: "disk", "Disk: Registry full, dropping {} device {}", controller, handle);
            return Err(DiskError::AllocationFailed);
        }
        self.order
            .try_reserve(1)
            .map_err(|_| DiskError::AllocationFailed)?;

        let entry = self.disks.vacant_entry();
        let id = DiskId::new(entry.key(), self.next_serial);
        entry.insert(Disk::new(
            id,
            controller,
            handle,
            self.config.default_sector_size,
            self.config.max_partitions,
        ));
        self.order.push(id.slot());
        self.next_serial = self.next_serial.wrapping_add(1);

        log::debug!(
            target: "disk",
            "Disk: Added a new disk device ({} Controller: {} Handle: {})",
            id,
            controller,
            handle
        );
        Ok(id)
    }

    /// Drop a disk, unmounting and freeing its partitions first.
    ///
    /// Returns false if `id` is not registered.
    pub fn remove(&mut self, id: DiskId, mounts: &mut dyn Mounts) -> bool {
        if self.disks.is_empty() || self.get(id).is_none() {
            return false;
        }

        let report = self.disks[id.slot()].partitions.clear(mounts);
        self.order.retain(|&slot| slot != id.slot());
        self.disks.remove(id.slot());

        log::debug!(target: "disk", "Disk: ({}) removed, released {} partitions", id, report.evicted);
        true
    }

    pub fn get(&self, id: DiskId) -> Option<&Disk> {
        find(&self.disks, id).ok()
    }

    fn get_mut(&mut self, id: DiskId) -> Result<&mut Disk> {
        self.disks
            .get_mut(id.slot())
            .filter(|disk| disk.id() == id)
            .ok_or(DiskError::NoSuchDisk)
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    /// Cursor walk: `None` yields the first disk, an id its successor.
    pub fn next(&self, cursor: Option<DiskId>) -> Option<DiskId> {
        let pos = match cursor {
            None => 0,
            Some(id) => {
                self.get(id)?;
                self.order.iter().position(|&slot| slot == id.slot())? + 1
            }
        };
        self.order.get(pos).map(|&slot| self.disks[slot].id())
    }

    pub fn iter(&self) -> Disks<'_> {
        Disks {
            registry: self,
            cursor: None,
            done: false,
        }
    }

    pub fn partitions(&self, id: DiskId) -> Option<&PartitionTable> {
        self.get(id).map(Disk::partitions)
    }

    /// Add or look up a partition outside a rescan.
    pub fn add_partition(
        &mut self,
        id: DiskId,
        start: u64,
        length: u64,
        available: bool,
    ) -> Result<PartitionId> {
        self.get_mut(id)?.partitions.add(start, length, available)
    }

    /// Reload the partition table of `id` and reconcile mounts.
    ///
    /// Should be called if the disk gets modified as well.
    pub fn scan(&mut self, id: DiskId, mounts: &mut dyn Mounts) -> Result<ScanOutcome> {
        let disk = self
            .disks
            .get_mut(id.slot())
            .filter(|disk| disk.id() == id)
            .ok_or(DiskError::NoSuchDisk)?;
        scan::rescan(&mut self.dispatch, disk, &self.loaders, mounts)
    }

    /// Scan every registered disk, returning how many loaded.
    pub fn scan_all(&mut self, mounts: &mut dyn Mounts) -> usize {
        let ids: Vec<DiskId> = self.iter().map(Disk::id).collect();
        let mut loaded = 0;
        for id in ids {
            if self.scan(id, mounts).is_ok() {
                loaded += 1;
            }
        }
        loaded
    }

    /// Controller request against `id`, false for an unknown disk.
    ///
    /// # Panics
    /// When the disk's controller kind has no installed driver.
    pub fn raw(&mut self, id: DiskId, lba: u64, sector_count: u64, op: DiskOp<'_>) -> bool {
        let Ok(disk) = find(&self.disks, id) else {
            log::error!(target: "disk", "Disk: ({}) no such disk", id);
            return false;
        };
        io::raw(&mut self.dispatch, disk, lba, sector_count, op)
    }

    /// Byte-addressed read or write.
    pub fn transfer(&mut self, id: DiskId, offset: u64, xfer: Transfer<'_>) -> Result<()> {
        let disk = find(&self.disks, id)?;
        io::transfer(&mut self.dispatch, disk, offset, xfer)
    }

    pub fn read(&mut self, id: DiskId, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.transfer(id, offset, Transfer::Read(buf))
    }

    pub fn write(&mut self, id: DiskId, offset: u64, buf: &[u8]) -> Result<()> {
        self.transfer(id, offset, Transfer::Write(buf))
    }

    /// `gpt_disk_io` view of a disk for filesystem code.
    pub fn block_io(&mut self, id: DiskId) -> Result<DiskBlockIo<'_>> {
        let disk = find(&self.disks, id)?;
        DiskBlockIo::new(&mut self.dispatch, disk)
    }
}

impl Default for DiskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn find(disks: &Slab<Disk>, id: DiskId) -> Result<&Disk> {
    disks
        .get(id.slot())
        .filter(|disk| disk.id() == id)
        .ok_or(DiskError::NoSuchDisk)
}

/// Iterator over registered disks, driven by [`DiskRegistry::next`].
pub struct Disks<'a> {
    registry: &'a DiskRegistry,
    cursor: Option<DiskId>,
    done: bool,
}

impl<'a> Iterator for Disks<'a> {
    type Item = &'a Disk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.registry.next(self.cursor) {
            Some(id) => {
                self.cursor = Some(id);
                self.registry.get(id)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

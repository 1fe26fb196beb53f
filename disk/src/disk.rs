// Disk device state

use core::fmt;

use crate::controller::{ControllerKind, DeviceHandle, DeviceInfo};
use crate::partition::PartitionTable;
use crate::scan::ScanState;

/// Identity of a registered disk.
///
/// `slot` is the registry arena key, `serial` tells apart disks that reuse
/// a slot after a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiskId {
    slot: usize,
    serial: u32,
}

impl DiskId {
    pub(crate) const fn new(slot: usize, serial: u32) -> Self {
        Self { slot, serial }
    }

    pub(crate) const fn slot(self) -> usize {
        self.slot
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "disk{}.{}", self.slot, self.serial)
    }
}

/// Represents a physical disk device
#[derive(Debug)]
pub struct Disk {
    id: DiskId,
    controller: ControllerKind,
    handle: DeviceHandle,
    sector_size: u32,
    sector_count: u64,
    available: bool,
    state: ScanState,
    pub(crate) partitions: PartitionTable,
}

impl Disk {
    pub(crate) fn new(
        id: DiskId,
        controller: ControllerKind,
        handle: DeviceHandle,
        sector_size: u32,
        max_partitions: usize,
    ) -> Self {
        Self {
            id,
            controller,
            handle,
            sector_size,
            sector_count: 0,
            available: false,
            state: ScanState::Idle,
            partitions: PartitionTable::new(id, max_partitions),
        }
    }

    pub fn id(&self) -> DiskId {
        self.id
    }

    pub fn controller(&self) -> ControllerKind {
        self.controller
    }

    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Capacity in sectors, 0 until the first info query succeeds.
    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    /// Capacity in bytes, `None` while unknown.
    pub fn capacity(&self) -> Option<u64> {
        if self.sector_count == 0 {
            return None;
        }
        self.sector_count.checked_mul(self.sector_size as u64)
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn scan_state(&self) -> ScanState {
        self.state
    }

    pub fn partitions(&self) -> &PartitionTable {
        &self.partitions
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.count()
    }

    pub fn size_mb(&self) -> u64 {
        self.capacity().unwrap_or(0) / (1024 * 1024)
    }

    pub(crate) fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub(crate) fn set_state(&mut self, state: ScanState) {
        self.state = state;
    }

    pub(crate) fn apply_info(&mut self, info: DeviceInfo) {
        self.sector_size = info.sector_size;
        self.sector_count = info.sector_count;
    }
}

//! Rescan orchestration.
//!
//! ```text
//!  Idle ──► Scanning ──┬──► Loaded(Gpt)
//!              │       ├──► Loaded(Mbr)
//!              │       └──► Failed
//!              └─ info query fails ──► Failed
//! ```
//!
//! A rescan blocks every partition, asks the controller for geometry, then
//! offers the disk to each table loader in order. The first loader that
//! recognises the disk wins and its discoveries are committed. The sweep
//! then mounts what is new, leaves what persisted alone and evicts what
//! vanished. When nothing loads, only the block phase has happened.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::config::MAX_SECTOR_SIZE;
use crate::controller::{ControllerDispatch, DeviceInfo, DiskOp};
use crate::disk::Disk;
use crate::error::{DiskError, Result};
use crate::io::{self, Transfer};
use crate::mount::Mounts;
use crate::partition::SweepReport;
use crate::table::block_io::DiskBlockIo;

/// Partition table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Gpt,
    Mbr,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpt => f.write_str("GPT"),
            Self::Mbr => f.write_str("MBR"),
        }
    }
}

/// Where a disk is in its rescan cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Never scanned
    Idle,
    /// Partitions blocked, table not loaded yet
    Scanning,
    /// Table loaded and reconciled
    Loaded(TableKind),
    /// Info query or every loader failed
    Failed,
}

/// Result of a successful rescan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    pub table: TableKind,
    pub sweep: SweepReport,
    pub partitions: usize,
}

/// A partition table format reader.
pub trait TableLoader: Send {
    fn kind(&self) -> TableKind;

    /// Recognise the table on `ctx`'s disk and report every partition with
    /// [`LoadContext::add_partition`].
    ///
    /// Returns false if the disk does not carry this format or it could not
    /// be read. Partitions reported by a loader that returns false are
    /// discarded.
    fn load(&self, ctx: &mut LoadContext<'_>) -> bool;
}

/// What a loader sees of the disk being scanned.
pub struct LoadContext<'a> {
    dispatch: &'a mut ControllerDispatch,
    disk: &'a Disk,
    found: Vec<(u64, u64)>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(dispatch: &'a mut ControllerDispatch, disk: &'a Disk) -> Self {
        Self {
            dispatch,
            disk,
            found: Vec::new(),
        }
    }

    pub fn disk(&self) -> &Disk {
        self.disk
    }

    pub fn sector_size(&self) -> u32 {
        self.disk.sector_size()
    }

    /// Read `buf.len()` bytes at byte `offset`.
    pub fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        io::transfer(self.dispatch, self.disk, offset, Transfer::Read(buf))
    }

    /// Read whole sectors starting at `lba`.
    pub fn read_sectors(&mut self, lba: u64, buf: &mut [u8]) -> Result<()> {
        let offset = lba
            .checked_mul(self.sector_size() as u64)
            .ok_or(DiskError::OutOfBounds {
                offset: u64::MAX,
                len: buf.len(),
            })?;
        self.read(offset, buf)
    }

    /// `gpt_disk_io` view of the disk.
    pub fn block_io(&mut self) -> Result<DiskBlockIo<'_>> {
        DiskBlockIo::new(self.dispatch, self.disk)
    }

    /// Report a partition of `length` sectors starting at sector `start`.
    pub fn add_partition(&mut self, start: u64, length: u64) -> Result<()> {
        self.found
            .try_reserve(1)
            .map_err(|_| DiskError::AllocationFailed)?;
        self.found.push((start, length));
        Ok(())
    }

    pub fn found(&self) -> &[(u64, u64)] {
        &self.found
    }
}

/// Run one rescan of `disk`.
pub fn rescan(
    dispatch: &mut ControllerDispatch,
    disk: &mut Disk,
    loaders: &[Box<dyn TableLoader>],
    mounts: &mut dyn Mounts,
) -> Result<ScanOutcome> {
    disk.set_available(false);
    disk.set_state(ScanState::Scanning);
    disk.partitions.block();

    let mut info = DeviceInfo::default();
    if !io::raw(dispatch, disk, 0, 0, DiskOp::Info(&mut info)) {
        log::error!(target: "disk", "Disk: ({}) failed to load the disk information", disk.id());
        disk.set_state(ScanState::Failed);
        return Err(DiskError::InfoFailed);
    }
    if info.sector_size == 0 || info.sector_size > MAX_SECTOR_SIZE {
        log::error!(target: "disk", "Disk: ({}) unusable sector size {}", disk.id(), info.sector_size);
        disk.set_state(ScanState::Failed);
        return Err(DiskError::InvalidSectorSize(info.sector_size));
    }
    disk.apply_info(info);
    log::debug!(
        target: "disk",
        "Disk: ({}) {} sectors of {} bytes",
        disk.id(),
        info.sector_count,
        info.sector_size
    );

    let mut loaded = None;
    for loader in loaders {
        let mut ctx = LoadContext::new(dispatch, disk);
        if loader.load(&mut ctx) {
            loaded = Some((loader.kind(), ctx.found));
            break;
        }
        log::debug!(target: "disk", "Disk: ({}) no {} partition table", disk.id(), loader.kind());
    }

    let Some((table, found)) = loaded else {
        log::error!(target: "disk", "Disk: ({}) failed to load the disk partitions", disk.id());
        disk.set_state(ScanState::Failed);
        return Err(DiskError::NoPartitionTable);
    };

    for (start, length) in found {
        if let Err(err) = disk.partitions.add(start, length, true) {
            log::warn!(target: "disk", "Disk: ({}) dropped partition {}+{}: {}", disk.id(), start, length, err);
        }
    }

    let sweep = disk.partitions.sweep(mounts);
    let partitions = disk.partition_count();
    log::info!(target: "disk", "Disk: ({}) loaded {} {} partitions", disk.id(), partitions, table);

    disk.set_available(true);
    disk.set_state(ScanState::Loaded(table));

    Ok(ScanOutcome {
        table,
        sweep,
        partitions,
    })
}

//! Byte-addressed I/O on top of sector-only controllers.
//!
//! Controllers only move whole sectors starting at an LBA. [`transfer`]
//! accepts any byte offset and length and splits the request into:
//!
//! ```text
//!  offset                                              offset + len
//!    │                                                      │
//!  ┌─┴────────┬──────────┬──────────┬──────────┬────────────┴─┐
//!  │   head   │  body    │  body    │  body    │     tail     │
//!  └──────────┴──────────┴──────────┴──────────┴──────────────┘
//!   staging     one sector per transfer           staging
//! ```
//!
//! Head and tail go through a sector-sized staging buffer. Partial writes
//! read the sector first and only patch the covered bytes, so neighbouring
//! data on the same sector survives.
//!
//! A request that is sector-aligned at both ends skips all of that and is
//! issued as a single multi-sector transfer on the caller's buffer.
//!
//! A failed transfer aborts the request. Sectors written before the failure
//! stay written.

use core::ops::Range;

use crate::config::MAX_SECTOR_SIZE;
use crate::controller::{ControllerDispatch, DiskOp};
use crate::disk::Disk;
use crate::error::{DiskError, Result};

/// Direction and caller buffer of a byte-addressed request.
pub enum Transfer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl Transfer<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Read(buf) => buf.len(),
            Self::Write(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Write(_) => "write",
        }
    }

    /// Controller op covering `range` of the caller buffer.
    fn op(&mut self, range: Range<usize>) -> DiskOp<'_> {
        match self {
            Self::Read(buf) => DiskOp::Read(&mut buf[range]),
            Self::Write(buf) => DiskOp::Write(&buf[range]),
        }
    }
}

/// Issue one controller request for `disk`.
///
/// # Panics
/// When no driver is installed for the disk's controller kind. See
/// [`ControllerDispatch::expect`].
pub fn raw(
    dispatch: &mut ControllerDispatch,
    disk: &Disk,
    lba: u64,
    sector_count: u64,
    op: DiskOp<'_>,
) -> bool {
    dispatch
        .expect(disk.controller())
        .port_do(disk.handle(), lba, sector_count, op)
}

/// Read or write `xfer.len()` bytes at byte `offset` of `disk`.
pub fn transfer(
    dispatch: &mut ControllerDispatch,
    disk: &Disk,
    offset: u64,
    mut xfer: Transfer<'_>,
) -> Result<()> {
    let sector_size = disk.sector_size();
    if sector_size == 0 || sector_size > MAX_SECTOR_SIZE {
        return Err(DiskError::InvalidSectorSize(sector_size));
    }

    let len = xfer.len();
    if len == 0 {
        return Ok(());
    }
    check_bounds(disk, offset, len)?;

    let ss = sector_size as usize;
    let mut lba = offset / sector_size as u64;
    let skip = (offset % sector_size as u64) as usize;

    if skip == 0 && len % ss == 0 {
        let count = (len / ss) as u64;
        if !raw(dispatch, disk, lba, count, xfer.op(0..len)) {
            return Err(io_failed(disk, xfer.name(), lba));
        }
        return Ok(());
    }

    let mut staging = [0u8; MAX_SECTOR_SIZE as usize];
    let staging = &mut staging[..ss];
    let mut done = 0;

    if skip != 0 {
        let n = (ss - skip).min(len);
        partial(dispatch, disk, lba, skip, &mut xfer, 0..n, staging)?;
        done = n;
        lba += 1;
    }

    while len - done >= ss {
        if !raw(dispatch, disk, lba, 1, xfer.op(done..done + ss)) {
            return Err(io_failed(disk, xfer.name(), lba));
        }
        done += ss;
        lba += 1;
    }

    if done < len {
        partial(dispatch, disk, lba, 0, &mut xfer, done..len, staging)?;
    }

    Ok(())
}

/// Move `range` of the caller buffer to/from bytes `skip..` of sector `lba`.
fn partial(
    dispatch: &mut ControllerDispatch,
    disk: &Disk,
    lba: u64,
    skip: usize,
    xfer: &mut Transfer<'_>,
    range: Range<usize>,
    staging: &mut [u8],
) -> Result<()> {
    let window = skip..skip + range.len();

    if !raw(dispatch, disk, lba, 1, DiskOp::Read(&mut *staging)) {
        return Err(io_failed(disk, "read", lba));
    }

    match xfer {
        Transfer::Read(buf) => {
            buf[range].copy_from_slice(&staging[window]);
        }
        Transfer::Write(buf) => {
            staging[window].copy_from_slice(&buf[range]);
            if !raw(dispatch, disk, lba, 1, DiskOp::Write(&*staging)) {
                return Err(io_failed(disk, "write", lba));
            }
        }
    }

    Ok(())
}

fn check_bounds(disk: &Disk, offset: u64, len: usize) -> Result<()> {
    let out_of_bounds = DiskError::OutOfBounds { offset, len };
    let end = offset.checked_add(len as u64).ok_or(out_of_bounds)?;

    match disk.capacity() {
        Some(capacity) if end > capacity => {
            log::error!(target: "disk", "Disk: ({}) request {}+{} past end ({})", disk.id(), offset, len, capacity);
            Err(out_of_bounds)
        }
        _ => Ok(()),
    }
}

fn io_failed(disk: &Disk, what: &str, lba: u64) -> DiskError {
    log::error!(target: "disk", "Disk: ({}) {} failed at LBA {}", disk.id(), what, lba);
    DiskError::DeviceIo { lba }
}

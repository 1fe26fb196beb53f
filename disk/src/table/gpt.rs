// GPT loader using gpt-disk-rs

use alloc::vec::Vec;
use core::fmt;

use gpt_disk_io::Disk;

use crate::config::MAX_SECTOR_SIZE;
use crate::error::DiskError;
use crate::scan::{LoadContext, TableKind, TableLoader};

#[derive(Debug, Clone, Copy)]
enum GptError {
    IoError,
    InvalidHeader,
    InvalidEntry { index: usize },
    Table(DiskError),
}

impl fmt::Display for GptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError => write!(f, "I/O error"),
            Self::InvalidHeader => write!(f, "no valid primary header"),
            Self::InvalidEntry { index } => write!(f, "entry {} ends before it starts", index),
            Self::Table(err) => write!(f, "{}", err),
        }
    }
}

/// Reads the primary GPT header and its partition entry array.
pub struct GptLoader;

impl TableLoader for GptLoader {
    fn kind(&self) -> TableKind {
        TableKind::Gpt
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> bool {
        let id = ctx.disk().id();
        let entries = match read_entries(ctx) {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!(target: "disk", "GPT: ({}) {}", id, err);
                return false;
            }
        };

        for (start, length) in entries {
            if let Err(err) = ctx.add_partition(start, length) {
                log::debug!(target: "disk", "GPT: ({}) {}", id, GptError::Table(err));
                return false;
            }
        }
        true
    }
}

/// Collect `(start, length)` of every used entry.
fn read_entries(ctx: &mut LoadContext<'_>) -> Result<Vec<(u64, u64)>, GptError> {
    let block_size = ctx.sector_size() as usize;
    let io = ctx.block_io().map_err(GptError::Table)?;
    let mut disk = Disk::new(io).map_err(|_| GptError::IoError)?;

    let mut block_buf = [0u8; MAX_SECTOR_SIZE as usize];
    let block_buf = &mut block_buf[..block_size];

    let header = disk
        .read_primary_gpt_header(block_buf)
        .map_err(|_| GptError::IoError)?;

    if !header.is_signature_valid() || header.header_crc32 != header.calculate_header_crc32() {
        return Err(GptError::InvalidHeader);
    }

    let layout = header
        .get_partition_entry_array_layout()
        .map_err(|_| GptError::InvalidHeader)?;

    let iter = disk
        .gpt_partition_entry_array_iter(layout, block_buf)
        .map_err(|_| GptError::IoError)?;

    let mut entries = Vec::new();
    for (index, entry_result) in iter.enumerate() {
        let entry = entry_result.map_err(|_| GptError::IoError)?;

        if !entry.is_used() {
            continue;
        }

        // GPT ranges are inclusive
        let start = entry.starting_lba.to_u64();
        let end = entry.ending_lba.to_u64();
        if end < start {
            return Err(GptError::InvalidEntry { index });
        }
        entries
            .try_reserve(1)
            .map_err(|_| GptError::Table(DiskError::AllocationFailed))?;
        entries.push((start, end - start + 1));
    }

    Ok(entries)
}

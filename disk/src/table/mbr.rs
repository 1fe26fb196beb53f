// MBR loader
//
// Primary entries come straight from sector 0. Extended partitions are
// followed through their EBR chain; each EBR holds one logical partition
// (relative to that EBR) and a link to the next EBR (relative to the start
// of the extended partition).

use crate::scan::{LoadContext, TableKind, TableLoader};

pub const MBR_SIZE: usize = 512;
pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

const ENTRY_TABLE_OFFSET: usize = 446;
const ENTRY_SIZE: usize = 16;
const PRIMARY_ENTRIES: usize = 4;

/// EBR chains longer than this are treated as loops
const MAX_LOGICAL: usize = 64;

pub const TYPE_EMPTY: u8 = 0x00;
pub const TYPE_GPT_PROTECTIVE: u8 = 0xEE;

/// One 16-byte partition record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbrEntry {
    pub status: u8,
    pub system_id: u8,
    pub start_lba: u32,
    pub sector_count: u32,
}

impl MbrEntry {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            status: raw[0],
            system_id: raw[4],
            start_lba: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            sector_count: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
        }
    }

    pub fn is_used(&self) -> bool {
        self.system_id != TYPE_EMPTY && self.sector_count != 0
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.system_id, 0x05 | 0x0F | 0x85)
    }

    pub fn is_protective(&self) -> bool {
        self.system_id == TYPE_GPT_PROTECTIVE
    }
}

/// Decoded boot record
pub struct MbrRecord {
    pub entries: [MbrEntry; PRIMARY_ENTRIES],
}

impl MbrRecord {
    /// Decode a boot sector, `None` without the 0x55AA signature.
    pub fn parse(sector: &[u8; MBR_SIZE]) -> Option<Self> {
        if sector[510..512] != MBR_SIGNATURE {
            return None;
        }

        let mut entries = [MbrEntry::parse(&[0; ENTRY_SIZE]); PRIMARY_ENTRIES];
        for (i, entry) in entries.iter_mut().enumerate() {
            let off = ENTRY_TABLE_OFFSET + i * ENTRY_SIZE;
            *entry = MbrEntry::parse(&sector[off..off + ENTRY_SIZE]);
        }
        Some(Self { entries })
    }

    /// Whether the record only guards a GPT disk.
    pub fn is_protective(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.is_used() && e.is_protective())
    }
}

pub struct MbrLoader;

impl TableLoader for MbrLoader {
    fn kind(&self) -> TableKind {
        TableKind::Mbr
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> bool {
        let id = ctx.disk().id();
        let Some(mbr) = read_record(ctx, 0) else {
            log::debug!(target: "disk", "MBR: ({}) no boot signature", id);
            return false;
        };

        if mbr.is_protective() {
            log::debug!(target: "disk", "MBR: ({}) protective MBR, not an MBR disk", id);
            return false;
        }

        for entry in mbr.entries.iter().filter(|e| e.is_used()) {
            if entry.is_extended() {
                load_logical(ctx, entry.start_lba as u64);
                continue;
            }
            if ctx
                .add_partition(entry.start_lba as u64, entry.sector_count as u64)
                .is_err()
            {
                return false;
            }
        }
        true
    }
}

fn read_record(ctx: &mut LoadContext<'_>, lba: u64) -> Option<MbrRecord> {
    let mut sector = [0u8; MBR_SIZE];
    ctx.read_sectors(lba, &mut sector).ok()?;
    MbrRecord::parse(&sector)
}

/// Walk the EBR chain of the extended partition at `base`.
///
/// A broken chain ends the walk; logical partitions found so far are kept.
fn load_logical(ctx: &mut LoadContext<'_>, base: u64) {
    let id = ctx.disk().id();
    let mut ebr_lba = base;

    for _ in 0..MAX_LOGICAL {
        let Some(ebr) = read_record(ctx, ebr_lba) else {
            log::warn!(target: "disk", "MBR: ({}) broken EBR chain at LBA {}", id, ebr_lba);
            return;
        };

        let logical = ebr.entries[0];
        if logical.is_used()
            && ctx
                .add_partition(ebr_lba + logical.start_lba as u64, logical.sector_count as u64)
                .is_err()
        {
            return;
        }

        let link = ebr.entries[1];
        if !link.is_used() || !link.is_extended() {
            return;
        }
        ebr_lba = base + link.start_lba as u64;
    }

    log::warn!(target: "disk", "MBR: ({}) EBR chain longer than {} entries", id, MAX_LOGICAL);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot_sector(entries: &[(u8, u32, u32)]) -> [u8; MBR_SIZE] {
        let mut sector = [0u8; MBR_SIZE];
        for (i, &(ty, start, count)) in entries.iter().enumerate() {
            let off = ENTRY_TABLE_OFFSET + i * ENTRY_SIZE;
            sector[off + 4] = ty;
            sector[off + 8..off + 12].copy_from_slice(&start.to_le_bytes());
            sector[off + 12..off + 16].copy_from_slice(&count.to_le_bytes());
        }
        sector[510..512].copy_from_slice(&MBR_SIGNATURE);
        sector
    }

    #[test]
    fn test_parse_primary_entries() {
        let sector = boot_sector(&[(0x83, 2048, 4096), (0x0C, 8192, 100)]);
        let mbr = MbrRecord::parse(&sector).unwrap();

        assert_eq!(mbr.entries[0].start_lba, 2048);
        assert_eq!(mbr.entries[0].sector_count, 4096);
        assert_eq!(mbr.entries[1].system_id, 0x0C);
        assert!(!mbr.entries[2].is_used());
    }

    #[test]
    fn test_missing_signature() {
        let mut sector = boot_sector(&[(0x83, 2048, 4096)]);
        sector[511] = 0;
        assert!(MbrRecord::parse(&sector).is_none());
    }

    #[test]
    fn test_entry_flags() {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[0] = 0x80;
        raw[4] = 0x0F;
        raw[12] = 1;
        let entry = MbrEntry::parse(&raw);
        assert_eq!(entry.status, 0x80);
        assert!(entry.is_extended());
        assert!(entry.is_used());
        assert!(!entry.is_protective());
    }

    #[test]
    fn test_protective_record() {
        let gpt = boot_sector(&[(TYPE_GPT_PROTECTIVE, 1, 2047)]);
        assert!(MbrRecord::parse(&gpt).unwrap().is_protective());

        // An empty slot typed 0xEE does not count
        let plain = boot_sector(&[(0x83, 2048, 4096), (TYPE_GPT_PROTECTIVE, 0, 0)]);
        assert!(!MbrRecord::parse(&plain).unwrap().is_protective());
    }
}

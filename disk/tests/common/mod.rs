//! Common test utilities and mock controllers

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use gpt_disk_io::{BlockIo, Disk as GptDisk};
use gpt_disk_types::{
    guid, BlockSize, GptHeader, GptPartitionEntryArray, GptPartitionType, Lba, LbaLe, U32Le,
};
use morpheus_disk::{
    Controller, ControllerKind, DeviceHandle, DeviceInfo, DiskError, DiskId, DiskOp, DiskRegistry,
    LoadContext, MountTable, TableKind, TableLoader,
};

pub const SECTOR: usize = 512;
pub const DISK_SECTORS: usize = 2048;

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    pub fn new(sectors: usize, block_size: usize) -> Self {
        Self {
            data: vec![0u8; sectors * block_size],
            block_size,
        }
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A controller request as seen by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read { lba: u64, count: u64 },
    Write { lba: u64, count: u64 },
    Info,
}

/// Backing store plus request log of one mock device
#[derive(Debug)]
pub struct DeviceState {
    pub data: Vec<u8>,
    pub sector_size: usize,
    pub ops: Vec<Op>,
    /// Transfers touching this LBA fail
    pub fail_lba: Option<u64>,
    pub fail_info: bool,
}

impl DeviceState {
    pub fn sectors(&self) -> u64 {
        (self.data.len() / self.sector_size) as u64
    }

    pub fn sector(&self, lba: u64) -> &[u8] {
        let off = lba as usize * self.sector_size;
        &self.data[off..off + self.sector_size]
    }

    pub fn transfers(&self) -> Vec<Op> {
        self.ops
            .iter()
            .copied()
            .filter(|op| *op != Op::Info)
            .collect()
    }
}

pub type Device = Arc<Mutex<DeviceState>>;

pub fn device(sectors: usize, sector_size: usize) -> Device {
    Arc::new(Mutex::new(DeviceState {
        data: vec![0u8; sectors * sector_size],
        sector_size,
        ops: Vec::new(),
        fail_lba: None,
        fail_info: false,
    }))
}

/// Controller over shared in-memory devices, handle = index
pub struct RecordingController {
    kind: ControllerKind,
    devices: Vec<Device>,
}

impl RecordingController {
    pub fn new(kind: ControllerKind) -> Self {
        Self {
            kind,
            devices: Vec::new(),
        }
    }

    pub fn attach(&mut self, device: Device) -> DeviceHandle {
        self.devices.push(device);
        DeviceHandle(self.devices.len() - 1)
    }
}

impl Controller for RecordingController {
    fn kind(&self) -> ControllerKind {
        self.kind
    }

    fn port_do(
        &mut self,
        handle: DeviceHandle,
        lba: u64,
        sector_count: u64,
        op: DiskOp<'_>,
    ) -> bool {
        let Some(device) = self.devices.get(handle.0) else {
            return false;
        };
        let mut dev = device.lock().unwrap();
        let ss = dev.sector_size;
        let range = lba as usize * ss..(lba + sector_count) as usize * ss;
        let fails = dev
            .fail_lba
            .is_some_and(|bad| bad >= lba && bad < lba + sector_count);

        match op {
            DiskOp::Info(info) => {
                dev.ops.push(Op::Info);
                if dev.fail_info {
                    return false;
                }
                *info = DeviceInfo {
                    sector_size: ss as u32,
                    sector_count: dev.sectors(),
                };
                true
            }
            DiskOp::Read(dst) => {
                dev.ops.push(Op::Read {
                    lba,
                    count: sector_count,
                });
                if fails || range.end > dev.data.len() || dst.len() != range.len() {
                    return false;
                }
                dst.copy_from_slice(&dev.data[range]);
                true
            }
            DiskOp::Write(src) => {
                dev.ops.push(Op::Write {
                    lba,
                    count: sector_count,
                });
                if fails || range.end > dev.data.len() || src.len() != range.len() {
                    return false;
                }
                dev.data[range].copy_from_slice(src);
                true
            }
        }
    }
}

/// Registry with one recording AHCI disk
pub fn single_disk(sectors: usize, sector_size: usize) -> (DiskRegistry, DiskId, Device) {
    let dev = device(sectors, sector_size);
    let mut ahci = RecordingController::new(ControllerKind::Ahci);
    let handle = ahci.attach(dev.clone());

    let mut registry = DiskRegistry::new();
    registry.install_controller(Box::new(ahci));
    let id = registry.add(ControllerKind::Ahci, handle).unwrap();
    (registry, id, dev)
}

/// Deterministic, non-repeating-per-sector fill pattern
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8)
        .collect()
}

/// Write a boot sector with the given `(system_id, start, count)` entries.
pub fn write_mbr(dev: &Device, lba: u64, entries: &[(u8, u32, u32)]) {
    let mut dev = dev.lock().unwrap();
    let off = lba as usize * dev.sector_size;
    let sector = &mut dev.data[off..off + SECTOR];
    sector.fill(0);
    for (i, &(ty, start, count)) in entries.iter().enumerate() {
        let e = 446 + i * 16;
        sector[e + 4] = ty;
        sector[e + 8..e + 12].copy_from_slice(&start.to_le_bytes());
        sector[e + 12..e + 16].copy_from_slice(&count.to_le_bytes());
    }
    sector[510] = 0x55;
    sector[511] = 0xAA;
}

/// Lay down a protective MBR, primary GPT header and entry array holding
/// `parts` as `(start, length)` in sectors.
pub fn write_gpt<B: BlockIo>(block_io: B, num_blocks: u64, parts: &[(u64, u64)]) {
    let mut disk = GptDisk::new(block_io).unwrap();

    let mut header = GptHeader {
        my_lba: LbaLe::from_u64(1),
        alternate_lba: LbaLe::from_u64(num_blocks - 1),
        first_usable_lba: LbaLe::from_u64(34),
        last_usable_lba: LbaLe::from_u64(num_blocks - 34),
        disk_guid: guid!("12345678-1234-1234-1234-123456789012"),
        partition_entry_lba: LbaLe::from_u64(2),
        number_of_partition_entries: U32Le::from_u32(128),
        ..Default::default()
    };

    let mut buf = [0u8; SECTOR];
    disk.write_protective_mbr(&mut buf).unwrap();

    let layout = header.get_partition_entry_array_layout().unwrap();
    let mut entry_buf = [0u8; 16384];
    let mut entry_array =
        GptPartitionEntryArray::new(layout, BlockSize::BS_512, &mut entry_buf).unwrap();

    for (i, &(start, length)) in parts.iter().enumerate() {
        let entry = entry_array
            .get_partition_entry_mut(i.try_into().unwrap())
            .unwrap();
        entry.partition_type_guid = GptPartitionType::BASIC_DATA;
        entry.unique_partition_guid = guid!("12345678-1234-5678-1234-567812345678");
        entry.starting_lba = LbaLe::from_u64(start);
        entry.ending_lba = LbaLe::from_u64(start + length - 1);
    }

    header.partition_entry_array_crc32 = entry_array.calculate_crc32();
    header.update_header_crc32();

    disk.write_primary_gpt_header(&header, &mut buf).unwrap();
    disk.write_gpt_partition_entry_array(&entry_array).unwrap();
    disk.flush().unwrap();
}

/// Write a GPT through the registry's own block view.
///
/// The disk is scanned first so its capacity is known; a blank disk fails
/// that scan, which is expected.
pub fn format_gpt(registry: &mut DiskRegistry, id: DiskId, parts: &[(u64, u64)]) {
    let mut mounts = MountTable::new();
    let _ = registry.scan(id, &mut mounts);
    let sectors = registry.get(id).unwrap().sector_count();
    let block_io = registry.block_io(id).unwrap();
    write_gpt(block_io, sectors, parts);
}

/// Loader reporting a fixed, swappable list of partitions
pub struct ScriptedLoader {
    pub kind: TableKind,
    pub parts: Arc<Mutex<Option<Vec<(u64, u64)>>>>,
    pub calls: Arc<Mutex<Vec<TableKind>>>,
}

impl TableLoader for ScriptedLoader {
    fn kind(&self) -> TableKind {
        self.kind
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> bool {
        self.calls.lock().unwrap().push(self.kind);
        let parts = self.parts.lock().unwrap();
        let Some(parts) = parts.as_ref() else {
            return false;
        };
        parts
            .iter()
            .all(|&(start, length)| ctx.add_partition(start, length).is_ok())
    }
}

/// A GPT and an MBR scripted loader sharing one call log
pub struct Script {
    pub gpt: Arc<Mutex<Option<Vec<(u64, u64)>>>>,
    pub mbr: Arc<Mutex<Option<Vec<(u64, u64)>>>>,
    pub calls: Arc<Mutex<Vec<TableKind>>>,
}

impl Script {
    pub fn install(registry: &mut DiskRegistry) -> Self {
        let script = Self {
            gpt: Arc::new(Mutex::new(None)),
            mbr: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        registry.set_loaders(vec![
            Box::new(ScriptedLoader {
                kind: TableKind::Gpt,
                parts: script.gpt.clone(),
                calls: script.calls.clone(),
            }),
            Box::new(ScriptedLoader {
                kind: TableKind::Mbr,
                parts: script.mbr.clone(),
                calls: script.calls.clone(),
            }),
        ]);
        script
    }

    pub fn set_gpt(&self, parts: Option<&[(u64, u64)]>) {
        *self.gpt.lock().unwrap() = parts.map(|p| p.to_vec());
    }

    pub fn set_mbr(&self, parts: Option<&[(u64, u64)]>) {
        *self.mbr.lock().unwrap() = parts.map(|p| p.to_vec());
    }

    pub fn calls(&self) -> Vec<TableKind> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn is_io_error(err: DiskError) -> bool {
    matches!(err, DiskError::DeviceIo { .. })
}

//! AHCI controller binding.
//!
//! Owns the SATA ports discovered by the AHCI driver and serves
//! [`ControllerKind::Ahci`] disks. Each port is reached through the
//! synchronous `gpt_disk_io::BlockIo` interface, the same seam the AHCI and
//! VirtIO-blk drivers already expose for filesystem code, so the register
//! level driver stays out of this crate.
//!
//! Port handles are slab keys: stable for the lifetime of the port and
//! reused only after [`AhciController::detach`].

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use slab::Slab;

use super::{Controller, ControllerKind, DeviceHandle, DeviceInfo, DiskOp};

/// Maximum ports per HBA (PI register width)
pub const MAX_PORTS: usize = 32;

pub struct AhciController<P: BlockIo> {
    ports: Slab<P>,
}

impl<P: BlockIo> AhciController<P> {
    pub fn new() -> Self {
        Self { ports: Slab::new() }
    }

    /// Take ownership of an initialized port.
    ///
    /// Returns `None` once all [`MAX_PORTS`] are in use.
    pub fn attach(&mut self, port: P) -> Option<DeviceHandle> {
        if self.ports.len() >= MAX_PORTS {
            log::warn!(target: "disk", "AHCI: all {} ports in use", MAX_PORTS);
            return None;
        }
        let handle = DeviceHandle(self.ports.insert(port));
        log::debug!(target: "disk", "AHCI: Attached port {}", handle);
        Some(handle)
    }

    /// Hand a port back to the driver.
    pub fn detach(&mut self, handle: DeviceHandle) -> Option<P> {
        self.ports.try_remove(handle.0)
    }

    pub fn port(&self, handle: DeviceHandle) -> Option<&P> {
        self.ports.get(handle.0)
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }
}

impl<P: BlockIo> Default for AhciController<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: BlockIo + Send> Controller for AhciController<P> {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Ahci
    }

    fn port_do(
        &mut self,
        handle: DeviceHandle,
        lba: u64,
        sector_count: u64,
        op: DiskOp<'_>,
    ) -> bool {
        let Some(port) = self.ports.get_mut(handle.0) else {
            log::error!(target: "disk", "AHCI: No port behind handle {}", handle);
            return false;
        };

        let sector_size = port.block_size().to_u64();
        let expected = sector_count.checked_mul(sector_size);

        match op {
            DiskOp::Info(info) => match port.num_blocks() {
                Ok(blocks) => {
                    *info = DeviceInfo {
                        sector_size: port.block_size().to_u32(),
                        sector_count: blocks,
                    };
                    true
                }
                Err(err) => {
                    log::error!(target: "disk", "AHCI: Port {} identify failed: {}", handle, err);
                    false
                }
            },
            DiskOp::Read(dst) => {
                if expected != Some(dst.len() as u64) {
                    log::error!(target: "disk", "AHCI: Read buffer of {} bytes for {} sectors", dst.len(), sector_count);
                    return false;
                }
                match port.read_blocks(Lba(lba), dst) {
                    Ok(()) => true,
                    Err(err) => {
                        log::error!(target: "disk", "AHCI: Port {} read at LBA {} failed: {}", handle, lba, err);
                        false
                    }
                }
            }
            DiskOp::Write(src) => {
                if expected != Some(src.len() as u64) {
                    log::error!(target: "disk", "AHCI: Write buffer of {} bytes for {} sectors", src.len(), sector_count);
                    return false;
                }
                match port.write_blocks(Lba(lba), src) {
                    Ok(()) => true,
                    Err(err) => {
                        log::error!(target: "disk", "AHCI: Port {} write at LBA {} failed: {}", handle, lba, err);
                        false
                    }
                }
            }
        }
    }
}

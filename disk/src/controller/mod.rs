//! Controller dispatch.
//!
//! Maps a [`ControllerKind`] tag to the driver that owns devices of that
//! kind. Drivers expose one synchronous primitive, [`Controller::port_do`];
//! everything above this module talks sectors through it.
//!
//! Supporting new hardware means implementing [`Controller`] and
//! installing it with [`ControllerDispatch::install`]. Callers never change.

pub mod ahci;

use alloc::boxed::Box;
use core::fmt;

pub use ahci::AhciController;

/// Controller class a disk is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    /// SATA in AHCI mode
    Ahci,
    /// VirtIO block device
    VirtioBlk,
}

impl ControllerKind {
    pub const COUNT: usize = 2;

    const fn slot(self) -> usize {
        match self {
            Self::Ahci => 0,
            Self::VirtioBlk => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Ahci => "AHCI",
            Self::VirtioBlk => "VirtIO-blk",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque, driver-assigned device handle.
///
/// The disk layer stores it and hands it back to the driver. It does not own
/// the device behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub usize);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Device geometry reported by an `Info` request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Logical sector size in bytes
    pub sector_size: u32,
    /// Total capacity in sectors
    pub sector_count: u64,
}

/// One request to a controller.
pub enum DiskOp<'a> {
    /// Read `sector_count` sectors into the buffer
    Read(&'a mut [u8]),
    /// Write `sector_count` sectors from the buffer
    Write(&'a [u8]),
    /// Fill in device geometry; `lba` and `sector_count` are ignored
    Info(&'a mut DeviceInfo),
}

/// Synchronous sector-transfer primitive of one controller class.
///
/// # Contract
/// - Blocks until the transfer finished or failed
/// - Read/Write buffers hold exactly `sector_count` sectors
/// - No retries; a `false` return is final
pub trait Controller: Send {
    /// The tag this driver serves.
    fn kind(&self) -> ControllerKind;

    /// Perform `op` on the device behind `handle`.
    fn port_do(
        &mut self,
        handle: DeviceHandle,
        lba: u64,
        sector_count: u64,
        op: DiskOp<'_>,
    ) -> bool;
}

/// Closed mapping from controller kind to installed driver.
pub struct ControllerDispatch {
    controllers: [Option<Box<dyn Controller>>; ControllerKind::COUNT],
}

impl ControllerDispatch {
    pub const fn new() -> Self {
        Self {
            controllers: [None, None],
        }
    }

    /// Install a driver under its own kind, returning the one it replaces.
    pub fn install(&mut self, controller: Box<dyn Controller>) -> Option<Box<dyn Controller>> {
        let slot = controller.kind().slot();
        log::debug!(target: "disk", "Disk: Installed {} controller", controller.kind());
        self.controllers[slot].replace(controller)
    }

    pub fn is_installed(&self, kind: ControllerKind) -> bool {
        self.controllers[kind.slot()].is_some()
    }

    pub fn get_mut(&mut self, kind: ControllerKind) -> Option<&mut (dyn Controller + 'static)> {
        self.controllers[kind.slot()].as_deref_mut()
    }

    /// Look up the driver for `kind`.
    ///
    /// # Panics
    /// When no driver is installed for `kind`. A disk can only carry a kind
    /// that some driver registered it under, so a miss means the registry is
    /// corrupt and continuing would talk to an unverified device.
    pub fn expect(&mut self, kind: ControllerKind) -> &mut (dyn Controller + 'static) {
        match self.controllers[kind.slot()].as_deref_mut() {
            Some(controller) => controller,
            None => {
                log::error!(target: "disk", "Disk: unknown controller ({})", kind);
                panic!("Encountered a disk with an unknown controller");
            }
        }
    }
}

impl Default for ControllerDispatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop(ControllerKind);

    impl Controller for Nop {
        fn kind(&self) -> ControllerKind {
            self.0
        }

        fn port_do(&mut self, _: DeviceHandle, _: u64, _: u64, _: DiskOp<'_>) -> bool {
            true
        }
    }

    #[test]
    fn test_install_replaces_same_kind() {
        let mut dispatch = ControllerDispatch::new();
        assert!(dispatch.install(Box::new(Nop(ControllerKind::Ahci))).is_none());
        assert!(dispatch.install(Box::new(Nop(ControllerKind::Ahci))).is_some());
        assert!(dispatch.is_installed(ControllerKind::Ahci));
        assert!(!dispatch.is_installed(ControllerKind::VirtioBlk));
    }

    #[test]
    #[should_panic(expected = "unknown controller")]
    fn test_missing_kind_is_fatal() {
        let mut dispatch = ControllerDispatch::new();
        dispatch.install(Box::new(Nop(ControllerKind::Ahci)));
        dispatch.expect(ControllerKind::VirtioBlk);
    }
}

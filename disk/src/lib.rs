//! Morpheus Disk Layer
//!
//! Device registry, partition reconciliation and byte-addressed I/O for
//! sector-only storage controllers. Designed to be no_std compatible.
//!
//! # Architecture
//!
//! ```text
//!   hotplug / init                      read / write
//!        │                                   │
//!        ▼                                   ▼
//!  DiskRegistry::scan              DiskRegistry::transfer
//!        │                                   │
//!   block ─► info ─► GPT / MBR ─► sweep   io::transfer  (head / body / tail)
//!                       │           │        │
//!                       ▼           ▼        ▼
//!              PartitionTable   Mounts    io::raw ─► ControllerDispatch
//!                                                         │
//!                                                  AhciController, ...
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut ahci = AhciController::new();
//! let handle = ahci.attach(port).unwrap();
//!
//! let mut registry = DiskRegistry::new();
//! registry.install_controller(Box::new(ahci));
//!
//! let disk = registry.add(ControllerKind::Ahci, handle)?;
//! registry.scan(disk, &mut vfs)?;
//! registry.read(disk, 600, &mut buf)?;
//! ```

#![no_std]
#![allow(clippy::new_without_default)]
#![allow(clippy::len_without_is_empty)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod config;
pub mod controller;
pub mod disk;
pub mod error;
pub mod io;
pub mod logger;
pub mod mount;
pub mod partition;
pub mod registry;
pub mod scan;
pub mod sync;
pub mod table;

pub use config::DiskConfig;
pub use controller::{
    AhciController, Controller, ControllerDispatch, ControllerKind, DeviceHandle, DeviceInfo,
    DiskOp,
};
pub use disk::{Disk, DiskId};
pub use error::{DiskError, Result};
pub use io::Transfer;
pub use mount::{MountHandle, MountKind, MountTable, Mounts};
pub use partition::{Partition, PartitionId, PartitionTable, SweepReport};
pub use registry::{DiskRegistry, Disks};
pub use scan::{LoadContext, ScanOutcome, ScanState, TableKind, TableLoader};
pub use sync::SharedRegistry;
pub use table::DiskBlockIo;

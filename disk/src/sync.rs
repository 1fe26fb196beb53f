//! Shared registry for preemptive contexts.
//!
//! A rescan must see a stable partition list from block to sweep, and
//! add/remove must not race iteration. [`SharedRegistry`] holds one spinlock
//! over the whole registry and keeps it for each complete operation.

use spin::{Mutex, MutexGuard};

use crate::controller::{ControllerKind, DeviceHandle};
use crate::disk::DiskId;
use crate::error::Result;
use crate::io::Transfer;
use crate::mount::Mounts;
use crate::registry::DiskRegistry;
use crate::scan::ScanOutcome;

pub struct SharedRegistry {
    inner: Mutex<DiskRegistry>,
}

impl SharedRegistry {
    pub fn new(registry: DiskRegistry) -> Self {
        Self {
            inner: Mutex::new(registry),
        }
    }

    /// Exclusive access for multi-step work.
    pub fn lock(&self) -> MutexGuard<'_, DiskRegistry> {
        self.inner.lock()
    }

    pub fn add(&self, controller: ControllerKind, handle: DeviceHandle) -> Result<DiskId> {
        self.inner.lock().add(controller, handle)
    }

    pub fn remove(&self, id: DiskId, mounts: &mut dyn Mounts) -> bool {
        self.inner.lock().remove(id, mounts)
    }

    pub fn scan(&self, id: DiskId, mounts: &mut dyn Mounts) -> Result<ScanOutcome> {
        self.inner.lock().scan(id, mounts)
    }

    pub fn transfer(&self, id: DiskId, offset: u64, xfer: Transfer<'_>) -> Result<()> {
        self.inner.lock().transfer(id, offset, xfer)
    }

    pub fn into_inner(self) -> DiskRegistry {
        self.inner.into_inner()
    }
}

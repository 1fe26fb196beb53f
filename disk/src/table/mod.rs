//! Partition table loaders.
//!
//! The default loader order prefers GPT over MBR when the `gpt` feature is
//! enabled. A GPT disk also carries a protective MBR, so the order matters.

pub mod block_io;
#[cfg(feature = "gpt")]
pub mod gpt;
pub mod mbr;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::scan::TableLoader;

pub use block_io::DiskBlockIo;
#[cfg(feature = "gpt")]
pub use gpt::GptLoader;
pub use mbr::MbrLoader;

/// Loaders in the order a rescan tries them.
pub fn default_loaders() -> Vec<Box<dyn TableLoader>> {
    let mut loaders: Vec<Box<dyn TableLoader>> = Vec::new();
    #[cfg(feature = "gpt")]
    loaders.push(Box::new(GptLoader));
    loaders.push(Box::new(MbrLoader));
    loaders
}

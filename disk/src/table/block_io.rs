// Adapter to use a registered disk with gpt_disk_io

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use crate::controller::ControllerDispatch;
use crate::disk::Disk;
use crate::error::{DiskError, Result};
use crate::io::{self, Transfer};

/// `gpt_disk_io::BlockIo` over the byte translator.
///
/// Lets GPT code, FAT32 and ISO9660 readers run on any registered disk
/// regardless of its controller.
pub struct DiskBlockIo<'a> {
    dispatch: &'a mut ControllerDispatch,
    disk: &'a Disk,
    block_size: BlockSize,
}

impl<'a> DiskBlockIo<'a> {
    pub fn new(dispatch: &'a mut ControllerDispatch, disk: &'a Disk) -> Result<Self> {
        let block_size = BlockSize::new(disk.sector_size())
            .ok_or(DiskError::InvalidSectorSize(disk.sector_size()))?;

        Ok(Self {
            dispatch,
            disk,
            block_size,
        })
    }

    fn byte_offset(&self, start_lba: Lba, len: usize) -> Result<u64> {
        start_lba
            .to_u64()
            .checked_mul(self.block_size.to_u64())
            .ok_or(DiskError::OutOfBounds {
                offset: u64::MAX,
                len,
            })
    }
}

impl BlockIo for DiskBlockIo<'_> {
    type Error = DiskError;

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn num_blocks(&mut self) -> Result<u64> {
        Ok(self.disk.sector_count())
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<()> {
        self.block_size.assert_valid_block_buffer(dst);

        let offset = self.byte_offset(start_lba, dst.len())?;
        io::transfer(self.dispatch, self.disk, offset, Transfer::Read(dst))
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<()> {
        self.block_size.assert_valid_block_buffer(src);

        let offset = self.byte_offset(start_lba, src.len())?;
        io::transfer(self.dispatch, self.disk, offset, Transfer::Write(src))
    }

    fn flush(&mut self) -> Result<()> {
        // No write buffering in this layer, transfers are synchronous
        Ok(())
    }
}

//! Software ramdisk backing. Volume-type ramdisks require
//! `block_size == 512`, a constraint of the underlying ramdisk driver.
//! Uses a plain in-process byte buffer rather than a real block device.

use std::sync::Mutex;

/// Block size every ramdisk volume must use.
pub const RAM_BLOCK_SIZE: u32 = 512;

pub(crate) struct RamDisk {
    blocks: Mutex<Vec<u8>>,
    numblocks: u32,
}

impl RamDisk {
    pub(crate) fn new(numblocks: u32) -> Self {
        let bytes = RAM_BLOCK_SIZE as usize * numblocks as usize;
        Self {
            blocks: Mutex::new(vec![0u8; bytes]),
            numblocks,
        }
    }

    /// This crate doesn't model per-file allocation inside the ramdisk
    /// (no filesystem format is implemented over the raw block buffer),
    /// so every formatted block reports free until the volume is
    /// unmounted.
    pub(crate) fn blocks_free(&self) -> u32 {
        self.numblocks
    }

    pub(crate) fn bytes_free(&self) -> u64 {
        self.blocks.lock().unwrap_or_else(|p| p.into_inner()).len() as u64
    }
}

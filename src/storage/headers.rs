//! # File Header
//!
//! Every database file begins with a 6-byte header: the file's ID (u16)
//! followed by its durable page count (u32), both little-endian. Page `n`
//! follows at byte offset `6 + n * PAGE_SIZE`.
//!
//! The header is a zerocopy struct so it can be written and parsed
//! without intermediate buffers; `Unaligned` keeps it safe to read at any
//! offset.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::FILE_HEADER_SIZE;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileHeader {
    file_id: U16,
    num_pages: U32,
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == FILE_HEADER_SIZE);

impl FileHeader {
    pub fn new(file_id: u16, num_pages: u32) -> Self {
        Self {
            file_id: U16::new(file_id),
            num_pages: U32::new(num_pages),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for FileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );
        Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse FileHeader: {:?}", e))
    }

    zerocopy_accessors! {
        file_id: u16,
        num_pages: u32,
    }
}

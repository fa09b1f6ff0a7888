//! # Storage Layout Constants
//!
//! This module centralizes the fixed sizes of the on-disk format. The
//! values are wire-compatible contracts: changing any of them changes the
//! byte layout of every file ever written, so they are pinned here with
//! compile-time assertions instead of being scattered across the layers.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (8192)
//!       │
//!       ├─> PAGE_HEADER_SIZE (4: num_slots u16 + free_offset u16)
//!       ├─> SLOT_SIZE (8: one u64 slot entry)
//!       └─> MAX_FILE_SIZE (FILE_HEADER_SIZE + PAGE_SIZE * MAX_PAGES_PER_FILE)
//!
//! FILE_HEADER_SIZE (6: file_id u16 + num_pages u32)
//!
//! RECORD_FIXED_HEADER_SIZE (4: length u16 + header_length u16)
//!       │
//!       └─> MAX_RECORD_POSITIONS ((u16::MAX - 4) / 2)
//! ```

// ============================================================================
// PAGE LAYOUT
// ============================================================================

/// Size of each database page in bytes (8KiB). The fundamental unit of
/// file I/O.
pub const PAGE_SIZE: usize = 8192;

/// Size of the page header: `num_slots` (u16) followed by `free_offset`
/// (u16), both little-endian.
pub const PAGE_HEADER_SIZE: usize = 4;

/// Size of one slot entry in the page's slot array (u64, little-endian).
pub const SLOT_SIZE: usize = 8;

// Page offsets are stored in u16 slot entries and in free_offset.
const _: () = assert!(PAGE_SIZE <= u16::MAX as usize + 1);

// ============================================================================
// FILE LAYOUT
// ============================================================================

/// Size of the file header: `file_id` (u16) followed by `num_pages` (u32),
/// both little-endian. Page `n` lives at byte offset
/// `FILE_HEADER_SIZE + n * PAGE_SIZE`.
pub const FILE_HEADER_SIZE: usize = 6;

/// Maximum number of pages a single file may hold.
pub const MAX_PAGES_PER_FILE: u32 = 256 * 1024;

/// Maximum size of a single database file (~2GiB plus the header).
pub const MAX_FILE_SIZE: u64 = FILE_HEADER_SIZE as u64 + PAGE_SIZE as u64 * MAX_PAGES_PER_FILE as u64;

/// File ID reserved for the forwarding sentinel in slot entries. Never
/// assigned to a real file.
pub const RESERVED_FILE_ID: u16 = 0xFFFF;

const _: () = assert!(MAX_FILE_SIZE == 6 + 8192 * 262_144);

// ============================================================================
// RECORD LAYOUT
// ============================================================================

/// Fixed prefix of every record: `length` (u16) followed by
/// `header_length` (u16). The offset table of `2 * N` bytes follows.
pub const RECORD_FIXED_HEADER_SIZE: usize = 4;

/// Largest number of positions a record can carry while keeping its
/// all-null length within the u16 length field.
pub const MAX_RECORD_POSITIONS: u16 = ((u16::MAX as usize - RECORD_FIXED_HEADER_SIZE) / 2) as u16;

/// Maximum byte length of an encoded string (the length prefix is u16).
pub const MAX_STRING_BYTES: usize = u16::MAX as usize;

// ============================================================================
// FILESYSTEM LAYOUT
// ============================================================================

/// Directory under the user's home that holds all variable data.
pub const VAR_DIR: &str = ".var";

/// Path under [`VAR_DIR`] for this database's data.
pub const BASE_DATA_PATH: &str = "lib/kyadb";

/// Directory under [`BASE_DATA_PATH`] holding database files, named by
/// file ID.
pub const DB_DATA_DIR: &str = "db";

/// Mode for created data directories.
pub const DATA_DIR_MODE: u32 = 0o744;

/// Mode for created database files.
pub const DATA_FILE_MODE: u32 = 0o644;

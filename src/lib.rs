//! # KyaDB Storage Core
//!
//! This crate implements the on-disk storage core of KyaDB: the layered
//! format that turns typed user values into durable bytes. It provides the
//! primitive that transactions, buffer management, and query execution
//! would sit on top of; it does not implement any of those layers itself.
//!
//! ## Architecture
//!
//! Data flows upward for writes and downward for reads:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   File (header + pages + fsync)      │   storage::db_file
//! ├─────────────────────────────────────┤
//! │   Page (8KiB, slotted, forwarding)   │   storage::page
//! ├─────────────────────────────────────┤
//! │   Record (slot-indexed, nullable)    │   record
//! ├─────────────────────────────────────┤
//! │   Element codec (typed values)       │   element
//! └─────────────────────────────────────┘
//! ```
//!
//! Only the file layer touches the filesystem; everything above it is pure
//! byte manipulation.
//!
//! ## Layers
//!
//! - [`element`]: a self-describing binary encoding for scalar and
//!   composite values. Pure functions over a byte buffer and an offset.
//! - [`record`]: a variable-length, mutable container with a fixed number
//!   of independently nullable positions over the element codec. Fixed
//!   width values update in place; variable-width values update in place
//!   only when the new encoding fits the reserved span.
//! - [`storage`]: 8 KiB slotted pages storing records in reverse fill
//!   behind a forward-growing slot array (with tombstones and forwarding
//!   pointers), grouped into heap files with a 6-byte header and a
//!   `make_durable` fsync barrier.
//!
//! ## Zero-Copy Reads
//!
//! Reading a record out of a page returns a [`record::RecordView`]
//! borrowing the page's bytes. The borrow checker pins the view to the
//! page: the page cannot be mutated while a view is alive, which is
//! exactly the aliasing rule the format requires.
//!
//! ## Concurrency Model
//!
//! The core is single-threaded and synchronous. A [`storage::DatabaseFile`]
//! exclusively owns its file descriptor, a [`storage::Page`] its 8 KiB
//! buffer, a [`record::Record`] its byte buffer. A higher layer is expected
//! to serialize access.
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`eyre::Result`]. Structured failures
//! (type mismatches, write overflows, full pages, tombstoned slots, full
//! files) are concrete error types that can be recovered from a report via
//! `downcast_ref`.

#[macro_use]
mod macros;

pub mod config;
pub mod element;
pub mod record;
pub mod storage;

pub use element::{Array, ElementType, Map, Value};
pub use record::{Record, RecordView};
pub use storage::{DatabaseFile, ForwardedAddress, Page, PageAddress, RecordAddress, RecordSlot};

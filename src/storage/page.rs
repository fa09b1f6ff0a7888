//! # Slotted Page
//!
//! An 8 KiB page storing records in reverse fill behind a forward-growing
//! slot array.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size          Field
//! ------  ------------  --------------------------------------------
//! 0       2             num_slots (u16)
//! 2       2             free_offset (u16, first used byte from the end)
//! 4       8*num_slots   slot array (u64 entries)
//! ...                   free space
//! free_offset..8192     records, packed from the end toward free_offset
//! ```
//!
//! The header is the zerocopy [`PageHeader`] struct over the first 4
//! bytes, so page images read from disk are interpreted without copying.
//!
//! ## Slot Entries
//!
//! Each slot entry is a tagged u64:
//!
//! - `0`: tombstone; the record at this slot was deleted.
//! - top 16 bits `0xFFFF`: forwarding pointer; the next 32 bits hold the
//!   target page number and the low 16 bits the target slot. The sentinel
//!   occupies the bits a file id would use, so forwarding is always
//!   within the same file.
//! - anything else: a local byte offset to the record, whose first two
//!   bytes are its length.
//!
//! Dead space (deleted records, relocated updates, shorter overwrites) is
//! never reclaimed; the page does not compact.

use eyre::{ensure, Result};
use thiserror::Error;
use zerocopy::little_endian::U16;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE};
use crate::element;
use crate::record::{Record, RecordView};

const FORWARDED_SENTINEL: u64 = 0xFFFF;

/// Returned when a record (new, or grown by an update) does not fit in
/// the page's free space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cannot be completed, page full: available={available}, needed={needed}")]
pub struct PageFullError {
    pub available: u16,
    pub needed: u16,
}

/// Returned when the slot holds a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("record at slot={slot_num} has been deleted")]
pub struct RecordDeletedError {
    pub slot_num: u16,
}

/// Target of a forwarding pointer, always within the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForwardedAddress {
    pub page_num: u32,
    pub slot_num: u16,
}

/// What a slot resolves to: the record itself, or the address it was
/// forwarded to. A forwarded address is an instruction to the caller, not
/// an error.
#[derive(Debug, Clone, Copy)]
pub enum RecordSlot<'a> {
    Record(RecordView<'a>),
    Forwarded(ForwardedAddress),
}

/// The 4-byte page header: slot count and the offset of the first used
/// byte from the end, both little-endian.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PageHeader {
    num_slots: U16,
    free_offset: U16,
}

const _: () = assert!(std::mem::size_of::<PageHeader>() == PAGE_HEADER_SIZE);

impl PageHeader {
    pub fn new() -> Self {
        Self {
            num_slots: U16::new(0),
            free_offset: U16::new(PAGE_SIZE as u16),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= PAGE_HEADER_SIZE,
            "buffer too small for PageHeader: {} < {}",
            bytes.len(),
            PAGE_HEADER_SIZE
        );
        Self::ref_from_bytes(&bytes[..PAGE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse PageHeader: {:?}", e))
    }

    zerocopy_accessors! {
        num_slots: u16,
        free_offset: u16,
    }
}

impl Default for PageHeader {
    fn default() -> Self {
        Self::new()
    }
}

// Full page image: the header followed by the slot array, free space,
// and record area. Offsets in slot entries and record views are
// page-absolute, so byte access goes through the whole-struct
// as_bytes/as_mut_bytes view.
#[repr(C)]
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct PageBuf {
    header: PageHeader,
    body: [u8; PAGE_SIZE - PAGE_HEADER_SIZE],
}

const _: () = assert!(std::mem::size_of::<PageBuf>() == PAGE_SIZE);

/// An 8 KiB slotted page.
#[derive(Debug, Clone)]
pub struct Page {
    data: Box<PageBuf>,
}

impl Page {
    pub fn new() -> Self {
        let mut data = Box::new(PageBuf::new_zeroed());
        data.header = PageHeader::new();
        Self { data }
    }

    pub(crate) fn zeroed() -> Self {
        Self {
            data: Box::new(PageBuf::new_zeroed()),
        }
    }

    /// Wraps page bytes read from a file, validating the header.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );

        let header = PageHeader::from_bytes(data)?;
        let is_zeroed = header.num_slots() == 0 && header.free_offset() == 0;
        ensure!(
            is_zeroed
                || header.free_offset() as usize
                    >= PAGE_HEADER_SIZE + SLOT_SIZE * header.num_slots() as usize,
            "free_offset {} overlaps the slot array of {} slots",
            header.free_offset(),
            header.num_slots()
        );

        let mut page = Page::zeroed();
        page.as_bytes_mut().copy_from_slice(data);
        Ok(page)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut_bytes()
    }

    pub fn num_slots(&self) -> u16 {
        self.data.header.num_slots()
    }

    fn set_num_slots(&mut self, num_slots: u16) {
        self.data.header.set_num_slots(num_slots);
    }

    pub fn free_offset(&self) -> u16 {
        self.data.header.free_offset()
    }

    fn set_free_offset(&mut self, offset: u16) {
        self.data.header.set_free_offset(offset);
    }

    fn slot(&self, slot_num: u16) -> u64 {
        element::read_u64(
            self.data.as_bytes(),
            PAGE_HEADER_SIZE + SLOT_SIZE * slot_num as usize,
        )
    }

    fn set_slot(&mut self, slot_num: u16, entry: u64) {
        element::write_u64(
            self.data.as_mut_bytes(),
            PAGE_HEADER_SIZE + SLOT_SIZE * slot_num as usize,
            entry,
        );
    }

    fn check_slot(&self, slot_num: u16) -> Result<()> {
        ensure!(
            slot_num < self.num_slots(),
            "slot {} out of range for page with {} slots",
            slot_num,
            self.num_slots()
        );
        Ok(())
    }

    /// Copies the record into the page and returns its slot number.
    pub fn add_record(&mut self, record: &Record) -> Result<u16> {
        let bytes = record.as_bytes();
        let free_offset = self.free_offset() as usize;
        let num_slots = self.num_slots();

        let new_header_end = PAGE_HEADER_SIZE + SLOT_SIZE * (num_slots as usize + 1);
        let available = free_offset.saturating_sub(new_header_end);
        if bytes.len() > available {
            return Err(PageFullError {
                available: available as u16,
                needed: bytes.len() as u16,
            }
            .into());
        }

        let new_offset = free_offset - bytes.len();
        self.data.as_mut_bytes()[new_offset..free_offset].copy_from_slice(bytes);
        self.set_slot(num_slots, new_offset as u64);
        self.set_num_slots(num_slots + 1);
        self.set_free_offset(new_offset as u16);
        Ok(num_slots)
    }

    /// Resolves the slot to its record, or to the address the record was
    /// forwarded to. Fails with [`RecordDeletedError`] on a tombstone.
    pub fn get_record(&self, slot_num: u16) -> Result<RecordSlot<'_>> {
        self.check_slot(slot_num)?;
        let entry = self.slot(slot_num);
        if entry == 0 {
            return Err(RecordDeletedError { slot_num }.into());
        }
        if is_forwarded(entry) {
            return Ok(RecordSlot::Forwarded(decode_forwarded(entry)));
        }

        let offset = entry as usize;
        ensure!(
            offset + 2 <= PAGE_SIZE,
            "slot {} offset {} points outside the page",
            slot_num,
            offset
        );
        let length = element::read_u16(self.data.as_bytes(), offset) as usize;
        ensure!(
            offset + length <= PAGE_SIZE,
            "record of {} bytes at offset {} overruns the page",
            length,
            offset
        );
        let view = RecordView::new(&self.data.as_bytes()[offset..offset + length])?;
        Ok(RecordSlot::Record(view))
    }

    /// Updates the record at the slot.
    ///
    /// Returns `Ok(Some(addr))` when the record has moved to another page;
    /// the caller should update it there instead. A record that no longer
    /// fits in place is relocated to the page's tail (the old span becomes
    /// dead space); if the tail cannot take it either, the update fails
    /// with [`PageFullError`] and the caller is responsible for writing
    /// the record to a different page and calling
    /// [`Page::set_forwarded_address`].
    pub fn update_record(
        &mut self,
        slot_num: u16,
        record: &Record,
    ) -> Result<Option<ForwardedAddress>> {
        self.check_slot(slot_num)?;
        let entry = self.slot(slot_num);
        if entry == 0 {
            return Err(RecordDeletedError { slot_num }.into());
        }
        if is_forwarded(entry) {
            return Ok(Some(decode_forwarded(entry)));
        }

        let offset = entry as usize;
        let current_length = element::read_u16(self.data.as_bytes(), offset) as usize;
        let bytes = record.as_bytes();
        if bytes.len() <= current_length {
            self.data.as_mut_bytes()[offset..offset + bytes.len()].copy_from_slice(bytes);
            return Ok(None);
        }

        // Grown past its span: reserve from the tail exactly like
        // add_record and rewrite the slot. The old span becomes dead.
        let free_offset = self.free_offset() as usize;
        let new_header_end = PAGE_HEADER_SIZE + SLOT_SIZE * (self.num_slots() as usize + 1);
        let available = free_offset.saturating_sub(new_header_end);
        if bytes.len() > available {
            return Err(PageFullError {
                available: available as u16,
                needed: bytes.len() as u16,
            }
            .into());
        }

        let new_offset = free_offset - bytes.len();
        self.data.as_mut_bytes()[new_offset..free_offset].copy_from_slice(bytes);
        self.set_slot(slot_num, new_offset as u64);
        self.set_free_offset(new_offset as u16);
        Ok(None)
    }

    /// Writes a tombstone into the slot. The record bytes stay behind as
    /// dead space.
    pub fn delete_record(&mut self, slot_num: u16) -> Result<()> {
        self.check_slot(slot_num)?;
        self.set_slot(slot_num, 0);
        Ok(())
    }

    /// Redirects the slot to a record that now lives elsewhere in the
    /// same file.
    pub fn set_forwarded_address(&mut self, slot_num: u16, addr: ForwardedAddress) -> Result<()> {
        self.check_slot(slot_num)?;
        self.set_slot(slot_num, encode_forwarded(addr));
        Ok(())
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

fn is_forwarded(entry: u64) -> bool {
    entry >> 48 == FORWARDED_SENTINEL
}

fn encode_forwarded(addr: ForwardedAddress) -> u64 {
    FORWARDED_SENTINEL << 48 | (addr.page_num as u64) << 16 | addr.slot_num as u64
}

fn decode_forwarded(entry: u64) -> ForwardedAddress {
    ForwardedAddress {
        page_num: (entry >> 16) as u32,
        slot_num: entry as u16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::record::Record;

    fn record_with_string(text: &str) -> Record {
        let mut r = Record::new(1).unwrap();
        r.set_string(0, text).unwrap();
        r
    }

    #[test]
    fn page_header_is_4_bytes() {
        assert_eq!(std::mem::size_of::<PageHeader>(), PAGE_HEADER_SIZE);
    }

    #[test]
    fn page_header_round_trips_little_endian() {
        let mut header = PageHeader::new();
        header.set_num_slots(3);
        header.set_free_offset(0x1FF0);

        let bytes = header.as_bytes();
        assert_eq!(bytes, &[0x03, 0x00, 0xF0, 0x1F]);

        let parsed = PageHeader::from_bytes(bytes).unwrap();
        assert_eq!(parsed.num_slots(), 3);
        assert_eq!(parsed.free_offset(), 0x1FF0);
    }

    #[test]
    fn new_page_is_empty() {
        let page = Page::new();

        assert_eq!(page.num_slots(), 0);
        assert_eq!(page.free_offset(), PAGE_SIZE as u16);
    }

    #[test]
    fn add_record_assigns_sequential_slots() {
        let mut page = Page::new();

        let mut r1 = Record::new(2).unwrap();
        r1.set_string(0, "hello").unwrap();
        r1.set_int32(1, -7).unwrap();

        let mut r2 = Record::new(1).unwrap();
        r2.set_uint32(0, 2048).unwrap();

        assert_eq!(page.add_record(&r1).unwrap(), 0);
        assert_eq!(page.add_record(&r2).unwrap(), 1);
        assert_eq!(page.num_slots(), 2);

        let used = r1.length() + r2.length();
        assert_eq!(page.free_offset(), PAGE_SIZE as u16 - used);
    }

    #[test]
    fn get_record_returns_stored_bytes() {
        let mut page = Page::new();
        let record = record_with_string("this is a record");
        let slot = page.add_record(&record).unwrap();

        match page.get_record(slot).unwrap() {
            RecordSlot::Record(view) => {
                assert_eq!(view.data(), record.as_bytes());
                assert_eq!(
                    view.get_string(0).unwrap().as_deref(),
                    Some("this is a record")
                );
            }
            RecordSlot::Forwarded(addr) => panic!("unexpected forward to {:?}", addr),
        }
    }

    #[test]
    fn page_fills_after_255_records_of_24_bytes() {
        let mut page = Page::new();
        let record = record_with_string("this is a record");
        assert_eq!(record.length(), 24);

        // Each record costs 24 bytes plus an 8-byte slot entry, so
        // (8192 - 4) / 32 = 255 records fit.
        for _ in 0..255 {
            page.add_record(&record).unwrap();
        }
        assert_eq!(page.num_slots(), 255);

        let err = page.add_record(&record).unwrap_err();
        let full = err.downcast_ref::<PageFullError>().unwrap();
        assert_eq!(full.needed, 24);
        assert_eq!(full.available, 20);
    }

    #[test]
    fn deleted_slot_reports_tombstone() {
        let mut page = Page::new();
        let record = record_with_string("gone");
        let slot = page.add_record(&record).unwrap();

        page.delete_record(slot).unwrap();

        let err = page.get_record(slot).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RecordDeletedError>(),
            Some(&RecordDeletedError { slot_num: slot })
        );

        let err = page.update_record(slot, &record).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RecordDeletedError>(),
            Some(&RecordDeletedError { slot_num: slot })
        );
    }

    #[test]
    fn update_in_place_keeps_offset() {
        let mut page = Page::new();
        let mut record = record_with_string("original text");
        let slot = page.add_record(&record).unwrap();
        let offset_before = page.free_offset();

        record.set_string(0, "shorter").unwrap();
        assert!(page.update_record(slot, &record).unwrap().is_none());

        assert_eq!(page.free_offset(), offset_before);
        match page.get_record(slot).unwrap() {
            RecordSlot::Record(view) => {
                assert_eq!(view.get_string(0).unwrap().as_deref(), Some("shorter"));
            }
            RecordSlot::Forwarded(_) => panic!("record should be local"),
        }
    }

    #[test]
    fn update_grown_record_relocates_within_page() {
        let mut page = Page::new();
        let small = record_with_string("ab");
        let slot = page.add_record(&small).unwrap();
        let offset_before = page.free_offset();

        let grown = record_with_string("a considerably longer payload");
        assert!(page.update_record(slot, &grown).unwrap().is_none());

        // Relocated to the tail: the free offset dropped and the slot now
        // points below the original record.
        assert!(page.free_offset() < offset_before);
        match page.get_record(slot).unwrap() {
            RecordSlot::Record(view) => {
                assert_eq!(
                    view.get_string(0).unwrap().as_deref(),
                    Some("a considerably longer payload")
                );
            }
            RecordSlot::Forwarded(_) => panic!("record should be local"),
        }
    }

    #[test]
    fn update_grown_record_fails_when_page_is_full() {
        let mut page = Page::new();
        let record = record_with_string("this is a record");
        let slot = page.add_record(&record).unwrap();
        while page.add_record(&record).is_ok() {}

        let grown = record_with_string("this is a record that grew past its span");
        let err = page.update_record(slot, &grown).unwrap_err();
        assert!(err.downcast_ref::<PageFullError>().is_some());
    }

    #[test]
    fn forwarded_address_round_trips_through_slot() {
        let mut page = Page::new();
        let record = record_with_string("moving out");
        let slot = page.add_record(&record).unwrap();

        let addr = ForwardedAddress {
            page_num: 81920,
            slot_num: 7,
        };
        page.set_forwarded_address(slot, addr).unwrap();

        match page.get_record(slot).unwrap() {
            RecordSlot::Forwarded(found) => assert_eq!(found, addr),
            RecordSlot::Record(_) => panic!("slot should forward"),
        }
        match page.update_record(slot, &record).unwrap() {
            Some(found) => assert_eq!(found, addr),
            None => panic!("update should report the forward"),
        }
    }

    #[test]
    fn page_bytes_round_trip() {
        let mut page = Page::new();
        let record = record_with_string("persist me");
        let slot = page.add_record(&record).unwrap();

        let restored = Page::from_bytes(page.as_bytes()).unwrap();
        assert_eq!(restored.num_slots(), page.num_slots());
        assert_eq!(restored.free_offset(), page.free_offset());
        match restored.get_record(slot).unwrap() {
            RecordSlot::Record(view) => {
                assert_eq!(view.get_string(0).unwrap().as_deref(), Some("persist me"));
            }
            RecordSlot::Forwarded(_) => panic!("record should be local"),
        }
    }

    #[test]
    fn from_bytes_rejects_a_corrupt_header() {
        let mut bytes = vec![0u8; PAGE_SIZE];
        // 100 slots but a free offset inside the slot array.
        bytes[0] = 100;
        bytes[2] = 16;

        let err = Page::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("slot array"));
    }

    #[test]
    fn slot_out_of_range_is_an_error() {
        let page = Page::new();
        assert!(page.get_record(0).is_err());
    }
}

//! On-disk layout of data pages.
//!
//! `[header][slot bytes][packed fixed-size tuples]`: a 12-byte chain header,
//! one occupancy byte per slot (0 free, 1 used), then the tuple payloads
//! back to back.

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_into_slice};
use common::{DbError, DbResult, PageNum};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use storage::PAGE_SIZE;

pub(crate) const PAGE_HEADER_BYTES: usize = 12;

fn bincode_config() -> impl Config {
    config::legacy()
}

/// Chain links and slot count at the start of every data page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PageHeader {
    pub next_page: PageNum,
    pub prev_page: PageNum,
    pub num_slots: i32,
}

pub(crate) fn read_header(page: &[u8]) -> DbResult<PageHeader> {
    let (header, read) = decode_from_slice(&page[..PAGE_HEADER_BYTES], bincode_config())
        .map_err(|e| DbError::WriteFailed(format!("page header decode failed: {e}")))?;
    debug_assert_eq!(read, PAGE_HEADER_BYTES);
    Ok(header)
}

pub(crate) fn write_header(page: &mut [u8], header: &PageHeader) -> DbResult<()> {
    let written = encode_into_slice(header, &mut page[..PAGE_HEADER_BYTES], bincode_config())
        .map_err(|e| DbError::WriteFailed(format!("page header encode failed: {e}")))?;
    debug_assert_eq!(written, PAGE_HEADER_BYTES);
    Ok(())
}

/// Slots a page can hold for the given record width: each record costs its
/// payload plus one occupancy byte.
pub(crate) fn records_per_page(record_size: usize) -> usize {
    (PAGE_SIZE - PAGE_HEADER_BYTES) / (record_size + 1)
}

pub(crate) fn slot_used(page: &[u8], slot: usize) -> bool {
    page[PAGE_HEADER_BYTES + slot] != 0
}

pub(crate) fn set_slot(page: &mut [u8], slot: usize, used: bool) {
    page[PAGE_HEADER_BYTES + slot] = used as u8;
}

/// Byte range of tuple `slot` on a page with `num_slots` slots.
pub(crate) fn tuple_range(num_slots: usize, record_size: usize, slot: usize) -> Range<usize> {
    let start = PAGE_HEADER_BYTES + num_slots + slot * record_size;
    start..start + record_size
}

/// Store a payload in the first free slot, marking it used. Returns the
/// slot index, or `None` when the page is full. The caller marks the page
/// dirty.
pub(crate) fn insert_into_page(
    page: &mut [u8],
    record_size: usize,
    payload: &[u8],
) -> DbResult<Option<usize>> {
    debug_assert_eq!(payload.len(), record_size);
    let header = read_header(page)?;
    let num_slots = header.num_slots as usize;
    for slot in 0..num_slots {
        if !slot_used(page, slot) {
            page[tuple_range(num_slots, record_size, slot)].copy_from_slice(payload);
            set_slot(page, slot, true);
            return Ok(Some(slot));
        }
    }
    Ok(None)
}

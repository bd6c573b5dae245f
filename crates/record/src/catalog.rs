//! On-disk layout of the system catalog (page 0).
//!
//! The catalog is a header followed by a fixed-capacity array of table
//! descriptors, all encoded with fixed-width little-endian integers so the
//! structures land at stable offsets inside the page.

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_into_slice};
use common::{Attribute, DbError, DbResult, PageNum, Schema};
use serde::{Deserialize, Serialize};
use storage::PAGE_SIZE;
use types::DataType;

pub(crate) const CATALOG_PAGE: PageNum = 0;

pub(crate) const TABLE_NAME_LEN: usize = 16;
pub(crate) const ATTR_NAME_LEN: usize = 16;
pub(crate) const MAX_NUM_ATTR: usize = 8;
pub(crate) const MAX_NUM_KEYS: usize = 4;

const HEADER_BYTES: usize = 12;
const DESC_BYTES: usize = 240;

/// Table descriptors that fit on the catalog page after the header.
pub(crate) const MAX_NUM_TABLES: usize = (PAGE_SIZE - HEADER_BYTES) / DESC_BYTES;

// The catalog page must hold the header and at least one descriptor.
const _: () = assert!(MAX_NUM_TABLES > 0);

fn bincode_config() -> impl Config {
    config::legacy()
}

/// Global counters at the start of page 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CatalogHeader {
    /// Pages allocated in the file, catalog page included.
    pub total_num_pages: i32,
    /// Head of the free-page list, `NO_PAGE` when empty.
    pub free_page: PageNum,
    pub num_tables: i32,
}

/// One table's entry in the catalog array.
///
/// Names are NUL-padded fixed buffers; writes truncate to capacity minus
/// the terminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TableDesc {
    pub name: [u8; TABLE_NAME_LEN],
    pub num_attr: i32,
    pub attr_names: [[u8; ATTR_NAME_LEN]; MAX_NUM_ATTR],
    pub data_types: [i32; MAX_NUM_ATTR],
    pub type_lengths: [i32; MAX_NUM_ATTR],
    pub key_size: i32,
    pub key_attrs: [i32; MAX_NUM_KEYS],
    pub num_tuples: i32,
    pub page_num: PageNum,
}

impl TableDesc {
    pub fn from_schema(name: &str, schema: &Schema) -> Self {
        let mut desc = Self {
            name: [0; TABLE_NAME_LEN],
            num_attr: schema.num_attrs() as i32,
            attr_names: [[0; ATTR_NAME_LEN]; MAX_NUM_ATTR],
            data_types: [0; MAX_NUM_ATTR],
            type_lengths: [0; MAX_NUM_ATTR],
            key_size: schema.keys.len() as i32,
            key_attrs: [0; MAX_NUM_KEYS],
            num_tuples: 0,
            page_num: common::NO_PAGE,
        };
        copy_bounded(&mut desc.name, name);
        for (i, attr) in schema.attrs.iter().enumerate() {
            copy_bounded(&mut desc.attr_names[i], &attr.name);
            let (tag, len) = type_tag(attr.dtype);
            desc.data_types[i] = tag;
            desc.type_lengths[i] = len;
        }
        for (i, key) in schema.keys.iter().enumerate() {
            desc.key_attrs[i] = *key as i32;
        }
        desc
    }

    pub fn name_str(&self) -> String {
        bounded_str(&self.name)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name_str() == name
    }

    /// Materialize the stored schema as an owned value.
    pub fn to_schema(&self) -> DbResult<Schema> {
        let mut attrs = Vec::with_capacity(self.num_attr as usize);
        for i in 0..self.num_attr as usize {
            attrs.push(Attribute::new(
                bounded_str(&self.attr_names[i]),
                type_from_tag(self.data_types[i], self.type_lengths[i])?,
            ));
        }
        let keys = self.key_attrs[..self.key_size as usize]
            .iter()
            .map(|&k| k as usize)
            .collect();
        Ok(Schema::new(attrs, keys))
    }
}

pub(crate) fn read_header(page: &[u8]) -> DbResult<CatalogHeader> {
    let (header, read) = decode_from_slice(&page[..HEADER_BYTES], bincode_config())
        .map_err(|e| DbError::WriteFailed(format!("catalog header decode failed: {e}")))?;
    debug_assert_eq!(read, HEADER_BYTES);
    Ok(header)
}

pub(crate) fn write_header(page: &mut [u8], header: &CatalogHeader) -> DbResult<()> {
    let written = encode_into_slice(header, &mut page[..HEADER_BYTES], bincode_config())
        .map_err(|e| DbError::WriteFailed(format!("catalog header encode failed: {e}")))?;
    debug_assert_eq!(written, HEADER_BYTES);
    Ok(())
}

fn desc_offset(index: usize) -> usize {
    HEADER_BYTES + index * DESC_BYTES
}

pub(crate) fn read_desc(page: &[u8], index: usize) -> DbResult<TableDesc> {
    let start = desc_offset(index);
    let (desc, read) = decode_from_slice(&page[start..start + DESC_BYTES], bincode_config())
        .map_err(|e| DbError::WriteFailed(format!("table descriptor decode failed: {e}")))?;
    debug_assert_eq!(read, DESC_BYTES);
    Ok(desc)
}

pub(crate) fn write_desc(page: &mut [u8], index: usize, desc: &TableDesc) -> DbResult<()> {
    let start = desc_offset(index);
    let written = encode_into_slice(
        desc,
        &mut page[start..start + DESC_BYTES],
        bincode_config(),
    )
    .map_err(|e| DbError::WriteFailed(format!("table descriptor encode failed: {e}")))?;
    debug_assert_eq!(written, DESC_BYTES);
    Ok(())
}

/// Copy `src` into a NUL-padded buffer, truncating to capacity minus the
/// terminator.
fn copy_bounded(dst: &mut [u8], src: &str) {
    let n = src.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&src.as_bytes()[..n]);
}

fn bounded_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn type_tag(dtype: DataType) -> (i32, i32) {
    match dtype {
        DataType::Int => (0, 0),
        DataType::Text(len) => (1, len as i32),
        DataType::Float => (2, 0),
        DataType::Bool => (3, 0),
    }
}

fn type_from_tag(tag: i32, len: i32) -> DbResult<DataType> {
    match tag {
        0 => Ok(DataType::Int),
        1 => Ok(DataType::Text(len as usize)),
        2 => Ok(DataType::Float),
        3 => Ok(DataType::Bool),
        _ => Err(DbError::WriteFailed(format!("unknown data type tag {tag}"))),
    }
}

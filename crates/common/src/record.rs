use crate::{DbError, DbResult, NO_PAGE, Rid, Schema};
use types::{DataType, Value};

/// A fixed-size row image plus the identifier of the slot it came from.
///
/// `data` always holds exactly `schema.record_size()` bytes. A freshly
/// created record is zero-filled and carries no identifier until it is
/// inserted into a table.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: Rid,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(schema: &Schema) -> Self {
        Self {
            id: Rid {
                page: NO_PAGE,
                slot: -1,
            },
            data: vec![0u8; schema.record_size()],
        }
    }

    /// Write one attribute value into the record buffer.
    ///
    /// Text values longer than the declared capacity are truncated; shorter
    /// ones are NUL-padded, so the terminator is always present.
    pub fn set_attr(&mut self, schema: &Schema, attr: usize, value: &Value) -> DbResult<()> {
        if attr >= schema.num_attrs() {
            return Err(DbError::WriteFailed(format!(
                "attribute {attr} out of range"
            )));
        }
        let offset = schema.attr_offset(attr);
        let size = schema.attr_size(attr);
        let dst = &mut self.data[offset..offset + size];
        match (schema.attrs[attr].dtype, value) {
            (DataType::Int, Value::Int(v)) => dst.copy_from_slice(&v.to_le_bytes()),
            (DataType::Float, Value::Float(v)) => dst.copy_from_slice(&v.to_le_bytes()),
            (DataType::Bool, Value::Bool(v)) => dst[0] = *v as u8,
            (DataType::Text(len), Value::Text(s)) => {
                let bytes = s.as_bytes();
                let n = bytes.len().min(len);
                dst[..n].copy_from_slice(&bytes[..n]);
                dst[n..].fill(0);
            }
            (dtype, value) => {
                return Err(DbError::WriteFailed(format!(
                    "attribute {attr} is {dtype:?}, got {value:?}"
                )));
            }
        }
        Ok(())
    }

    /// Read one attribute value out of the record buffer.
    pub fn get_attr(&self, schema: &Schema, attr: usize) -> DbResult<Value> {
        if attr >= schema.num_attrs() {
            return Err(DbError::WriteFailed(format!(
                "attribute {attr} out of range"
            )));
        }
        let offset = schema.attr_offset(attr);
        let size = schema.attr_size(attr);
        let src = &self.data[offset..offset + size];
        let value = match schema.attrs[attr].dtype {
            DataType::Int => Value::Int(i32::from_le_bytes(src.try_into().unwrap())),
            DataType::Float => Value::Float(f32::from_le_bytes(src.try_into().unwrap())),
            DataType::Bool => Value::Bool(src[0] != 0),
            DataType::Text(_) => {
                let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
                Value::Text(String::from_utf8_lossy(&src[..end]).into_owned())
            }
        };
        Ok(value)
    }
}

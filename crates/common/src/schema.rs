use types::DataType;

/// A named, typed column of a table.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub dtype: DataType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Ordered attribute list plus the ordinals of the key attributes.
///
/// Records laid out under a schema are flat byte strings: each attribute
/// occupies exactly `dtype.size()` bytes, in declaration order, with no
/// padding.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    pub attrs: Vec<Attribute>,
    pub keys: Vec<usize>,
}

impl Schema {
    pub fn new(attrs: Vec<Attribute>, keys: Vec<usize>) -> Self {
        Self { attrs, keys }
    }

    pub fn num_attrs(&self) -> usize {
        self.attrs.len()
    }

    /// On-disk width of attribute `i`.
    pub fn attr_size(&self, i: usize) -> usize {
        self.attrs[i].dtype.size()
    }

    /// Byte offset of attribute `i` inside a record. O(num_attrs), which is
    /// bounded by the catalog's attribute capacity.
    pub fn attr_offset(&self, i: usize) -> usize {
        self.attrs[..i].iter().map(|a| a.dtype.size()).sum()
    }

    /// Total record width under this schema.
    pub fn record_size(&self) -> usize {
        self.attrs.iter().map(|a| a.dtype.size()).sum()
    }
}

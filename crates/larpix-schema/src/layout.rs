//! Column layouts and the positional rows built from them.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, SchemaError};

/// Storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "len")]
pub enum ColumnType {
    U8,
    U16,
    U32,
    U64,
    /// Fixed-width byte string, NUL padded.
    Text(usize),
    /// Fixed-length array of bytes.
    U8Array(usize),
}

impl ColumnType {
    /// Largest value an unsigned column holds.
    pub const fn max_uint(self) -> Option<u64> {
        match self {
            ColumnType::U8 => Some(u8::MAX as u64),
            ColumnType::U16 => Some(u16::MAX as u64),
            ColumnType::U32 => Some(u32::MAX as u64),
            ColumnType::U64 => Some(u64::MAX),
            ColumnType::Text(_) | ColumnType::U8Array(_) => None,
        }
    }

    /// Value a freshly zeroed row holds in this column.
    pub fn default_value(self) -> RowValue {
        match self {
            ColumnType::Text(_) => RowValue::Text(String::new()),
            ColumnType::U8Array(len) => RowValue::Array(vec![0; len]),
            _ => RowValue::UInt(0),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::U8 => f.write_str("u1"),
            ColumnType::U16 => f.write_str("u2"),
            ColumnType::U32 => f.write_str("u4"),
            ColumnType::U64 => f.write_str("u8"),
            ColumnType::Text(len) => write!(f, "S{len}"),
            ColumnType::U8Array(len) => write!(f, "({len},)u1"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

/// Named tables a version may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Packet table of version 0.0.
    RawPacket,
    Packets,
    Messages,
    Configs,
}

impl Dataset {
    pub const fn name(self) -> &'static str {
        match self {
            Dataset::RawPacket => "raw_packet",
            Dataset::Packets => "packets",
            Dataset::Messages => "messages",
            Dataset::Configs => "configs",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cell of a persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RowValue {
    UInt(u64),
    Text(String),
    Array(Vec<u8>),
}

pub type Row = Vec<RowValue>;

/// Ordered columns of one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    dataset: Dataset,
    columns: Vec<Column>,
}

impl Layout {
    pub fn new(dataset: Dataset, columns: Vec<Column>) -> Self {
        Self { dataset, columns }
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub(crate) fn column(&self, name: &str) -> Result<(usize, Column)> {
        self.index_of(name)
            .map(|index| (index, self.columns[index]))
            .ok_or_else(|| SchemaError::MissingColumn {
                dataset: self.dataset.name().to_string(),
                column: name.to_string(),
            })
    }

    pub(crate) fn extend(&mut self, columns: &[Column]) -> Result<()> {
        for column in columns {
            if self.index_of(column.name).is_some() {
                return Err(SchemaError::InvalidLayout(format!(
                    "column '{}' appended twice to {}",
                    column.name, self.dataset
                )));
            }
            self.columns.push(*column);
        }
        Ok(())
    }

    /// Row with every column at its default.
    pub fn default_row(&self) -> Row {
        self.columns.iter().map(|column| column.ty.default_value()).collect()
    }

    /// Read-only view of `row` addressed by column name.
    pub fn view<'a>(&'a self, row: &'a [RowValue]) -> RowView<'a> {
        RowView { layout: self, row }
    }

    /// Mutable view of `row` addressed by column name.
    pub fn view_mut<'a>(&'a self, row: &'a mut Row) -> RowViewMut<'a> {
        RowViewMut { layout: self, row }
    }
}

/// Row cells looked up by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    layout: &'a Layout,
    row: &'a [RowValue],
}

impl<'a> RowView<'a> {
    fn cell(&self, name: &str) -> Result<&'a RowValue> {
        let (index, _) = self.layout.column(name)?;
        self.row.get(index).ok_or_else(|| SchemaError::MissingColumn {
            dataset: self.layout.dataset.name().to_string(),
            column: name.to_string(),
        })
    }

    pub fn uint(&self, name: &str) -> Result<u64> {
        match self.cell(name)? {
            RowValue::UInt(value) => Ok(*value),
            _ => Err(SchemaError::invalid_cell(name, "expected an unsigned integer")),
        }
    }

    /// Unsigned cell narrowed to `T`.
    pub fn narrow<T: TryFrom<u64>>(&self, name: &str) -> Result<T> {
        let value = self.uint(name)?;
        T::try_from(value).map_err(|_| SchemaError::invalid_cell(name, format!("{value} out of range")))
    }

    pub fn text(&self, name: &str) -> Result<&'a str> {
        match self.cell(name)? {
            RowValue::Text(value) => Ok(value),
            _ => Err(SchemaError::invalid_cell(name, "expected text")),
        }
    }

    pub fn bytes(&self, name: &str) -> Result<&'a [u8]> {
        match self.cell(name)? {
            RowValue::Array(value) => Ok(value),
            _ => Err(SchemaError::invalid_cell(name, "expected a byte array")),
        }
    }
}

/// Row cells written by column name. Values are fitted to the column type.
pub struct RowViewMut<'a> {
    layout: &'a Layout,
    row: &'a mut Row,
}

impl RowViewMut<'_> {
    /// Store an integer, wrapping it to the column width. Text columns
    /// receive its decimal form.
    pub fn set_uint(&mut self, name: &str, value: u64) -> Result<()> {
        let (index, column) = self.layout.column(name)?;
        self.row[index] = match column.ty {
            ColumnType::Text(len) => RowValue::Text(fit_text(&value.to_string(), len)),
            ColumnType::U8Array(_) => {
                return Err(SchemaError::invalid_cell(name, "cannot store an integer in an array"))
            }
            ty => RowValue::UInt(value & ty.max_uint().unwrap_or(u64::MAX)),
        };
        Ok(())
    }

    /// Store an integer only if the column exists.
    pub fn set_uint_if_present(&mut self, name: &str, value: u64) -> Result<()> {
        if self.layout.index_of(name).is_some() {
            self.set_uint(name, value)?;
        }
        Ok(())
    }

    pub fn set_text(&mut self, name: &str, value: &str) -> Result<()> {
        let (index, column) = self.layout.column(name)?;
        match column.ty {
            ColumnType::Text(len) => {
                self.row[index] = RowValue::Text(fit_text(value, len));
                Ok(())
            }
            _ => Err(SchemaError::invalid_cell(name, "expected a text column")),
        }
    }

    /// Store bytes into an array column, zero padded to its length.
    pub fn set_bytes(&mut self, name: &str, value: &[u8]) -> Result<()> {
        let (index, column) = self.layout.column(name)?;
        let ColumnType::U8Array(len) = column.ty else {
            return Err(SchemaError::invalid_cell(name, "expected an array column"));
        };
        if value.len() > len {
            return Err(SchemaError::invalid_cell(
                name,
                format!("{} values exceed the column length {len}", value.len()),
            ));
        }
        let mut cell = vec![0u8; len];
        cell[..value.len()].copy_from_slice(value);
        self.row[index] = RowValue::Array(cell);
        Ok(())
    }
}

/// Cut `text` to at most `len` bytes on a character boundary.
fn fit_text(text: &str, len: usize) -> String {
    if text.len() <= len {
        return text.to_string();
    }
    let mut end = len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

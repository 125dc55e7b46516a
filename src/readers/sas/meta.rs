//! Page headers, subheader pointers and the column metadata they describe.

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::error::Error;
use crate::types::{Column, Result};

use super::bytes::{bytes, decode_text, read_u8, Layout};
use super::convert::column_kind;
use super::decompress::Compression;

/// Pointer compression flag of a subheader cut short by the page end
pub const TRUNCATED_SUBHEADER: u8 = 1;

/// Pointer compression flag of a compressed data row
pub const COMPRESSED_SUBHEADER: u8 = 4;

/// Pointer type of a data row stored as a subheader
pub const DATA_SUBHEADER_TYPE: u8 = 1;

/// Kind of page, from the masked page type word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Meta,
    Data,
    Mix,
    Amd,
    Comp,
}

impl PageType {
    pub fn from_code(code: u16) -> Option<Self> {
        match code & 0xFF00 {
            0x0000 | 0x4000 => Some(PageType::Meta),
            0x0100 => Some(PageType::Data),
            0x0200 => Some(PageType::Mix),
            0x0400 => Some(PageType::Amd),
            0x9000 => Some(PageType::Comp),
            _ => None,
        }
    }

    /// Whether the page carries a subheader pointer table
    pub fn has_subheaders(self) -> bool {
        matches!(self, PageType::Meta | PageType::Mix | PageType::Amd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub block_count: usize,
    pub subheader_count: usize,
}

impl PageHeader {
    pub fn parse(page: &[u8], layout: Layout, page_number: usize) -> Result<Self> {
        let base = layout.page_bit_offset();
        let code = layout.endianness.read_u16(page, base)?;
        let page_type = PageType::from_code(code).ok_or_else(|| {
            Error::Format(format!("page {} has unknown type: {:#06x}", page_number, code))
        })?;
        Ok(Self {
            page_type,
            block_count: usize::from(layout.endianness.read_u16(page, base + 2)?),
            subheader_count: usize::from(layout.endianness.read_u16(page, base + 4)?),
        })
    }
}

/// Location of a subheader within its page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubheaderPointer {
    pub offset: usize,
    pub length: usize,
    pub compression: u8,
    pub kind: u8,
}

impl SubheaderPointer {
    pub fn is_data_candidate(&self) -> bool {
        self.kind == DATA_SUBHEADER_TYPE
            && (self.compression == COMPRESSED_SUBHEADER || self.compression == 0)
    }
}

/// Reads the pointer table that follows the page header
pub fn read_pointers(page: &[u8], layout: Layout, count: usize) -> Result<Vec<SubheaderPointer>> {
    let int_len = layout.int_len();
    let table = layout.page_bit_offset() + 8;
    (0..count)
        .map(|i| {
            let base = table + i * layout.pointer_len();
            Ok(SubheaderPointer {
                offset: layout.read_usize(page, base)?,
                length: layout.read_usize(page, base + int_len)?,
                compression: read_u8(page, base + 2 * int_len)?,
                kind: read_u8(page, base + 2 * int_len + 1)?,
            })
        })
        .collect()
}

/// Offset of the first row on a mix page: after the pointer table, 8-byte aligned
pub fn mix_rows_offset(layout: Layout, subheader_count: usize) -> usize {
    let end = layout.page_bit_offset() + 8 + subheader_count * layout.pointer_len();
    end + end % 8
}

/// Metadata subheader kinds, keyed by the low 32 bits of their signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subheader {
    RowSize,
    ColumnSize,
    Counts,
    ColumnText,
    ColumnName,
    ColumnAttributes,
    FormatAndLabel,
    ColumnList,
}

impl Subheader {
    pub fn from_signature(signature: u32) -> Option<Self> {
        match signature {
            0xF7F7_F7F7 => Some(Subheader::RowSize),
            0xF6F6_F6F6 => Some(Subheader::ColumnSize),
            0xFFFF_FC00 => Some(Subheader::Counts),
            0xFFFF_FFFD => Some(Subheader::ColumnText),
            0xFFFF_FFFF => Some(Subheader::ColumnName),
            0xFFFF_FFFC => Some(Subheader::ColumnAttributes),
            0xFFFF_FBFE => Some(Subheader::FormatAndLabel),
            0xFFFF_FFFE => Some(Subheader::ColumnList),
            _ => None,
        }
    }

    pub fn signature(self) -> u32 {
        match self {
            Subheader::RowSize => 0xF7F7_F7F7,
            Subheader::ColumnSize => 0xF6F6_F6F6,
            Subheader::Counts => 0xFFFF_FC00,
            Subheader::ColumnText => 0xFFFF_FFFD,
            Subheader::ColumnName => 0xFFFF_FFFF,
            Subheader::ColumnAttributes => 0xFFFF_FFFC,
            Subheader::FormatAndLabel => 0xFFFF_FBFE,
            Subheader::ColumnList => 0xFFFF_FFFE,
        }
    }
}

/// Reference into one of the column text blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextRef {
    block: usize,
    offset: usize,
    length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attributes {
    offset: usize,
    length: usize,
    is_number: bool,
}

/// Column metadata collected across all metadata subheaders
#[derive(Debug, Default)]
pub struct Metadata {
    pub row_length: usize,
    pub row_count: usize,
    pub mix_page_row_count: usize,
    pub column_count: usize,
    pub compression: Compression,
    col_count_p1: usize,
    col_count_p2: usize,
    seen_row_size: bool,
    seen_column_size: bool,
    text_blocks: Vec<Vec<u8>>,
    names: Vec<TextRef>,
    attributes: Vec<Attributes>,
    formats: Vec<(TextRef, TextRef)>,
}

impl Metadata {
    /// Records the contents of one metadata subheader
    pub fn process(
        &mut self,
        kind: Subheader,
        page: &[u8],
        pointer: &SubheaderPointer,
        layout: Layout,
    ) -> Result<()> {
        let sub = bytes(page, pointer.offset, pointer.length)?;
        let int_len = layout.int_len();
        let u16_at = |off: usize| layout.endianness.read_u16(sub, off).map(usize::from);

        match kind {
            Subheader::RowSize => {
                self.row_length = layout.read_usize(sub, 5 * int_len)?;
                self.row_count = layout.read_usize(sub, 6 * int_len)?;
                self.col_count_p1 = layout.read_usize(sub, 9 * int_len)?;
                self.col_count_p2 = layout.read_usize(sub, 10 * int_len)?;
                self.mix_page_row_count = layout.read_usize(sub, 15 * int_len)?;
                self.seen_row_size = true;
            }
            Subheader::ColumnSize => {
                self.column_count = layout.read_usize(sub, int_len)?;
                self.seen_column_size = true;
            }
            Subheader::ColumnText => {
                let size = u16_at(int_len)?;
                let block = bytes(sub, int_len, size)?.to_vec();
                if self.text_blocks.is_empty() {
                    self.compression = Compression::detect(&block)?;
                }
                self.text_blocks.push(block);
            }
            Subheader::ColumnName => {
                let count = pointer.length.saturating_sub(2 * int_len + 12) / 8;
                for i in 0..count {
                    let base = int_len + 8 * (i + 1);
                    self.names.push(TextRef {
                        block: u16_at(base)?,
                        offset: u16_at(base + 2)?,
                        length: u16_at(base + 4)?,
                    });
                }
            }
            Subheader::ColumnAttributes => {
                let entry = int_len + 8;
                let count = pointer.length.saturating_sub(2 * int_len + 12) / entry;
                for i in 0..count {
                    let base = i * entry;
                    self.attributes.push(Attributes {
                        offset: layout.read_usize(sub, int_len + 8 + base)?,
                        length: layout.endianness.read_u32(sub, 2 * int_len + 8 + base)? as usize,
                        is_number: read_u8(sub, 2 * int_len + 14 + base)? == 1,
                    });
                }
            }
            Subheader::FormatAndLabel => {
                let base = 3 * int_len;
                let format = TextRef {
                    block: u16_at(base + 22)?,
                    offset: u16_at(base + 24)?,
                    length: u16_at(base + 26)?,
                };
                let label = TextRef {
                    block: u16_at(base + 28)?,
                    offset: u16_at(base + 30)?,
                    length: u16_at(base + 32)?,
                };
                self.formats.push((format, label));
            }
            Subheader::Counts | Subheader::ColumnList => {}
        }
        Ok(())
    }

    fn text(&self, text_ref: TextRef, encoding: &'static Encoding) -> Result<String> {
        if text_ref.length == 0 {
            return Ok(String::new());
        }
        let block = self.text_blocks.get(text_ref.block).ok_or_else(|| {
            Error::Format(format!(
                "text block {} referenced but only {} present",
                text_ref.block,
                self.text_blocks.len()
            ))
        })?;
        Ok(decode_text(
            bytes(block, text_ref.offset, text_ref.length)?,
            encoding,
        ))
    }

    /// Format and label references may point one past the last block;
    /// they are clamped to it
    fn clamped(&self, text_ref: TextRef) -> TextRef {
        TextRef {
            block: text_ref.block.min(self.text_blocks.len().saturating_sub(1)),
            ..text_ref
        }
    }

    /// Builds the column list once every metadata subheader has been seen
    pub fn columns(&self, encoding: &'static Encoding) -> Result<Vec<Column>> {
        if !self.seen_row_size {
            return Err(Error::Format("could not find sub header: ROWSIZE".to_string()));
        }
        if !self.seen_column_size {
            return Err(Error::Format("could not find sub header: COLSIZE".to_string()));
        }
        if self.col_count_p1 + self.col_count_p2 != self.column_count {
            warn!(
                column_count = self.column_count,
                p1 = self.col_count_p1,
                p2 = self.col_count_p2,
                "column count mismatch"
            );
        }
        if self.attributes.len() < self.column_count {
            return Err(Error::Format(format!(
                "found attributes for {} of {} columns",
                self.attributes.len(),
                self.column_count
            )));
        }

        let mut columns = Vec::with_capacity(self.column_count);
        for index in 0..self.column_count {
            let attributes = self.attributes[index];
            let name = match self.names.get(index) {
                Some(text_ref) => self.text(*text_ref, encoding)?,
                None => format!("COL{}", index),
            };
            let (format, label) = match self.formats.get(index) {
                Some((format, label)) => (
                    self.text(self.clamped(*format), encoding)?,
                    self.text(self.clamped(*label), encoding)?,
                ),
                None => (String::new(), String::new()),
            };
            let format = Some(format).filter(|f| !f.is_empty());

            let end = attributes.offset.checked_add(attributes.length);
            if end.map_or(true, |end| end > self.row_length) {
                return Err(Error::Format(format!(
                    "column '{}' at offset {} with length {} lies past row length {}",
                    name, attributes.offset, attributes.length, self.row_length
                )));
            }

            let kind = column_kind(attributes.is_number, format.as_deref());
            let mut column = Column::new(index, name, kind);
            column.label = Some(label).filter(|l| !l.is_empty());
            column.format = format;
            column.offset = attributes.offset;
            column.length = attributes.length;

            debug!(
                index,
                name = %column.name,
                kind = ?column.kind,
                format = ?column.format,
                offset = column.offset,
                length = column.length,
                "column read"
            );
            columns.push(column);
        }
        Ok(columns)
    }
}

//! Writes small but structurally complete sas7bdat files for tests.
//!
//! Metadata subheaders are packed from the end of the first page backwards,
//! the way SAS lays them out, so mix pages can carry rows after the pointer
//! table.

use super::decompress::{Compression, RDC_LITERAL, RLE_LITERAL};
use super::header::MAGIC_NUMBER;
use super::meta::{Subheader, COMPRESSED_SUBHEADER, DATA_SUBHEADER_TYPE};

const HEADER_LEN: usize = 1024;
pub(crate) const PAGE_META: u16 = 0x0000;
pub(crate) const PAGE_META2: u16 = 0x4000;
pub(crate) const PAGE_DATA: u16 = 0x0100;
pub(crate) const PAGE_MIX: u16 = 0x0200;
pub(crate) const PAGE_AMD: u16 = 0x0400;
pub(crate) const PAGE_COMP: u16 = 0x9000;

/// Bit pattern SAS writes for the `.` missing value
const MISSING_BITS: u64 = 0xFFFF_FE00_0000_0000;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Cell {
    Number(Option<f64>),
    Text(&'static str),
}

#[derive(Debug, Clone)]
pub(crate) struct FixtureColumn {
    pub name: &'static str,
    pub label: &'static str,
    pub format: &'static str,
    pub is_number: bool,
    pub length: usize,
}

impl FixtureColumn {
    pub fn number(name: &'static str, format: &'static str, length: usize) -> Self {
        Self {
            name,
            label: "",
            format,
            is_number: true,
            length,
        }
    }

    pub fn text(name: &'static str, length: usize) -> Self {
        Self {
            name,
            label: "",
            format: "",
            is_number: false,
            length,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Fixture {
    pub is_64bit: bool,
    pub big_endian: bool,
    pub compression: Compression,
    pub page_size: usize,
    pub rows_per_page: usize,
    /// Rows placed on a leading mix page; zero for a pure meta page
    pub mix_rows: usize,
    /// Type word of the leading metadata page
    pub meta_page_type: u16,
    /// Raw subheader bodies appended after the column metadata
    pub extra_subheaders: Vec<Vec<u8>>,
    /// `(position, page type)` pairs spliced into the page list in order;
    /// comp pages are empty, meta and amd pages repeat the metadata subheaders
    pub inserted_pages: Vec<(usize, u16)>,
    pub columns: Vec<FixtureColumn>,
    pub rows: Vec<Vec<Cell>>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            is_64bit: false,
            big_endian: false,
            compression: Compression::None,
            page_size: 4096,
            rows_per_page: 64,
            mix_rows: 0,
            meta_page_type: PAGE_META,
            extra_subheaders: Vec::new(),
            inserted_pages: Vec::new(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// A subheader body with its pointer flags
struct Block {
    bytes: Vec<u8>,
    compression: u8,
    kind: u8,
}

impl Block {
    fn meta(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            compression: 0,
            kind: 0,
        }
    }
}

impl Fixture {
    /// One `DATE`-formatted column; `None` writes a missing value
    pub fn dates(days: &[Option<f64>]) -> Self {
        let mut column = FixtureColumn::number("date", "DATE", 8);
        column.label = "Event date";
        Self {
            columns: vec![column],
            rows: days.iter().map(|day| vec![Cell::Number(*day)]).collect(),
            ..Self::default()
        }
    }

    fn int_len(&self) -> usize {
        if self.is_64bit {
            8
        } else {
            4
        }
    }

    fn bit_offset(&self) -> usize {
        if self.is_64bit {
            32
        } else {
            16
        }
    }

    fn pointer_len(&self) -> usize {
        if self.is_64bit {
            24
        } else {
            12
        }
    }

    fn row_length(&self) -> usize {
        self.columns.iter().map(|c| c.length).sum()
    }

    fn put_u16(&self, buf: &mut [u8], off: usize, value: u16) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[off..off + 2].copy_from_slice(&bytes);
    }

    fn put_u32(&self, buf: &mut [u8], off: usize, value: u32) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[off..off + 4].copy_from_slice(&bytes);
    }

    fn put_u64(&self, buf: &mut [u8], off: usize, value: u64) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[off..off + 8].copy_from_slice(&bytes);
    }

    fn put_int(&self, buf: &mut [u8], off: usize, value: u64) {
        if self.is_64bit {
            self.put_u64(buf, off, value);
        } else {
            self.put_u32(buf, off, value as u32);
        }
    }

    fn put_text(buf: &mut [u8], off: usize, len: usize, text: &str) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(len, b' ');
        buf[off..off + len].copy_from_slice(&bytes);
    }

    /// Subheader body of `len` bytes starting with the sign-extended signature
    fn subheader(&self, kind: Subheader, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        let signature = kind.signature() as i32 as i64 as u64;
        self.put_int(&mut bytes, 0, signature);
        bytes
    }

    fn header(&self, page_count: usize) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_LEN];
        header[..32].copy_from_slice(&MAGIC_NUMBER);
        let marker = if self.is_64bit { b'3' } else { b'2' };
        header[32] = marker;
        header[35] = marker;
        header[37] = if self.big_endian { 0x00 } else { 0x01 };
        header[39] = b'1';
        header[70] = 20;
        Self::put_text(&mut header, 92, 64, "DATES");
        Self::put_text(&mut header, 156, 8, "DATA");

        let align1 = if self.is_64bit { 4 } else { 0 };
        let total_align = 2 * align1;
        let created = 22285.0f64 * 86400.0;
        self.put_u64(&mut header, 164 + align1, created.to_bits());
        self.put_u64(&mut header, 172 + align1, (created + 60.0).to_bits());
        self.put_u32(&mut header, 196 + align1, HEADER_LEN as u32);
        self.put_u32(&mut header, 200 + align1, self.page_size as u32);
        self.put_u32(&mut header, 204 + align1, page_count as u32);
        Self::put_text(&mut header, 216 + total_align, 8, "9.0401M6");
        Self::put_text(&mut header, 224 + total_align, 16, "Linux");
        header
    }

    fn metadata_blocks(&self) -> Vec<Block> {
        let w = self.int_len();
        let n = self.columns.len();
        let mut blocks = Vec::new();

        let mut row_size = self.subheader(Subheader::RowSize, 16 * w);
        self.put_int(&mut row_size, 5 * w, self.row_length() as u64);
        self.put_int(&mut row_size, 6 * w, self.rows.len() as u64);
        self.put_int(&mut row_size, 9 * w, n as u64);
        self.put_int(&mut row_size, 10 * w, 0);
        self.put_int(&mut row_size, 15 * w, self.mix_rows as u64);
        blocks.push(Block::meta(row_size));

        let mut column_size = self.subheader(Subheader::ColumnSize, 3 * w);
        self.put_int(&mut column_size, w, n as u64);
        blocks.push(Block::meta(column_size));

        // Text block: size, padding, compression literal, then names, labels, formats
        let mut text = vec![0u8; 8];
        text.extend_from_slice(match self.compression {
            Compression::Rle => RLE_LITERAL,
            Compression::Rdc => RDC_LITERAL,
            Compression::None => &b"        "[..],
        });
        let mut place = |s: &str| -> (u16, u16) {
            let offset = text.len();
            text.extend_from_slice(s.as_bytes());
            while text.len() % 4 != 0 {
                text.push(b' ');
            }
            (offset as u16, s.len() as u16)
        };
        let refs: Vec<[(u16, u16); 3]> = self
            .columns
            .iter()
            .map(|c| [place(c.name), place(c.label), place(c.format)])
            .collect();
        let text_len = text.len();
        let mut column_text = self.subheader(Subheader::ColumnText, w + text_len);
        column_text[w..].copy_from_slice(&text);
        self.put_u16(&mut column_text, w, text_len as u16);
        blocks.push(Block::meta(column_text));

        let mut column_name = self.subheader(Subheader::ColumnName, 2 * w + 12 + 8 * n);
        for (i, [(offset, len), _, _]) in refs.iter().enumerate() {
            let base = w + 8 * (i + 1);
            self.put_u16(&mut column_name, base, 0);
            self.put_u16(&mut column_name, base + 2, *offset);
            self.put_u16(&mut column_name, base + 4, *len);
        }
        blocks.push(Block::meta(column_name));

        let entry = w + 8;
        let mut attributes = self.subheader(Subheader::ColumnAttributes, 2 * w + 12 + n * entry);
        let mut offset = 0;
        for (i, column) in self.columns.iter().enumerate() {
            let base = i * entry;
            self.put_int(&mut attributes, w + 8 + base, offset as u64);
            self.put_u32(&mut attributes, 2 * w + 8 + base, column.length as u32);
            attributes[2 * w + 14 + base] = if column.is_number { 1 } else { 2 };
            offset += column.length;
        }
        blocks.push(Block::meta(attributes));

        for [_, (label_offset, label_len), (format_offset, format_len)] in &refs {
            let base = 3 * w;
            let mut format = self.subheader(Subheader::FormatAndLabel, (base + 34 + 7) / 8 * 8);
            self.put_u16(&mut format, base + 22, 0);
            self.put_u16(&mut format, base + 24, *format_offset);
            self.put_u16(&mut format, base + 26, *format_len);
            self.put_u16(&mut format, base + 28, 0);
            self.put_u16(&mut format, base + 30, *label_offset);
            self.put_u16(&mut format, base + 32, *label_len);
            blocks.push(Block::meta(format));
        }

        blocks.extend(self.extra_subheaders.iter().cloned().map(Block::meta));
        blocks
    }

    fn encode_row(&self, row: &[Cell]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.row_length());
        for (column, cell) in self.columns.iter().zip(row) {
            match cell {
                Cell::Number(value) => {
                    let bits = value.map_or(MISSING_BITS, f64::to_bits);
                    if self.big_endian {
                        out.extend_from_slice(&bits.to_be_bytes()[..column.length]);
                    } else {
                        out.extend_from_slice(&bits.to_le_bytes()[8 - column.length..]);
                    }
                }
                Cell::Text(text) => {
                    let mut bytes = text.as_bytes().to_vec();
                    bytes.resize(column.length, b' ');
                    out.extend_from_slice(&bytes);
                }
            }
        }
        out
    }

    /// Lays out one page; returns it with the in-page offset of each subheader
    fn page(&self, page_type: u16, blocks: &[Block], rows: &[Vec<u8>]) -> (Vec<u8>, Vec<usize>) {
        let mut page = vec![0u8; self.page_size];
        let w = self.int_len();
        let bit = self.bit_offset();
        let block_count = if page_type == PAGE_DATA || page_type == PAGE_MIX {
            rows.len()
        } else {
            blocks.len()
        };
        self.put_u16(&mut page, bit, page_type);
        self.put_u16(&mut page, bit + 2, block_count as u16);
        self.put_u16(&mut page, bit + 4, blocks.len() as u16);

        let table = bit + 8;
        let mut row_offset = if page_type == PAGE_DATA {
            table
        } else {
            let end = table + blocks.len() * self.pointer_len();
            end + end % 8
        };
        for row in rows {
            page[row_offset..row_offset + row.len()].copy_from_slice(row);
            row_offset += row.len();
        }

        let mut end = self.page_size;
        let mut offsets = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            let mut offset = end - block.bytes.len();
            offset -= offset % 8;
            page[offset..offset + block.bytes.len()].copy_from_slice(&block.bytes);

            let pointer = table + i * self.pointer_len();
            self.put_int(&mut page, pointer, offset as u64);
            self.put_int(&mut page, pointer + w, block.bytes.len() as u64);
            page[pointer + 2 * w] = block.compression;
            page[pointer + 2 * w + 1] = block.kind;

            offsets.push(offset);
            end = offset;
        }
        assert!(
            end >= row_offset.max(table + blocks.len() * self.pointer_len()),
            "fixture page overflow"
        );
        (page, offsets)
    }

    fn pages(&self) -> Vec<(Vec<u8>, Vec<usize>)> {
        let rows: Vec<Vec<u8>> = self.rows.iter().map(|row| self.encode_row(row)).collect();
        let mut blocks = self.metadata_blocks();
        let mut pages = Vec::new();

        if self.compression == Compression::None {
            let on_mix = self.mix_rows.min(rows.len());
            if self.mix_rows > 0 {
                pages.push(self.page(PAGE_MIX, &blocks, &rows[..on_mix]));
            } else {
                pages.push(self.page(self.meta_page_type, &blocks, &[]));
            }
            for chunk in rows[on_mix..].chunks(self.rows_per_page.max(1)) {
                pages.push(self.page(PAGE_DATA, &[], chunk));
            }
        } else {
            for row in rows {
                let packed = match self.compression {
                    Compression::Rle => rle_encode(&row),
                    _ => rdc_encode(&row),
                };
                blocks.push(if packed.len() < row.len() {
                    Block {
                        bytes: packed,
                        compression: COMPRESSED_SUBHEADER,
                        kind: DATA_SUBHEADER_TYPE,
                    }
                } else {
                    Block {
                        bytes: row,
                        compression: 0,
                        kind: DATA_SUBHEADER_TYPE,
                    }
                });
            }
            pages.push(self.page(self.meta_page_type, &blocks, &[]));
        }

        for &(position, page_type) in &self.inserted_pages {
            let page = if page_type == PAGE_COMP {
                self.page(page_type, &[], &[])
            } else {
                self.page(page_type, &self.metadata_blocks(), &[])
            };
            pages.insert(position.min(pages.len()), page);
        }
        pages
    }

    pub fn build(&self) -> Vec<u8> {
        let pages = self.pages();
        let mut file = self.header(pages.len());
        for (page, _) in pages {
            file.extend_from_slice(&page);
        }
        file
    }

    /// File offset of the first data row stored as a subheader
    pub fn first_row_offset(&self) -> usize {
        let metadata = self.metadata_blocks().len();
        let pages = self.pages();
        HEADER_LEN + pages[0].1[metadata]
    }
}

/// Greedy RLE encoder: runs become insert commands, everything else short copies
fn rle_encode(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let flush = |out: &mut Vec<u8>, literal: &mut Vec<u8>| {
        if !literal.is_empty() {
            out.push(0x80 | (literal.len() - 1) as u8);
            out.append(literal);
        }
    };

    let mut i = 0;
    while i < row.len() {
        let byte = row[i];
        let run = row[i..].iter().take_while(|&&b| b == byte).count();
        let (min_run, command, max_run) = match byte {
            0x00 => (2, 0xF0, 17),
            b' ' => (2, 0xE0, 17),
            b'@' => (2, 0xD0, 17),
            _ => (3, 0xC0, 18),
        };
        if run >= min_run {
            flush(&mut out, &mut literal);
            let n = run.min(max_run);
            out.push(command | (n - min_run) as u8);
            if command == 0xC0 {
                out.push(byte);
            }
            i += n;
        } else {
            literal.push(byte);
            i += 1;
            if literal.len() == 16 {
                flush(&mut out, &mut literal);
            }
        }
    }
    flush(&mut out, &mut literal);
    out
}

/// RDC encoder using literals and short fills only
fn rdc_encode(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut control_at = 0;
    let mut control: u16 = 0;
    let mut bits = 0;

    let mut i = 0;
    while i < row.len() {
        if bits == 0 {
            if !out.is_empty() {
                out[control_at..control_at + 2].copy_from_slice(&control.to_be_bytes());
            }
            control_at = out.len();
            out.extend_from_slice(&[0, 0]);
            control = 0;
            bits = 16;
        }
        bits -= 1;

        let byte = row[i];
        let run = row[i..].iter().take_while(|&&b| b == byte).count().min(18);
        if run >= 3 {
            control |= 1 << bits;
            out.push((run - 3) as u8);
            out.push(byte);
            i += run;
        } else {
            out.push(byte);
            i += 1;
        }
    }
    if !out.is_empty() {
        out[control_at..control_at + 2].copy_from_slice(&control.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::sas::decompress::{rdc, rle};

    #[test]
    fn test_encoders_invert_decoders() {
        let row = b"\0\0\0\0\x40\xc3\xd5\x40name      @@@@xyzzzzzzz".to_vec();
        assert_eq!(rle(&rle_encode(&row), row.len()).unwrap(), row);
        assert_eq!(rdc(&rdc_encode(&row), row.len()).unwrap(), row);
    }
}

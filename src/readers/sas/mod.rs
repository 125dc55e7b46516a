//! SAS .sas7bdat file reader
//!
//! Reads uncompressed, RLE and RDC compressed datasets in both the 32-bit and
//! 64-bit layouts, in either byte order. Pages are read one at a time; rows are
//! decoded lazily as the caller iterates.

pub mod bytes;
pub mod convert;
pub mod decompress;
pub mod header;
pub mod meta;

#[cfg(test)]
pub(crate) mod fixture;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::error::Error;
use crate::types::{Column, Result, Row, Value};

use self::bytes::{read_fully, Layout};
use self::convert::decode_cell;
use self::decompress::Compression;
use self::header::SasHeader;
use self::meta::{
    mix_rows_offset, read_pointers, Metadata, PageHeader, PageType, Subheader, SubheaderPointer,
    COMPRESSED_SUBHEADER, TRUNCATED_SUBHEADER,
};

use super::DataReader;

/// SAS .sas7bdat file reader.
///
/// The underlying source is owned by the reader and released when it is
/// dropped, whether iteration finished, stopped early or failed.
pub struct SasReader<R> {
    source: R,
    header: SasHeader,
    layout: Layout,
    metadata: Metadata,
    columns: Vec<Column>,
    page: Vec<u8>,
    page_header: Option<PageHeader>,
    pages_read: usize,
    data_pointers: Vec<SubheaderPointer>,
    row_on_page: usize,
    rows_read: usize,
    header_row_pending: bool,
    done: bool,
}

impl SasReader<BufReader<File>> {
    /// Opens a dataset on disk
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        info!(path = %path.display(), "opening sas7bdat file");
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read> SasReader<R> {
    /// Reads the header and every metadata page up to the first page holding rows
    pub fn from_reader(mut source: R) -> Result<Self> {
        let header = SasHeader::read_from(&mut source)?;
        info!(
            is_64bit = header.is_64bit,
            endianness = ?header.endianness,
            page_size = header.page_size,
            page_count = header.page_count,
            release = %header.sas_release,
            host = %header.host,
            "header read"
        );

        let layout = header.layout();
        let page = vec![0u8; header.page_size];
        let mut reader = Self {
            source,
            header,
            layout,
            metadata: Metadata::default(),
            columns: Vec::new(),
            page,
            page_header: None,
            pages_read: 0,
            data_pointers: Vec::new(),
            row_on_page: 0,
            rows_read: 0,
            header_row_pending: true,
            done: false,
        };

        while reader.advance_page(true)? {
            if reader.page_has_rows() {
                break;
            }
        }
        reader.columns = reader.metadata.columns(reader.header.text_encoding)?;
        info!(
            columns = reader.columns.len(),
            rows = reader.metadata.row_count,
            row_length = reader.metadata.row_length,
            compression = ?reader.metadata.compression,
            "metadata read"
        );
        Ok(reader)
    }

    pub fn header(&self) -> &SasHeader {
        &self.header
    }

    /// Number of data rows the file declares
    pub fn row_count(&self) -> usize {
        self.metadata.row_count
    }

    pub fn compression(&self) -> Compression {
        self.metadata.compression
    }

    /// Loads the next page; returns false once every page has been read
    fn advance_page(&mut self, collect_metadata: bool) -> Result<bool> {
        self.page_header = None;
        self.data_pointers.clear();
        self.row_on_page = 0;

        if self.pages_read >= self.header.page_count {
            return Ok(false);
        }
        let page_number = self.pages_read;
        let read = read_fully(&mut self.source, &mut self.page)?;
        if read == 0 {
            debug!(page_number, "reached end of file before declared page count");
            return Ok(false);
        }
        if read < self.page.len() {
            return Err(Error::Format(format!(
                "page {} truncated: {} of {} bytes",
                page_number,
                read,
                self.page.len()
            )));
        }
        self.pages_read += 1;

        let page_header = PageHeader::parse(&self.page, self.layout, page_number)?;
        debug!(
            page_number,
            page_type = ?page_header.page_type,
            blocks = page_header.block_count,
            subheaders = page_header.subheader_count,
            "page read"
        );
        if page_header.page_type.has_subheaders() {
            self.process_subheaders(&page_header, collect_metadata)?;
        }
        self.page_header = Some(page_header);
        Ok(true)
    }

    fn process_subheaders(&mut self, page_header: &PageHeader, collect_metadata: bool) -> Result<()> {
        let pointers = read_pointers(&self.page, self.layout, page_header.subheader_count)?;
        for pointer in pointers {
            if pointer.length == 0 || pointer.compression == TRUNCATED_SUBHEADER {
                continue;
            }
            let compressed = self.metadata.compression != Compression::None;
            if pointer.compression == COMPRESSED_SUBHEADER && pointer.is_data_candidate() {
                self.data_pointers.push(pointer);
                continue;
            }

            let signature = self.layout.read_int(&self.page, pointer.offset)? as u32;
            match Subheader::from_signature(signature) {
                Some(kind) if collect_metadata => {
                    self.metadata.process(kind, &self.page, &pointer, self.layout)?
                }
                Some(_) => {}
                None if compressed && pointer.is_data_candidate() => {
                    self.data_pointers.push(pointer)
                }
                None => {
                    return Err(Error::Format(format!(
                        "unknown subheader signature {:#010x} at offset {}",
                        signature, pointer.offset
                    )))
                }
            }
        }
        Ok(())
    }

    /// Rows available on the current page
    fn rows_on_page(&self) -> usize {
        match self.page_header {
            Some(PageHeader {
                page_type: PageType::Data,
                block_count,
                ..
            }) => block_count,
            Some(PageHeader {
                page_type: PageType::Mix,
                ..
            }) => self.metadata.mix_page_row_count,
            Some(_) => self.data_pointers.len(),
            None => 0,
        }
    }

    fn page_has_rows(&self) -> bool {
        self.rows_on_page() > 0
    }

    /// Location of the next row on the current page
    fn row_location(&self) -> (usize, usize) {
        let row_length = self.metadata.row_length;
        match self.page_header {
            Some(PageHeader {
                page_type: PageType::Data,
                ..
            }) => (
                self.layout.page_bit_offset() + 8 + self.row_on_page * row_length,
                row_length,
            ),
            Some(PageHeader {
                page_type: PageType::Mix,
                subheader_count,
                ..
            }) => (
                mix_rows_offset(self.layout, subheader_count) + self.row_on_page * row_length,
                row_length,
            ),
            _ => {
                let pointer = self.data_pointers[self.row_on_page];
                (pointer.offset, pointer.length)
            }
        }
    }

    fn decode_row(&self, stored: &[u8]) -> Result<Row> {
        let row_length = self.metadata.row_length;
        let expanded;
        let raw = if self.metadata.compression != Compression::None && stored.len() < row_length {
            expanded = self.metadata.compression.decompress(stored, row_length)?;
            &expanded[..]
        } else {
            stored
        };

        self.columns
            .iter()
            .map(|column| {
                let cell = bytes::bytes(raw, column.offset, column.length)?;
                decode_cell(cell, column, self.layout.endianness, self.header.text_encoding)
            })
            .collect()
    }

    fn read_row(&mut self) -> Result<Option<Row>> {
        if self.header_row_pending {
            self.header_row_pending = false;
            let names = self
                .columns
                .iter()
                .map(|column| Value::Text(column.name.clone()))
                .collect();
            return Ok(Some(names));
        }

        while self.rows_read < self.metadata.row_count {
            if self.row_on_page < self.rows_on_page() {
                let (offset, length) = self.row_location();
                let row = self.decode_row(bytes::bytes(&self.page, offset, length)?)?;
                self.row_on_page += 1;
                self.rows_read += 1;
                return Ok(Some(row));
            }
            if !self.advance_page(false)? {
                break;
            }
        }

        if self.rows_read < self.metadata.row_count {
            debug!(
                read = self.rows_read,
                declared = self.metadata.row_count,
                "pages ran out before the declared row count"
            );
        }
        Ok(None)
    }
}

impl<R: Read> DataReader for SasReader<R> {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> Option<Result<Row>> {
        if self.done {
            return None;
        }
        let next = self.read_row().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

impl<R: Read> Iterator for SasReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

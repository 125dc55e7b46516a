//! The fixed-layout file header that precedes the first page.

use std::io::Read;

use chrono::NaiveDateTime;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::Serialize;

use crate::error::Error;
use crate::types::Result;

use super::bytes::{bytes, decode_text, read_fully, read_u8, Endianness, Layout};
use super::convert::datetime_from_seconds;

/// Magic number that identifies a SAS7BDAT file
pub const MAGIC_NUMBER: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc2, 0xea, 0x81, 0x60,
    0xb3, 0x14, 0x11, 0xcf, 0xbd, 0x92, 0x08, 0x00, 0x09, 0xc7, 0x31, 0x8c, 0x18, 0x1f, 0x10, 0x11,
];

/// Bytes needed to decode every header field
pub const MIN_HEADER_LEN: usize = 288;

const ALIGN_1_OFFSET: usize = 32;
const ALIGN_2_OFFSET: usize = 35;
const ENDIANNESS_OFFSET: usize = 37;
const PLATFORM_OFFSET: usize = 39;
const ENCODING_OFFSET: usize = 70;
const DATASET_NAME_OFFSET: usize = 92;
const DATASET_NAME_LEN: usize = 64;
const FILE_TYPE_OFFSET: usize = 156;
const FILE_TYPE_LEN: usize = 8;
const CREATED_OFFSET: usize = 164;
const MODIFIED_OFFSET: usize = 172;
const HEADER_LEN_OFFSET: usize = 196;
const PAGE_SIZE_OFFSET: usize = 200;
const PAGE_COUNT_OFFSET: usize = 204;
const RELEASE_OFFSET: usize = 216;
const RELEASE_LEN: usize = 8;
const HOST_OFFSET: usize = 224;
const HOST_LEN: usize = 16;

/// Marker byte for the 64-bit layout and for extra alignment
const ALIGN_MARKER: u8 = b'3';
const ALIGN_PADDING: usize = 4;

/// Operating system family that wrote the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Unix,
    Windows,
    Unknown,
}

/// Decoded file header
#[derive(Debug, Clone, Serialize)]
pub struct SasHeader {
    pub is_64bit: bool,
    pub endianness: Endianness,
    pub platform: Platform,
    /// Name of the text encoding used for names, labels and text cells
    pub encoding: String,
    #[serde(skip)]
    pub(crate) text_encoding: &'static Encoding,
    pub dataset_name: String,
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<NaiveDateTime>,
    pub header_length: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub sas_release: String,
    pub host: String,
}

impl SasHeader {
    /// Decodes the header from at least `MIN_HEADER_LEN` leading bytes
    pub fn parse(prefix: &[u8]) -> Result<Self> {
        if prefix.len() < MIN_HEADER_LEN {
            return Err(Error::Format(format!(
                "header too short (not a sas7bdat file?): {} bytes",
                prefix.len()
            )));
        }
        if prefix[..MAGIC_NUMBER.len()] != MAGIC_NUMBER {
            return Err(Error::Format("magic number mismatch".to_string()));
        }

        let is_64bit = read_u8(prefix, ALIGN_1_OFFSET)? == ALIGN_MARKER;
        let align1 = if read_u8(prefix, ALIGN_2_OFFSET)? == ALIGN_MARKER {
            ALIGN_PADDING
        } else {
            0
        };
        let total_align = align1 + if is_64bit { ALIGN_PADDING } else { 0 };

        let endianness = match read_u8(prefix, ENDIANNESS_OFFSET)? {
            0x00 => Endianness::Big,
            _ => Endianness::Little,
        };
        let platform = match read_u8(prefix, PLATFORM_OFFSET)? {
            b'1' => Platform::Unix,
            b'2' => Platform::Windows,
            _ => Platform::Unknown,
        };
        let (encoding, text_encoding) = encoding_for(read_u8(prefix, ENCODING_OFFSET)?);

        let layout = Layout { is_64bit, endianness };
        let text = |off: usize, len: usize| -> Result<String> {
            Ok(decode_text(bytes(prefix, off, len)?, text_encoding))
        };
        let timestamp = |off: usize| -> Result<Option<NaiveDateTime>> {
            Ok(datetime_from_seconds(endianness.read_f64(prefix, off)?))
        };

        let header_length = endianness.read_u32(prefix, HEADER_LEN_OFFSET + align1)? as usize;
        let page_size = endianness.read_u32(prefix, PAGE_SIZE_OFFSET + align1)? as i32;
        let page_count = endianness.read_u32(prefix, PAGE_COUNT_OFFSET + align1)? as i32;

        if header_length < MIN_HEADER_LEN {
            return Err(Error::Format(format!(
                "header length {} is below the minimum of {}",
                header_length, MIN_HEADER_LEN
            )));
        }
        if page_size <= 0 {
            return Err(Error::Format(format!("page size is not positive: {}", page_size)));
        }
        if page_count < 1 {
            return Err(Error::Format(format!(
                "page count is not positive: {}",
                page_count
            )));
        }
        if (page_size as usize) < layout.page_bit_offset() + 8 {
            return Err(Error::Format(format!("page size {} is too small", page_size)));
        }

        Ok(Self {
            is_64bit,
            endianness,
            platform,
            encoding: encoding.to_string(),
            text_encoding,
            dataset_name: text(DATASET_NAME_OFFSET, DATASET_NAME_LEN)?,
            file_type: text(FILE_TYPE_OFFSET, FILE_TYPE_LEN)?,
            created: timestamp(CREATED_OFFSET + align1)?,
            modified: timestamp(MODIFIED_OFFSET + align1)?,
            header_length,
            page_size: page_size as usize,
            page_count: page_count as usize,
            sas_release: text(RELEASE_OFFSET + total_align, RELEASE_LEN)?,
            host: text(HOST_OFFSET + total_align, HOST_LEN)?,
        })
    }

    pub fn layout(&self) -> Layout {
        Layout {
            is_64bit: self.is_64bit,
            endianness: self.endianness,
        }
    }

    /// Reads and decodes the header, leaving `reader` at the first page
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut prefix = [0u8; MIN_HEADER_LEN];
        let read = read_fully(reader, &mut prefix)?;
        let header = Self::parse(&prefix[..read])?;

        let rest = (header.header_length - MIN_HEADER_LEN) as u64;
        let skipped = std::io::copy(&mut reader.by_ref().take(rest), &mut std::io::sink())?;
        if skipped != rest {
            return Err(Error::Format(format!(
                "header truncated: expected {} bytes, found {}",
                header.header_length,
                MIN_HEADER_LEN as u64 + skipped
            )));
        }
        Ok(header)
    }
}

/// Maps the header's encoding code to a decoder; unknown codes read as windows-1252
fn encoding_for(code: u8) -> (&'static str, &'static Encoding) {
    match code {
        20 => ("utf-8", UTF_8),
        28 => ("us-ascii", WINDOWS_1252),
        29 => ("iso-8859-1", WINDOWS_1252),
        62 => ("windows-1252", WINDOWS_1252),
        _ => ("windows-1252", WINDOWS_1252),
    }
}

//! Bounds-checked, byte-order aware reads from page and header buffers.

use std::io::Read;

use encoding_rs::Encoding;
use serde::Serialize;

use crate::error::Error;
use crate::types::Result;

/// Byte order of every integer and float in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

/// Word size and byte order, which together fix every offset past the magic number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub is_64bit: bool,
    pub endianness: Endianness,
}

impl Layout {
    /// Width of the file's integers
    pub fn int_len(&self) -> usize {
        if self.is_64bit {
            8
        } else {
            4
        }
    }

    /// Start of the page header within each page
    pub fn page_bit_offset(&self) -> usize {
        if self.is_64bit {
            32
        } else {
            16
        }
    }

    /// Width of one entry in a page's subheader pointer table
    pub fn pointer_len(&self) -> usize {
        if self.is_64bit {
            24
        } else {
            12
        }
    }

    /// Reads one file integer (4 or 8 bytes)
    pub fn read_int(&self, buf: &[u8], off: usize) -> Result<u64> {
        if self.is_64bit {
            self.endianness.read_u64(buf, off)
        } else {
            self.endianness.read_u32(buf, off).map(u64::from)
        }
    }

    /// Reads one file integer that is used as a size or offset
    pub fn read_usize(&self, buf: &[u8], off: usize) -> Result<usize> {
        let value = self.read_int(buf, off)?;
        usize::try_from(value)
            .map_err(|_| Error::Format(format!("value {} at offset {} overflows usize", value, off)))
    }
}

impl Endianness {
    pub fn read_u16(self, buf: &[u8], off: usize) -> Result<u16> {
        let b = array::<2>(buf, off)?;
        Ok(match self {
            Endianness::Little => u16::from_le_bytes(b),
            Endianness::Big => u16::from_be_bytes(b),
        })
    }

    pub fn read_u32(self, buf: &[u8], off: usize) -> Result<u32> {
        let b = array::<4>(buf, off)?;
        Ok(match self {
            Endianness::Little => u32::from_le_bytes(b),
            Endianness::Big => u32::from_be_bytes(b),
        })
    }

    pub fn read_u64(self, buf: &[u8], off: usize) -> Result<u64> {
        let b = array::<8>(buf, off)?;
        Ok(match self {
            Endianness::Little => u64::from_le_bytes(b),
            Endianness::Big => u64::from_be_bytes(b),
        })
    }

    pub fn read_f64(self, buf: &[u8], off: usize) -> Result<f64> {
        self.read_u64(buf, off).map(f64::from_bits)
    }
}

/// Borrows `len` bytes at `off`, failing instead of panicking on overrun
pub(crate) fn bytes(buf: &[u8], off: usize, len: usize) -> Result<&[u8]> {
    off.checked_add(len)
        .and_then(|end| buf.get(off..end))
        .ok_or_else(|| {
            Error::Format(format!(
                "read of {} bytes at offset {} overruns {}-byte buffer",
                len,
                off,
                buf.len()
            ))
        })
}

pub(crate) fn read_u8(buf: &[u8], off: usize) -> Result<u8> {
    bytes(buf, off, 1).map(|b| b[0])
}

fn array<const N: usize>(buf: &[u8], off: usize) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes(buf, off, N)?);
    Ok(out)
}

/// Decodes stored text, dropping the trailing NUL and space padding SAS writes
pub(crate) fn decode_text(raw: &[u8], encoding: &'static Encoding) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map_or(0, |pos| pos + 1);
    let (text, _) = encoding.decode_without_bom_handling(&raw[..end]);
    text.into_owned()
}

/// Fills `buf` as far as the reader allows, returning the byte count
pub(crate) fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

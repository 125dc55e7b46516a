//! Row decompression for the two SAS compression schemes.

use serde::Serialize;

use crate::error::Error;
use crate::types::Result;

/// Literal in the first column text block naming RLE compression
pub const RLE_LITERAL: &[u8] = b"SASYZCRL";

/// Literal in the first column text block naming RDC compression
pub const RDC_LITERAL: &[u8] = b"SASYZCR2";

/// Shared prefix of every compression literal
const COMPRESSION_PREFIX: &[u8] = b"SASYZC";

/// Row compression used by a dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Rle,
    Rdc,
}

impl Compression {
    /// Detects the compression literal inside a column text block
    pub fn detect(text_block: &[u8]) -> Result<Self> {
        let contains = |literal: &[u8]| text_block.windows(literal.len()).any(|w| w == literal);
        if contains(RLE_LITERAL) {
            Ok(Compression::Rle)
        } else if contains(RDC_LITERAL) {
            Ok(Compression::Rdc)
        } else if contains(COMPRESSION_PREFIX) {
            Err(Error::Unsupported(format!(
                "unknown compression literal in {:?}",
                String::from_utf8_lossy(text_block)
            )))
        } else {
            Ok(Compression::None)
        }
    }

    /// Expands one stored row to exactly `row_length` bytes
    pub fn decompress(self, input: &[u8], row_length: usize) -> Result<Vec<u8>> {
        let out = match self {
            Compression::None => input.to_vec(),
            Compression::Rle => rle(input, row_length)?,
            Compression::Rdc => rdc(input, row_length)?,
        };
        if out.len() != row_length {
            return Err(Error::Format(format!(
                "{:?} row expanded to {} bytes, expected {}",
                self,
                out.len(),
                row_length
            )));
        }
        Ok(out)
    }
}

fn byte_at(input: &[u8], pos: usize) -> Result<u8> {
    input.get(pos).copied().ok_or_else(|| {
        Error::Format(format!(
            "compressed row ends early at byte {} of {}",
            pos,
            input.len()
        ))
    })
}

/// Copies `len` literal bytes from the input, advancing `pos`
fn copy_literal(out: &mut Vec<u8>, input: &[u8], pos: &mut usize, len: usize) -> Result<()> {
    let literal = pos
        .checked_add(len)
        .and_then(|end| input.get(*pos..end))
        .ok_or_else(|| {
            Error::Format(format!(
                "literal of {} bytes at {} overruns compressed row of {}",
                len,
                pos,
                input.len()
            ))
        })?;
    out.extend_from_slice(literal);
    *pos += len;
    Ok(())
}

fn fill(out: &mut Vec<u8>, len: usize, byte: u8) {
    out.resize(out.len() + len, byte);
}

/// Run-length decoding; the high nibble of each control byte is the command
pub fn rle(input: &[u8], row_length: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(row_length);
    let mut pos = 0;

    while pos < input.len() {
        let control = input[pos];
        pos += 1;
        let low = usize::from(control & 0x0F);

        match control >> 4 {
            0x0 | 0x1 => {
                let next = usize::from(byte_at(input, pos)?);
                pos += 1;
                let extra = if control >> 4 == 0x1 { 4096 } else { 0 };
                copy_literal(&mut out, input, &mut pos, next + 64 + low * 256 + extra)?;
            }
            0x2 => copy_literal(&mut out, input, &mut pos, low + 96)?,
            0x4 => {
                let next = usize::from(byte_at(input, pos)?);
                let byte = byte_at(input, pos + 1)?;
                pos += 2;
                fill(&mut out, next + 18 + low * 256, byte);
            }
            command @ 0x5..=0x7 => {
                let next = usize::from(byte_at(input, pos)?);
                pos += 1;
                let byte = match command {
                    0x5 => b'@',
                    0x6 => b' ',
                    _ => 0x00,
                };
                fill(&mut out, next + 17 + low * 256, byte);
            }
            0x8 => copy_literal(&mut out, input, &mut pos, low + 1)?,
            0x9 => copy_literal(&mut out, input, &mut pos, low + 17)?,
            0xA => copy_literal(&mut out, input, &mut pos, low + 33)?,
            0xB => copy_literal(&mut out, input, &mut pos, low + 49)?,
            0xC => {
                let byte = byte_at(input, pos)?;
                pos += 1;
                fill(&mut out, low + 3, byte);
            }
            0xD => fill(&mut out, low + 2, b'@'),
            0xE => fill(&mut out, low + 2, b' '),
            0xF => fill(&mut out, low + 2, 0x00),
            command => {
                return Err(Error::Format(format!(
                    "unknown RLE command {:#x} at byte {}",
                    command,
                    pos - 1
                )))
            }
        }

        if out.len() > row_length {
            return Err(Error::Format(format!(
                "RLE row overruns row length {}",
                row_length
            )));
        }
    }

    Ok(out)
}

/// Ross data compression: each 16-bit control word flags the next sixteen
/// items as either a literal byte or a command
pub fn rdc(input: &[u8], row_length: usize) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::with_capacity(row_length);
    let mut pos = 0;
    let mut control: u16 = 0;
    let mut bits = 0u32;

    while pos < input.len() {
        if bits == 0 {
            control = u16::from_be_bytes([byte_at(input, pos)?, byte_at(input, pos + 1)?]);
            pos += 2;
            bits = 16;
            if pos >= input.len() {
                break;
            }
        }
        bits -= 1;

        if control & (1 << bits) == 0 {
            out.push(byte_at(input, pos)?);
            pos += 1;
            continue;
        }

        let command = input[pos] >> 4;
        let count = usize::from(input[pos] & 0x0F);
        pos += 1;

        match command {
            0 => {
                let byte = byte_at(input, pos)?;
                pos += 1;
                fill(&mut out, count + 3, byte);
            }
            1 => {
                let len = count + (usize::from(byte_at(input, pos)?) << 4) + 19;
                let byte = byte_at(input, pos + 1)?;
                pos += 2;
                fill(&mut out, len, byte);
            }
            _ => {
                let distance = count + 3 + (usize::from(byte_at(input, pos)?) << 4);
                pos += 1;
                let len = if command == 2 {
                    let len = usize::from(byte_at(input, pos)?) + 16;
                    pos += 1;
                    len
                } else {
                    usize::from(command)
                };
                if distance > out.len() {
                    return Err(Error::Format(format!(
                        "RDC back reference of {} bytes exceeds {} decoded bytes",
                        distance,
                        out.len()
                    )));
                }
                // Byte at a time: source and destination may overlap
                let start = out.len() - distance;
                for i in 0..len {
                    let byte = out[start + i];
                    out.push(byte);
                }
            }
        }

        if out.len() > row_length {
            return Err(Error::Format(format!(
                "RDC row overruns row length {}",
                row_length
            )));
        }
    }

    Ok(out)
}

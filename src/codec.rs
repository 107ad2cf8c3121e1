//! Little-endian unsigned integer codec.
//!
//! All multi-byte integers in the container format are little-endian and of
//! a runtime-configured width drawn from `{1, 2, 4, 8}`. Widths are not
//! compile-time generics (spec §9: "widths are runtime configuration, not
//! compile-time parameters") — the codec dispatches on width at every
//! read/write boundary instead.

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Reads an unsigned integer of the given byte width (1, 2, 4 or 8) from
/// `stream`, interpreting it as little-endian.
pub fn read_uint<R: Read>(stream: &mut R, width: u8) -> Result<u64> {
    match width {
        1 => {
            let mut buf = [0u8; 1];
            stream.read_exact(&mut buf)?;
            Ok(buf[0] as u64)
        }
        2 => {
            let mut buf = [0u8; 2];
            stream.read_exact(&mut buf)?;
            Ok(u16::from_le_bytes(buf) as u64)
        }
        4 => {
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf)?;
            Ok(u32::from_le_bytes(buf) as u64)
        }
        8 => {
            let mut buf = [0u8; 8];
            stream.read_exact(&mut buf)?;
            Ok(u64::from_le_bytes(buf))
        }
        other => Err(Error::InvalidWidth(other)),
    }
}

/// Writes `value` to `stream` as a little-endian unsigned integer of the
/// given byte width (1, 2, 4 or 8). Truncates silently if `value` does not
/// fit the width — callers are expected to have validated ranges upstream
/// (e.g. `RangeTSSize`).
pub fn write_uint<W: Write>(stream: &mut W, value: u64, width: u8) -> Result<()> {
    match width {
        1 => stream.write_all(&[value as u8])?,
        2 => stream.write_all(&(value as u16).to_le_bytes())?,
        4 => stream.write_all(&(value as u32).to_le_bytes())?,
        8 => stream.write_all(&value.to_le_bytes())?,
        other => return Err(Error::InvalidWidth(other)),
    }
    Ok(())
}

/// Reads exactly `buf.len()` bytes from `stream` into `buf`.
pub fn read_fixed<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<()> {
    stream.read_exact(buf)?;
    Ok(())
}

/// Writes `buf` verbatim to `stream`.
pub fn write_fixed<W: Write>(stream: &mut W, buf: &[u8]) -> Result<()> {
    stream.write_all(buf)?;
    Ok(())
}

/// Decodes a little-endian unsigned integer of `width` bytes from a slice
/// already in memory (used by the tag/tagset codecs, which operate over
/// owned buffers rather than streams).
pub fn decode_uint(bytes: &[u8], width: u8) -> Option<u64> {
    if bytes.len() != width as usize {
        return None;
    }
    match width {
        1 => Some(bytes[0] as u64),
        2 => Some(u16::from_le_bytes(bytes.try_into().ok()?) as u64),
        4 => Some(u32::from_le_bytes(bytes.try_into().ok()?) as u64),
        8 => Some(u64::from_le_bytes(bytes.try_into().ok()?)),
        _ => None,
    }
}

/// Encodes `value` into exactly `width` little-endian bytes. Returns `None`
/// for unsupported widths.
pub fn encode_uint(value: u64, width: u8) -> Option<Vec<u8>> {
    match width {
        1 => Some(vec![value as u8]),
        2 => Some((value as u16).to_le_bytes().to_vec()),
        4 => Some((value as u32).to_le_bytes().to_vec()),
        8 => Some(value.to_le_bytes().to_vec()),
        _ => None,
    }
}

//! Byte-level helpers for the fixed-layout trace and partition formats.
//!
//! All multi-byte integers are big-endian, matching the original trace
//! files this crate interoperates with.

use std::io::{self, Read, Write};

use crate::error::DecodeError;

/// Reads a record's leading type byte.
/// A clean end of stream at a record boundary yields `None`.
pub(crate) fn read_record_tag(input: &mut dyn Read) -> Result<Option<u8>, DecodeError> {
    let mut buf = [0u8; 1];
    match input.read_exact(&mut buf) {
        Ok(()) => Ok(Some(buf[0])),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(DecodeError::Io(e)),
    }
}

pub(crate) fn read_u8(input: &mut dyn Read) -> Result<u8, DecodeError> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf[0])
}

pub(crate) fn read_bool(input: &mut dyn Read) -> Result<bool, DecodeError> {
    Ok(read_u8(input)? != 0)
}

pub(crate) fn read_u32(input: &mut dyn Read) -> Result<u32, DecodeError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_be_bytes(buf))
}

pub(crate) fn read_i32(input: &mut dyn Read) -> Result<i32, DecodeError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).map_err(truncated)?;
    Ok(i32::from_be_bytes(buf))
}

pub(crate) fn read_i64(input: &mut dyn Read) -> Result<i64, DecodeError> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf).map_err(truncated)?;
    Ok(i64::from_be_bytes(buf))
}

pub(crate) fn write_u8(out: &mut dyn Write, value: u8) -> io::Result<()> {
    out.write_all(&[value])
}

pub(crate) fn write_bool(out: &mut dyn Write, value: bool) -> io::Result<()> {
    write_u8(out, value as u8)
}

pub(crate) fn write_u32(out: &mut dyn Write, value: u32) -> io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

pub(crate) fn write_i32(out: &mut dyn Write, value: i32) -> io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

pub(crate) fn write_i64(out: &mut dyn Write, value: i64) -> io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

/// An unexpected end of stream inside a record is a truncation, not a
/// normal end of input.
fn truncated(e: io::Error) -> DecodeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DecodeError::TruncatedRecord
    } else {
        DecodeError::Io(e)
    }
}

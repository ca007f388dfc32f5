//! # Wire Codec
//!
//! The byte-level format shared with scan engines. All integers are
//! little-endian. Variable sized values are length-prefixed with a `u32`,
//! and [`NULL_LENGTH`] marks a null buffer, which is distinct from an
//! empty one.
//!
//! The decoding side is strict: every length is checked against what is
//! actually left in the buffer, and a violation is a [`DecodeError`].

use crate::error::{DecodeError, ScanError};

mod report;
mod target;

pub use report::{decode_report, encode_report};
pub use target::{EncodedTarget, TargetKind, decode_target, encode_target};

/// Length prefix of a null buffer or null array.
pub const NULL_LENGTH: u32 = u32::MAX;

/// A cursor over an engine-owned buffer.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(i8::from_le_bytes(self.read_array::<1>()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    /// Reads a length-prefixed buffer. `None` when the buffer is null.
    pub fn read_buffer(&mut self) -> Result<Option<&'a [u8]>, DecodeError> {
        match self.read_u32()? {
            NULL_LENGTH => Ok(None),
            len => self.read_bytes(len as usize).map(Some),
        }
    }

    /// Reads a length-prefixed string. Null and empty both decode to `None`.
    pub fn read_string(&mut self, field: &'static str) -> Result<Option<String>, DecodeError> {
        let buffer = self.read_buffer()?;
        decode_string(buffer).map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads a counted sequence of elements. `None` when the array is null.
    pub fn read_seq<T, F>(&mut self, mut element: F) -> Result<Option<Vec<T>>, DecodeError>
    where
        F: FnMut(&mut WireReader<'a>) -> Result<T, DecodeError>,
    {
        let count = match self.read_u32()? {
            NULL_LENGTH => return Ok(None),
            count => count as usize,
        };
        // Every element takes at least one byte, so a larger count can't be honest
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(element(self)?);
        }
        Ok(Some(items))
    }

    /// Asserts the whole buffer was consumed.
    pub fn finish(self, what: &'static str) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(DecodeError::TrailingBytes { what, remaining }),
        }
    }
}

/// Builds buffers in the engine format.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Writes a length-prefixed buffer, or the null marker.
    ///
    /// Buffers are capped below [`NULL_LENGTH`] bytes. Anything that size
    /// could never come from an engine.
    pub fn write_buffer(&mut self, bytes: Option<&[u8]>) -> &mut Self {
        match bytes {
            Some(bytes) => self.write_u32(bytes.len() as u32).write_bytes(bytes),
            None => self.write_u32(NULL_LENGTH),
        }
    }

    pub fn write_string(&mut self, s: Option<&str>) -> &mut Self {
        self.write_buffer(s.map(str::as_bytes))
    }

    pub fn write_seq<T, F>(&mut self, items: Option<&[T]>, mut element: F) -> &mut Self
    where
        F: FnMut(&mut WireWriter, &T),
    {
        match items {
            Some(items) => {
                self.write_u32(items.len() as u32);
                for item in items {
                    element(self, item);
                }
            }
            None => {
                self.write_u32(NULL_LENGTH);
            }
        }
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Decodes an engine string. A null or empty buffer is an absent value.
pub fn decode_string(buffer: Option<&[u8]>) -> Result<Option<String>, ScanError> {
    match buffer {
        None | Some([]) => Ok(None),
        Some(bytes) => std::str::from_utf8(bytes)
            .map(|s| Some(s.to_owned()))
            .map_err(|_| ScanError::InvalidUtf8),
    }
}

/// Decodes a standalone counted array buffer.
///
/// A null buffer means the feature behind it was not requested, and decodes
/// to `None`. A present buffer with zero elements decodes to `Some(vec![])`.
pub fn decode_array<T, F>(buffer: Option<&[u8]>, element: F) -> Result<Option<Vec<T>>, DecodeError>
where
    F: FnMut(&mut WireReader<'_>) -> Result<T, DecodeError>,
{
    let Some(bytes) = buffer else {
        return Ok(None);
    };
    let mut reader = WireReader::new(bytes);
    let items = reader.read_seq(element)?;
    reader.finish("array")?;
    Ok(items)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

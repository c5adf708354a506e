//! Big-endian writer for encoding binary data.

use uuid::Uuid;

use crate::error::{DataError, DataResult};

/// A growable writer for encoding big-endian binary data.
///
/// Writes are accumulated in an internal buffer. Call [`finish`](Self::finish)
/// to get the final byte buffer.
#[derive(Debug, Default, Clone)]
pub struct DataWriter {
    bytes: Vec<u8>,
}

impl DataWriter {
    /// Creates a new empty `DataWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `DataWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes raw bytes with no prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Writes a raw unsigned byte.
    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    /// Writes a signed two's-complement byte.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::RangeError`] if `value` is outside `-128..=127`.
    pub fn write_i8(&mut self, value: i32) -> DataResult<()> {
        let byte = i8::try_from(value).map_err(|_| DataError::RangeError {
            value: i64::from(value),
            min: i64::from(i8::MIN),
            max: i64::from(i8::MAX),
        })?;
        self.write_bytes(&byte.to_be_bytes());
        Ok(())
    }

    /// Writes a boolean as a single `0x00`/`0x01` byte.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Writes a signed 16-bit integer.
    pub fn write_i16(&mut self, value: i16) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Writes an unsigned 16-bit integer.
    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Writes a signed 32-bit integer.
    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Writes an unsigned 32-bit integer.
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Writes a signed 64-bit integer.
    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Writes an IEEE 754 single-precision float.
    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Writes an IEEE 754 double-precision float.
    pub fn write_f64(&mut self, value: f64) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Writes a string prefixed by its UTF-8 byte length as an `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::LengthOverflow`] if the string is longer than
    /// `i32::MAX` bytes.
    pub fn write_string(&mut self, value: &str) -> DataResult<()> {
        let length = i32::try_from(value.len())
            .map_err(|_| DataError::LengthOverflow { length: value.len() })?;
        self.write_i32(length);
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    /// Writes a UUID in its 16-byte RFC 4122 representation.
    pub fn write_uuid(&mut self, value: &Uuid) {
        self.write_bytes(value.as_bytes());
    }

    /// Writes a boolean presence flag, followed by the value when present.
    pub fn write_prefixed_optional<T: ?Sized>(
        &mut self,
        value: Option<&T>,
        write: impl FnOnce(&mut Self, &T) -> DataResult<()>,
    ) -> DataResult<()> {
        match value {
            Some(value) => {
                self.write_bool(true);
                write(self, value)
            }
            None => {
                self.write_bool(false);
                Ok(())
            }
        }
    }

    /// Writes the value when present and nothing at all when absent.
    ///
    /// Only valid where absence is unambiguous from the surrounding layout
    /// (for example a trailing field).
    pub fn write_if_present<T: ?Sized>(
        &mut self,
        value: Option<&T>,
        write: impl FnOnce(&mut Self, &T) -> DataResult<()>,
    ) -> DataResult<()> {
        match value {
            Some(value) => write(self, value),
            None => Ok(()),
        }
    }

    /// Writes each value back-to-back; the count is not encoded.
    pub fn write_array<T>(
        &mut self,
        values: impl IntoIterator<Item = T>,
        mut write: impl FnMut(&mut Self, T) -> DataResult<()>,
    ) -> DataResult<()> {
        for value in values {
            write(self, value)?;
        }
        Ok(())
    }

    /// Finishes writing and returns the byte buffer.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    /// Finishes writing and appends to the provided buffer.
    pub fn finish_into(mut self, buf: &mut Vec<u8>) {
        buf.append(&mut self.bytes);
    }
}

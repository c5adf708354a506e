//! Big-endian reader with bounded operations.

use uuid::Uuid;

use crate::error::{DataError, DataResult};

/// A cursor over a byte slice for decoding big-endian binary data.
///
/// All read operations are bounds-checked and return errors on failure.
/// The reader never panics on malformed input, and a failed primitive or
/// string read leaves the position unchanged.
#[derive(Debug, Clone)]
pub struct DataReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DataReader<'a> {
    /// Creates a new `DataReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of bytes remaining to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns `true` if there are no more bytes to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the current byte position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Reads exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> DataResult<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(DataError::Truncated {
                requested: len,
                available,
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Consumes and returns every remaining byte.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// Reads a raw unsigned byte.
    pub fn read_u8(&mut self) -> DataResult<u8> {
        let [byte] = self.read_array_bytes::<1>()?;
        Ok(byte)
    }

    /// Reads a signed two's-complement byte.
    pub fn read_i8(&mut self) -> DataResult<i8> {
        Ok(i8::from_be_bytes(self.read_array_bytes::<1>()?))
    }

    /// Reads a boolean; any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> DataResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a signed 16-bit integer.
    pub fn read_i16(&mut self) -> DataResult<i16> {
        Ok(i16::from_be_bytes(self.read_array_bytes::<2>()?))
    }

    /// Reads an unsigned 16-bit integer.
    pub fn read_u16(&mut self) -> DataResult<u16> {
        Ok(u16::from_be_bytes(self.read_array_bytes::<2>()?))
    }

    /// Reads a signed 32-bit integer.
    pub fn read_i32(&mut self) -> DataResult<i32> {
        Ok(i32::from_be_bytes(self.read_array_bytes::<4>()?))
    }

    /// Reads an unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> DataResult<u32> {
        Ok(u32::from_be_bytes(self.read_array_bytes::<4>()?))
    }

    /// Reads a signed 64-bit integer.
    pub fn read_i64(&mut self) -> DataResult<i64> {
        Ok(i64::from_be_bytes(self.read_array_bytes::<8>()?))
    }

    /// Reads an IEEE 754 single-precision float.
    pub fn read_f32(&mut self) -> DataResult<f32> {
        Ok(f32::from_be_bytes(self.read_array_bytes::<4>()?))
    }

    /// Reads an IEEE 754 double-precision float.
    pub fn read_f64(&mut self) -> DataResult<f64> {
        Ok(f64::from_be_bytes(self.read_array_bytes::<8>()?))
    }

    /// Reads a string prefixed by its UTF-8 byte length as an `i32`.
    pub fn read_string(&mut self) -> DataResult<String> {
        let start = self.pos;
        let result = self.read_string_inner();
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    /// Reads a UUID in its 16-byte RFC 4122 representation.
    pub fn read_uuid(&mut self) -> DataResult<Uuid> {
        Ok(Uuid::from_bytes(self.read_array_bytes::<16>()?))
    }

    /// Reads a boolean presence flag followed by the value when present.
    pub fn read_prefixed_optional<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> DataResult<T>,
    ) -> DataResult<Option<T>> {
        if self.read_bool()? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads `count` back-to-back values.
    ///
    /// The count is carried by context, not by the encoding.
    pub fn read_array<T>(
        &mut self,
        count: usize,
        mut read: impl FnMut(&mut Self) -> DataResult<T>,
    ) -> DataResult<Vec<T>> {
        // Each element takes at least one byte, so cap the preallocation.
        let mut out = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            out.push(read(self)?);
        }
        Ok(out)
    }

    /// Reads `count` back-to-back values, passing each element's index.
    pub fn read_array_indexed<T>(
        &mut self,
        count: usize,
        mut read: impl FnMut(&mut Self, usize) -> DataResult<T>,
    ) -> DataResult<Vec<T>> {
        let mut out = Vec::with_capacity(count.min(self.remaining()));
        for index in 0..count {
            out.push(read(self, index)?);
        }
        Ok(out)
    }

    fn read_string_inner(&mut self) -> DataResult<String> {
        let length = self.read_i32()?;
        let len = usize::try_from(length).map_err(|_| DataError::NegativeLength { length })?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DataError::InvalidUtf8)
    }

    fn read_array_bytes<const N: usize>(&mut self) -> DataResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reader() {
        let reader = DataReader::new(&[]);
        assert!(reader.is_empty());
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn read_from_empty_fails() {
        let mut reader = DataReader::new(&[]);
        let result = reader.read_u8();
        assert!(matches!(
            result,
            Err(DataError::Truncated {
                requested: 1,
                available: 0
            })
        ));
    }

    #[test]
    fn read_i32_big_endian() {
        let mut reader = DataReader::new(&[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(reader.read_i32().unwrap(), 0x1234_5678);
        assert!(reader.is_empty());
    }

    #[test]
    fn read_negative_i32() {
        let mut reader = DataReader::new(&[0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(reader.read_i32().unwrap(), -2);
    }

    #[test]
    fn read_i8_sign() {
        let mut reader = DataReader::new(&[0x80, 0x7F, 0xFF]);
        assert_eq!(reader.read_i8().unwrap(), -128);
        assert_eq!(reader.read_i8().unwrap(), 127);
        assert_eq!(reader.read_i8().unwrap(), -1);
    }

    #[test]
    fn read_u8_is_raw() {
        let mut reader = DataReader::new(&[0xFF]);
        assert_eq!(reader.read_u8().unwrap(), 255);
    }

    #[test]
    fn read_u16_and_i16() {
        let mut reader = DataReader::new(&[0xFF, 0xFE, 0xFF, 0xFE]);
        assert_eq!(reader.read_u16().unwrap(), 0xFFFE);
        assert_eq!(reader.read_i16().unwrap(), -2);
    }

    #[test]
    fn read_i64_big_endian() {
        let mut reader = DataReader::new(&[0, 0, 0, 0, 0, 0, 0x01, 0x00]);
        assert_eq!(reader.read_i64().unwrap(), 256);
    }

    #[test]
    fn read_f32_big_endian() {
        let mut reader = DataReader::new(&[0x3F, 0x80, 0x00, 0x00]);
        assert!((reader.read_f32().unwrap() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn read_string() {
        let mut reader = DataReader::new(&[0, 0, 0, 3, b'a', b'b', b'c']);
        assert_eq!(reader.read_string().unwrap(), "abc");
    }

    #[test]
    fn read_string_length_past_end() {
        let data = [0, 0, 0, 10, b'a'];
        let mut reader = DataReader::new(&data);
        let err = reader.read_string().unwrap_err();
        assert_eq!(
            err,
            DataError::Truncated {
                requested: 10,
                available: 1
            }
        );
        assert_eq!(reader.position(), 0, "failed read must not move the cursor");
    }

    #[test]
    fn read_string_negative_length() {
        let mut reader = DataReader::new(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            reader.read_string().unwrap_err(),
            DataError::NegativeLength { length: -1 }
        );
    }

    #[test]
    fn read_string_invalid_utf8() {
        let mut reader = DataReader::new(&[0, 0, 0, 2, 0xC3, 0x28]);
        assert_eq!(reader.read_string().unwrap_err(), DataError::InvalidUtf8);
    }

    #[test]
    fn read_uuid_rfc_order() {
        let bytes: Vec<u8> = (0u8..16).collect();
        let mut reader = DataReader::new(&bytes);
        let uuid = reader.read_uuid().unwrap();
        assert_eq!(
            uuid.to_string(),
            "00010203-0405-0607-0809-0a0b0c0d0e0f"
        );
    }

    #[test]
    fn read_prefixed_optional() {
        let mut reader = DataReader::new(&[0x00, 0x01, 0x2A]);
        assert_eq!(reader.read_prefixed_optional(DataReader::read_u8).unwrap(), None);
        assert_eq!(
            reader.read_prefixed_optional(DataReader::read_u8).unwrap(),
            Some(42)
        );
    }

    #[test]
    fn read_array_uses_caller_count() {
        let mut reader = DataReader::new(&[0, 1, 0, 2, 0, 3]);
        let values = reader.read_array(3, DataReader::read_u16).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn read_array_indexed_passes_index() {
        let mut reader = DataReader::new(&[10, 20]);
        let values = reader
            .read_array_indexed(2, |r, i| Ok((i, r.read_u8()?)))
            .unwrap();
        assert_eq!(values, vec![(0, 10), (1, 20)]);
    }

    #[test]
    fn read_array_huge_count_fails_cleanly() {
        let mut reader = DataReader::new(&[1, 2]);
        let err = reader.read_array(usize::MAX, DataReader::read_u8).unwrap_err();
        assert!(matches!(err, DataError::Truncated { .. }));
    }

    #[test]
    fn read_remaining_consumes_all() {
        let mut reader = DataReader::new(&[1, 2, 3, 4]);
        reader.read_u8().unwrap();
        assert_eq!(reader.read_remaining(), &[2, 3, 4]);
        assert!(reader.is_empty());
        assert!(reader.read_remaining().is_empty());
    }
}

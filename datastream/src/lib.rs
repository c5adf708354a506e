//! Big-endian binary primitives for the Serble launcher protocol.
//!
//! This crate provides [`DataWriter`] and [`DataReader`] for byte-level encoding
//! and decoding of integers, floats, booleans, UUIDs, length-prefixed strings,
//! optional values and fixed-count arrays.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about packets or games.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use datastream::{DataReader, DataWriter};
//!
//! let mut writer = DataWriter::new();
//! writer.write_bool(true);
//! writer.write_string("alice").unwrap();
//!
//! let bytes = writer.finish();
//!
//! let mut reader = DataReader::new(&bytes);
//! assert!(reader.read_bool().unwrap());
//! assert_eq!(reader.read_string().unwrap(), "alice");
//! ```

mod error;
mod reader;
mod writer;

pub use error::{DataError, DataResult};
pub use reader::DataReader;
pub use writer::DataWriter;
pub use uuid::Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roundtrip() {
        let writer = DataWriter::new();
        let bytes = writer.finish();
        assert!(bytes.is_empty());

        let reader = DataReader::new(&bytes);
        assert!(reader.is_empty());
    }

    #[test]
    fn mixed_roundtrip() {
        let uuid = Uuid::from_u128(0xDEAD_BEEF);
        let mut writer = DataWriter::new();
        writer.write_bool(true);
        writer.write_i8(-5).unwrap();
        writer.write_u16(0xBEEF);
        writer.write_i32(-300);
        writer.write_i64(i64::MIN);
        writer.write_f64(1.5);
        writer.write_uuid(&uuid);
        writer.write_string("game").unwrap();
        writer.write_bytes(&[9, 9]);
        let bytes = writer.finish();

        let mut reader = DataReader::new(&bytes);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_i8().unwrap(), -5);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_i32().unwrap(), -300);
        assert_eq!(reader.read_i64().unwrap(), i64::MIN);
        assert!((reader.read_f64().unwrap() - 1.5).abs() < f64::EPSILON);
        assert_eq!(reader.read_uuid().unwrap(), uuid);
        assert_eq!(reader.read_string().unwrap(), "game");
        assert_eq!(reader.read_remaining(), &[9, 9]);
    }

    #[test]
    fn doctest_example() {
        let mut writer = DataWriter::new();
        writer.write_bool(true);
        writer.write_string("alice").unwrap();

        let bytes = writer.finish();

        let mut reader = DataReader::new(&bytes);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_string().unwrap(), "alice");
    }
}

#![no_main]

use datastream::DataReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = DataReader::new(data);
    let mut idx = 0usize;

    // Use input bytes to drive a bounded sequence of operations.
    while idx < data.len() && idx < 1024 {
        let op = data[idx] % 9;
        idx += 1;

        match op {
            0 => {
                let _ = reader.read_bool();
            }
            1 => {
                let _ = reader.read_i16();
            }
            2 => {
                let _ = reader.read_u32();
            }
            3 => {
                let _ = reader.read_i64();
            }
            4 => {
                let _ = reader.read_f64();
            }
            5 => {
                let _ = reader.read_string();
            }
            6 => {
                let _ = reader.read_uuid();
            }
            7 => {
                let _ = reader.read_prefixed_optional(|r| r.read_string());
            }
            _ => {
                let count = usize::from(data[idx - 1] % 32);
                let _ = reader.read_array(count, |r| r.read_u16());
            }
        }
        assert!(reader.position() <= data.len());
    }
});

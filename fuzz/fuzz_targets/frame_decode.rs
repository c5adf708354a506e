#![no_main]

use libfuzzer_sys::fuzz_target;
use wire::{decode_frame, encode_frame, frames, Limits};

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();

    let _ = decode_frame(data, &limits);

    // Anything that decodes must survive a re-encode unchanged.
    for frame in frames(data, &limits) {
        let Ok(frame) = frame else { break };
        if let Ok(packet) = frame.decode() {
            let reencoded = encode_frame(&packet).expect("decoded packets re-encode");
            let again = decode_frame(&reencoded, &limits).expect("re-encoded frame decodes");
            assert_eq!(packet, again);
        }
    }
});

#![no_main]

use duplex_wire::core::frame::Frame;
use duplex_wire::core::scanner::{scan, Scan};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Scanner and frame parser must agree on arbitrary input and never panic
    if let Scan::Frame { consumed, frame } = scan(data, false) {
        assert!(consumed <= data.len());
        assert!(Frame::from_bytes(frame).is_ok());
    }
    let _ = Frame::from_bytes(data);
});

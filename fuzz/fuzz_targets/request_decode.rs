//! Fuzz target for EscRequest::decode
//!
//! Arbitrary bytes as a request frame. Every input must either decode or
//! return an error; a frame that decodes must re-encode without error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use powertrain_proto::EscRequest;

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = EscRequest::decode(data) {
        let mut frame = Vec::new();
        assert!(request.encode(&mut frame).is_ok());
    }
});

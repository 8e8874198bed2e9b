//! Fuzz target for the sync-word/CRC link framing
//!
//! Feeds arbitrary line bytes to the stream transport. Receives must never
//! panic, and the receive buffer must never grow past what was fed in.

#![no_main]

use std::{io::Cursor, time::Duration};

use libfuzzer_sys::fuzz_target;
use powertrain_core::{FrameTransport, ReceiveOutcome};
use powertrain_host::StreamTransport;
use powertrain_proto::MAX_FRAME_SIZE;

fuzz_target!(|data: &[u8]| {
    let mut transport = StreamTransport::new(Cursor::new(data.to_vec()));

    // End of input reports a lost link, which ends the run
    for _ in 0..data.len() + 1 {
        match transport.receive(Duration::ZERO) {
            Ok(ReceiveOutcome::Frame(frame)) => assert!(frame.len() <= MAX_FRAME_SIZE),
            Ok(ReceiveOutcome::Timeout) => {},
            Err(err) if err.is_fatal() => break,
            Err(_) => {},
        }
        assert!(transport.buffered() <= data.len());
    }
});

//! Fuzz target for error-record JSON parsing.
//!
//! Tests that `ErrorRecord` deserialization handles arbitrary input
//! without panicking.

#![no_main]

use gk_common::ErrorRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes either parse or return an error - never panic.
    if let Ok(record) = serde_json::from_slice::<ErrorRecord>(data) {
        // A parsed record re-serializes losslessly enough to parse again.
        let json = record.to_json();
        let _ = serde_json::from_str::<ErrorRecord>(&json);
    }
});

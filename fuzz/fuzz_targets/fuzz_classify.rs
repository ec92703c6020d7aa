//! Fuzz target for buffer classification.
//!
//! The classifier runs inside foreign call paths on arbitrary process
//! memory; it must be total over any byte sequence and probe length.

#![no_main]

use kt_core::classify::classify;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (Vec<u8>, usize)| {
    let (bytes, probe) = input;
    // Cap the probe the way the settings layer does; classify itself must
    // not care either way.
    let _ = classify(&bytes, probe % 4096);
    let _ = classify(&bytes, probe);
});

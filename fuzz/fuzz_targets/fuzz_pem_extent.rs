//! Fuzz target for PEM footer trimming.

#![no_main]

use kt_core::classify::pem_extent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(end) = pem_extent(data) {
        assert!(end <= data.len());
    }
});

//! Fuzz target for rule-table parsing.
//!
//! Rule tables are operator-supplied; parsing must never panic, only
//! return an error.

#![no_main]

use kt_config::RuleSet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(set) = RuleSet::from_json_str(data) {
        // Anything that parses and validates must also compile.
        let compiled = set.compile().expect("validated table failed to compile");
        let _ = compiled.is_match("oecc01");
    }
});

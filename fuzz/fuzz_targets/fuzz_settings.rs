//! Fuzz target for settings parsing.

#![no_main]

use kt_config::EngineSettings;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(settings) = toml::from_str::<EngineSettings>(data) {
        let _ = settings.validate();
    }
});

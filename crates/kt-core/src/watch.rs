//! Dynamic-library-load watching.
//!
//! While the engine is polling, the watcher rides the backend's dynamic-load
//! interception: whenever the target process loads a library whose path
//! names the target module, it schedules an out-of-band rescan after a short
//! settle delay, so symbols are queried only after the loader has finished
//! initializing the module.

use crate::backend::LoadSink;
use crate::engine::EngineEvent;
use std::sync::mpsc::Sender;
use std::time::Duration;
use tracing::{info, trace};

/// Feeds rescan events into the engine's control loop.
pub struct LoadWatcher {
    module_name: String,
    settle: Duration,
    tx: Sender<EngineEvent>,
}

impl LoadWatcher {
    pub fn new(module_name: impl Into<String>, settle: Duration, tx: Sender<EngineEvent>) -> Self {
        Self {
            module_name: module_name.into(),
            settle,
            tx,
        }
    }
}

impl LoadSink for LoadWatcher {
    fn on_library_load(&self, path: &str) {
        if !path.contains(&self.module_name) {
            trace!(path = %path, "library load ignored");
            return;
        }
        info!(path = %path, settle_ms = self.settle.as_millis() as u64, "target module load observed, scheduling rescan");

        let tx = self.tx.clone();
        let settle = self.settle;
        std::thread::spawn(move || {
            std::thread::sleep(settle);
            // The engine may have stopped in the meantime; a closed channel
            // just drops the event.
            let _ = tx.send(EngineEvent::Rescan);
        });
    }
}

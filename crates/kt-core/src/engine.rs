//! The orchestrator state machine.
//!
//! One control thread drives the engine through
//! `Idle → Searching → Hooked → Terminated`, fed by three event sources:
//! the implicit poll timer (a channel receive timeout), out-of-band rescan
//! requests from the load watcher, and stop/unload notifications from the
//! [`EngineHandle`]. Hook callbacks do not pass through this loop; they run
//! on the target's threads directly inside the hook manager.

use crate::backend::Backend;
use crate::hook::{HookManager, InstallOutcome};
use crate::locate::ModuleLocator;
use crate::matcher::match_symbols;
use crate::store::ArtifactStore;
use crate::watch::LoadWatcher;
use kt_common::{Error, Result, RunId};
use kt_config::{CompiledRuleSet, EngineSettings, RuleSet};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Engine lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Searching,
    Hooked,
    Terminated,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Searching => write!(f, "searching"),
            EngineState::Hooked => write!(f, "hooked"),
            EngineState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Events fed into the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Re-attempt locate ahead of the next timer tick.
    Rescan,

    /// The target module was observed unloading (adapter-dependent).
    ModuleUnloaded,

    /// Shut the engine down.
    Stop,
}

/// Poll loop bookkeeping.
#[derive(Debug, Clone)]
pub struct PollState {
    pub interval: Duration,
    pub attempts: u32,
    pub active: bool,
}

#[derive(Debug)]
struct Shared {
    state: EngineState,
    poll: PollState,
    module_found: bool,
    hooked_symbols: usize,
}

/// Snapshot of the engine's externally visible state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub attempts: u32,
    pub module_found: bool,
    pub hooked_symbols: usize,
}

/// Remote control for a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<EngineEvent>,
    shared: Arc<Mutex<Shared>>,
}

impl EngineHandle {
    /// Request shutdown. Installed hooks stay installed; only the poll loop
    /// and the load watch are cancelled.
    pub fn stop(&self) {
        let _ = self.tx.send(EngineEvent::Stop);
    }

    /// Request an out-of-band rescan.
    pub fn rescan(&self) {
        let _ = self.tx.send(EngineEvent::Rescan);
    }

    /// Notify the engine that the target module unloaded.
    pub fn module_unloaded(&self) {
        let _ = self.tx.send(EngineEvent::ModuleUnloaded);
    }

    /// Current status snapshot.
    pub fn status(&self) -> EngineStatus {
        let shared = self.shared.lock().unwrap();
        EngineStatus {
            state: shared.state,
            attempts: shared.poll.attempts,
            module_found: shared.module_found,
            hooked_symbols: shared.hooked_symbols,
        }
    }
}

/// The capture engine.
pub struct Engine {
    backend: Arc<dyn Backend>,
    settings: EngineSettings,
    rules: CompiledRuleSet,
    locator: ModuleLocator,
    hooks: Arc<HookManager>,
    shared: Arc<Mutex<Shared>>,
    tx: Sender<EngineEvent>,
    rx: Receiver<EngineEvent>,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn Backend>,
        settings: EngineSettings,
        rules: &RuleSet,
        run_id: RunId,
    ) -> Result<Self> {
        settings.validate()?;
        let compiled = rules.compile()?;

        let store = ArtifactStore::new(settings.output_dir.clone(), run_id);
        let hooks = Arc::new(HookManager::new(
            Arc::clone(&backend),
            store,
            settings.clone(),
        ));
        let locator = ModuleLocator::new(Arc::clone(&backend), settings.module_name.clone());

        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Mutex::new(Shared {
            state: EngineState::Idle,
            poll: PollState {
                interval: Duration::from_millis(settings.poll_interval_ms),
                attempts: 0,
                active: false,
            },
            module_found: false,
            hooked_symbols: 0,
        }));

        Ok(Self {
            backend,
            settings,
            rules: compiled,
            locator,
            hooks,
            shared,
            tx,
            rx,
        })
    }

    /// Control handle usable from other threads.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// The hook manager (registration inspection).
    pub fn hooks(&self) -> &Arc<HookManager> {
        &self.hooks
    }

    fn set_state(&self, state: EngineState) {
        let mut shared = self.shared.lock().unwrap();
        debug!(from = %shared.state, to = %state, "state transition");
        shared.state = state;
        shared.poll.active = state == EngineState::Searching;
    }

    fn state(&self) -> EngineState {
        self.shared.lock().unwrap().state
    }

    /// Run to termination. Blocks the calling thread; use [`Engine::handle`]
    /// from another thread to stop it.
    pub fn run(&mut self) -> Result<EngineStatus> {
        info!(
            module = %self.settings.module_name,
            interval_ms = self.settings.poll_interval_ms,
            rules = self.rules.len(),
            "engine starting"
        );

        if self.backend.capabilities().load_watch {
            let watcher = Arc::new(LoadWatcher::new(
                self.settings.module_name.clone(),
                Duration::from_millis(self.settings.settle_delay_ms),
                self.tx.clone(),
            ));
            match self.backend.watch_library_loads(watcher) {
                Ok(()) => info!("dynamic-load watch active"),
                Err(e) => warn!(error = %e, "load watch unavailable, polling only"),
            }
        } else {
            debug!("backend lacks load watch, relying on the poll timer");
        }

        // Immediate attempt on start; Searching only if it misses.
        self.set_state(EngineState::Searching);
        if self.attempt_scan()? {
            self.set_state(EngineState::Hooked);
        }

        loop {
            match self.state() {
                EngineState::Searching => {
                    if let Some(max) = self.settings.max_attempts {
                        let attempts = self.shared.lock().unwrap().poll.attempts;
                        if attempts >= max {
                            warn!(attempts, "locate attempt ceiling reached, giving up");
                            self.set_state(EngineState::Terminated);
                            continue;
                        }
                    }
                    let interval = self.shared.lock().unwrap().poll.interval;
                    match self.rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if self.attempt_scan()? {
                                self.set_state(EngineState::Hooked);
                            }
                        }
                        Ok(EngineEvent::Rescan) => {
                            info!("out-of-band rescan");
                            if self.attempt_scan()? {
                                self.set_state(EngineState::Hooked);
                            }
                        }
                        Ok(EngineEvent::ModuleUnloaded) => {}
                        Ok(EngineEvent::Stop) | Err(RecvTimeoutError::Disconnected) => {
                            self.set_state(EngineState::Terminated);
                        }
                    }
                }
                EngineState::Hooked => {
                    // The poll timer is cancelled here: the loop blocks until
                    // an external event arrives.
                    match self.rx.recv() {
                        Ok(EngineEvent::Stop) | Err(_) => {
                            self.set_state(EngineState::Terminated);
                        }
                        Ok(EngineEvent::ModuleUnloaded) => {
                            warn!("target module unloaded, resuming search");
                            self.set_state(EngineState::Searching);
                        }
                        Ok(EngineEvent::Rescan) => {
                            debug!("rescan ignored while hooked");
                        }
                    }
                }
                EngineState::Terminated => break,
                EngineState::Idle => self.set_state(EngineState::Searching),
            }
        }

        let status = self.handle().status();
        info!(
            attempts = status.attempts,
            hooked = status.hooked_symbols,
            "engine stopped"
        );
        Ok(status)
    }

    /// One locate attempt; on success enumerates, matches, and hooks.
    ///
    /// Returns whether the engine reached the hooked state. Transient
    /// failures (module vanished mid-enumeration, unreadable symbol table)
    /// count as a miss and are retried on the next cycle; attach-level
    /// failures propagate.
    fn attempt_scan(&mut self) -> Result<bool> {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.poll.attempts += 1;
            debug!(attempt = shared.poll.attempts, "locate attempt");
        }

        let found = match self.locator.locate() {
            Ok(module) => module.is_some(),
            Err(e @ (Error::ProcessNotFound { .. } | Error::PermissionDenied { .. })) => {
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "locate failed");
                false
            }
        };
        if !found {
            return Ok(false);
        }
        self.shared.lock().unwrap().module_found = true;

        let exports = match self.locator.exports() {
            Ok(exports) => exports,
            Err(e) => {
                warn!(error = %e, "export enumeration failed, retrying next cycle");
                return Ok(false);
            }
        };

        let matched = match_symbols(&exports, &self.rules);
        if matched.is_empty() {
            // Diagnostic dump so an operator can extend the rule table.
            warn!(
                total = exports.len(),
                "no exports matched the rule table, dumping export names"
            );
            for sym in &exports {
                info!(
                    symbol = %sym.name,
                    address = %format_args!("{:#x}", sym.address),
                    "export"
                );
            }
        }

        let mut installed = 0usize;
        for sym in &matched {
            match self.hooks.install(sym) {
                Ok(InstallOutcome::Installed(_)) => installed += 1,
                Ok(InstallOutcome::AlreadyInstalled(_)) => {}
                Err(e) => warn!(symbol = %sym.name, error = %e, "hook installation failed"),
            }
        }

        {
            let mut shared = self.shared.lock().unwrap();
            shared.hooked_symbols = self.hooks.installed_count();
        }
        info!(
            exports = exports.len(),
            matched = matched.len(),
            installed,
            "module scan complete"
        );
        Ok(true)
    }
}

//! Backend seam over the host instrumentation runtime.
//!
//! The engine never talks to an instrumentation runtime directly. Everything
//! it needs from the target process (module lookup, export enumeration,
//! memory reads, interception, dynamic-load watching) goes through the
//! [`Backend`] trait, with one adapter per runtime. Entry/exit events flow
//! back through [`CallObserver`], dynamic-load sightings through
//! [`LoadSink`].
//!
//! Two adapters ship in-tree: a read-only `/proc`-based one for Linux
//! ([`procfs::ProcfsBackend`]) and a fully scriptable [`mock::MockBackend`]
//! used by the test suite.

pub mod mock;
#[cfg(target_os = "linux")]
pub mod procfs;

use kt_common::{CallEvent, ExportSymbol, Result, TargetModule};
use std::sync::Arc;

/// Receiver for entry/exit events of hooked functions.
///
/// Implementations must be fast and must not block: callbacks execute on the
/// target process's own threads, inside the hooked function's call path.
pub trait CallObserver: Send + Sync {
    /// A hooked function was entered.
    fn on_enter(&self, call: &CallEvent);

    /// A hooked function returned. `retval` is the raw return register.
    fn on_leave(&self, call: &CallEvent, retval: u64);
}

/// Receiver for dynamic-library-load sightings.
pub trait LoadSink: Send + Sync {
    /// The target process passed `path` to its dynamic-load primitive.
    fn on_library_load(&self, path: &str);
}

/// What a backend can actually do against the attached process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Arbitrary-offset reads from the target address space.
    pub memory_read: bool,

    /// Entry/exit interception at an absolute address.
    pub interception: bool,

    /// Interception of the dynamic-library-load primitive.
    pub load_watch: bool,
}

impl BackendCapabilities {
    /// Everything available (a full instrumentation runtime).
    pub fn full() -> Self {
        Self {
            memory_read: true,
            interception: true,
            load_watch: true,
        }
    }
}

/// The host instrumentation runtime, as consumed by the engine.
///
/// `find_module` treats absence as a normal value: a missing module is
/// `Ok(None)`, never an error. `read_memory` may return fewer bytes than
/// requested when the readable region ends early; it only errors when
/// nothing at the address is readable.
pub trait Backend: Send + Sync {
    /// What this adapter supports.
    fn capabilities(&self) -> BackendCapabilities;

    /// Look up a loaded module by name.
    fn find_module(&self, name: &str) -> Result<Option<TargetModule>>;

    /// Enumerate exported symbols of a module, as an owned snapshot.
    fn exports(&self, module: &TargetModule) -> Result<Vec<ExportSymbol>>;

    /// Read up to `len` bytes at `address` in the target address space.
    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    /// Install an entry/exit interception at `address`.
    ///
    /// Callers are responsible for not installing twice at one address;
    /// duplicate native interceptions are undefined behavior in most
    /// runtimes.
    fn install_hook(&self, address: u64, observer: Arc<dyn CallObserver>) -> Result<()>;

    /// Intercept the process's dynamic-load primitive, feeding paths to
    /// `sink` for the lifetime of the attachment.
    fn watch_library_loads(&self, sink: Arc<dyn LoadSink>) -> Result<()>;
}

//! Read-only Linux backend over the /proc filesystem.
//!
//! Grounds module location, export enumeration, and memory reads in
//! `/proc/[pid]/maps`, the mapped library's ELF dynamic symbol table, and
//! `/proc/[pid]/mem`. Interception is not possible from outside the target
//! process, so `install_hook` and `watch_library_loads` report the missing
//! capability; a full instrumentation-runtime adapter provides those.

use crate::backend::{Backend, BackendCapabilities, CallObserver, LoadSink};
use goblin::elf::Elf;
use kt_common::{Error, ExportSymbol, Result, TargetModule};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace};

/// Backend reading a live process through /proc.
#[derive(Debug, Clone)]
pub struct ProcfsBackend {
    pid: u32,
}

impl ProcfsBackend {
    /// Attach to a process by PID.
    ///
    /// Verifies the process exists; EPERM still counts as existing (reads
    /// may work via ptrace-scope exemptions or root).
    pub fn attach(pid: u32) -> Result<Self> {
        // Safety: kill with signal 0 only performs the existence check.
        let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
        if rc != 0 {
            let errno = std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(0);
            if errno == libc::ESRCH {
                return Err(Error::ProcessNotFound { pid });
            }
        }
        debug!(pid, "attached via procfs");
        Ok(Self { pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn maps_path(&self) -> PathBuf {
        PathBuf::from(format!("/proc/{}/maps", self.pid))
    }

    fn mem_path(&self) -> PathBuf {
        PathBuf::from(format!("/proc/{}/mem", self.pid))
    }

    fn read_maps(&self) -> Result<String> {
        std::fs::read_to_string(self.maps_path()).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ProcessNotFound { pid: self.pid },
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied { pid: self.pid },
            _ => Error::Io(e),
        })
    }
}

/// One parsed line of /proc/[pid]/maps.
struct MapsEntry {
    start: u64,
    end: u64,
    path: Option<PathBuf>,
}

/// Parse a maps line: `start-end perms offset dev inode [pathname]`.
fn parse_maps_line(line: &str) -> Option<MapsEntry> {
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    // perms, offset, dev, inode
    let path = fields.nth(4).map(PathBuf::from);
    Some(MapsEntry { start, end, path })
}

impl Backend for ProcfsBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            memory_read: true,
            interception: false,
            load_watch: false,
        }
    }

    fn find_module(&self, name: &str) -> Result<Option<TargetModule>> {
        let maps = self.read_maps()?;

        let mut base = u64::MAX;
        let mut end = 0u64;
        let mut path: Option<PathBuf> = None;

        for line in maps.lines() {
            let Some(entry) = parse_maps_line(line) else {
                continue;
            };
            let Some(entry_path) = &entry.path else {
                continue;
            };
            let matches = entry_path
                .file_name()
                .and_then(|f| f.to_str())
                .map(|f| f.contains(name))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            base = base.min(entry.start);
            end = end.max(entry.end);
            if path.is_none() {
                path = entry.path;
            }
        }

        if path.is_none() {
            trace!(pid = self.pid, module = name, "module not mapped");
            return Ok(None);
        }

        Ok(Some(TargetModule {
            name: name.to_string(),
            base,
            size: end - base,
            loaded: true,
            path,
        }))
    }

    fn exports(&self, module: &TargetModule) -> Result<Vec<ExportSymbol>> {
        let Some(path) = &module.path else {
            return Err(Error::ExportEnumeration(format!(
                "no backing file for module '{}'",
                module.name
            )));
        };

        let data = std::fs::read(path).map_err(|e| {
            Error::ExportEnumeration(format!("{}: {}", path.display(), e))
        })?;
        let elf = Elf::parse(&data)
            .map_err(|e| Error::ExportEnumeration(format!("{}: {}", path.display(), e)))?;

        let mut symbols = Vec::new();
        for sym in elf.dynsyms.iter() {
            if !sym.is_function() || sym.st_value == 0 || sym.is_import() {
                continue;
            }
            let Some(name) = elf.dynstrtab.get_at(sym.st_name) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            symbols.push(ExportSymbol::new(name, module.base + sym.st_value));
        }

        debug!(
            module = %module.name,
            count = symbols.len(),
            "enumerated exports"
        );
        Ok(symbols)
    }

    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let file = File::open(self.mem_path()).map_err(|e| Error::MemoryRead {
            address,
            len,
            reason: e.to_string(),
        })?;

        let mut buf = vec![0u8; len];
        let mut total = 0usize;
        while total < len {
            match file.read_at(&mut buf[total..], address + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => {
                    if total > 0 {
                        break;
                    }
                    return Err(Error::MemoryRead {
                        address,
                        len,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if total == 0 {
            return Err(Error::MemoryRead {
                address,
                len,
                reason: "nothing readable at address".into(),
            });
        }

        buf.truncate(total);
        Ok(buf)
    }

    fn install_hook(&self, address: u64, _observer: Arc<dyn CallObserver>) -> Result<()> {
        let _ = address;
        Err(Error::CapabilityMissing(
            "interception requires an instrumentation-runtime backend".into(),
        ))
    }

    fn watch_library_loads(&self, _sink: Arc<dyn LoadSink>) -> Result<()> {
        Err(Error::CapabilityMissing(
            "dynamic-load watch requires an instrumentation-runtime backend".into(),
        ))
    }
}

//! Module location and export enumeration.
//!
//! The locator owns the current `TargetModule` snapshot and replaces it
//! wholesale on every rescan. Absence of the module is a normal value, not
//! an error; backends only error on real faults (process gone, permission).

use crate::backend::Backend;
use kt_common::{Error, ExportSymbol, Result, TargetModule};
use std::sync::Arc;
use tracing::{debug, info};

/// Locates the target module and snapshots its export table.
pub struct ModuleLocator {
    backend: Arc<dyn Backend>,
    module_name: String,
    current: Option<TargetModule>,
}

impl ModuleLocator {
    pub fn new(backend: Arc<dyn Backend>, module_name: impl Into<String>) -> Self {
        Self {
            backend,
            module_name: module_name.into(),
            current: None,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// The most recent successful snapshot, if any.
    pub fn current(&self) -> Option<&TargetModule> {
        self.current.as_ref()
    }

    /// Attempt to locate the module, replacing the snapshot wholesale.
    pub fn locate(&mut self) -> Result<Option<&TargetModule>> {
        match self.backend.find_module(&self.module_name)? {
            Some(module) => {
                info!(
                    module = %self.module_name,
                    base = %format_args!("{:#x}", module.base),
                    size = module.size,
                    "module located"
                );
                self.current = Some(module);
                Ok(self.current.as_ref())
            }
            None => {
                debug!(module = %self.module_name, "module not present");
                self.current = None;
                Ok(None)
            }
        }
    }

    /// Snapshot the export table of the currently located module.
    ///
    /// The returned symbols are owned copies; nothing keeps pointing into
    /// the target's symbol table after this call returns.
    pub fn exports(&self) -> Result<Vec<ExportSymbol>> {
        let module = self.current.as_ref().ok_or_else(|| Error::ModuleVanished {
            name: self.module_name.clone(),
        })?;
        self.backend.exports(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, MOCK_MODULE_NAME};

    #[test]
    fn test_locate_absent_is_ok_none() {
        let backend = Arc::new(MockBackend::new());
        let mut locator = ModuleLocator::new(backend, MOCK_MODULE_NAME);
        assert!(locator.locate().unwrap().is_none());
        assert!(locator.current().is_none());
    }

    #[test]
    fn test_locate_replaces_snapshot() {
        let backend = Arc::new(MockBackend::new().with_module(0x7000_0000, 0x2000).absent_for(1));
        let mut locator = ModuleLocator::new(backend, MOCK_MODULE_NAME);

        assert!(locator.locate().unwrap().is_none());
        let module = locator.locate().unwrap().unwrap().clone();
        assert_eq!(module.base, 0x7000_0000);
        assert_eq!(locator.current(), Some(&module));
    }

    #[test]
    fn test_exports_without_module_fails() {
        let backend = Arc::new(MockBackend::new());
        let locator = ModuleLocator::new(backend, MOCK_MODULE_NAME);
        assert!(matches!(
            locator.exports(),
            Err(Error::ModuleVanished { .. })
        ));
    }

    #[test]
    fn test_exports_snapshot() {
        let backend = Arc::new(
            MockBackend::new()
                .with_module(0x7000_0000, 0x2000)
                .with_export("oecc01", 0x7000_0100)
                .with_export("malloc", 0x7000_0200),
        );
        let mut locator = ModuleLocator::new(backend, MOCK_MODULE_NAME);
        locator.locate().unwrap();

        let exports = locator.exports().unwrap();
        assert_eq!(exports.len(), 2);
        assert_eq!(exports[0].name, "oecc01");
    }
}

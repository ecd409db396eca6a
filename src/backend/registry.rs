//! Registry of named backend plugins with load reference counts.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::BackendPlugin;
use crate::error::{Result, VrmrError};
use crate::list::List;
use crate::textdir::TextDirPlugin;

/// Longest accepted plugin name, in bytes
pub const MAX_PLUGIN_NAME: usize = 32;

struct RegistryEntry {
    name: String,
    plugin: Arc<dyn BackendPlugin>,
    refcount: usize,
}

/// Plugins available to a [`Context`](super::Context).
///
/// Entries are kept in registration order. Loading bumps an entry's
/// reference count; unloading drops it and removes the entry at zero.
pub struct PluginRegistry {
    entries: Mutex<List<RegistryEntry>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(List::new()),
        }
    }

    /// Create a registry holding the plugins shipped with the library.
    pub fn with_builtin_plugins() -> Result<Self> {
        let registry = Self::new();
        registry.register(Arc::new(TextDirPlugin))?;
        Ok(registry)
    }

    /// Add a plugin under its own name. Names are not deduplicated; `load`
    /// picks the first registration.
    pub fn register(&self, plugin: Arc<dyn BackendPlugin>) -> Result<()> {
        let name = plugin.name();
        if name.len() > MAX_PLUGIN_NAME {
            return Err(VrmrError::NameTooLong {
                name: name.to_string(),
                max: MAX_PLUGIN_NAME,
            });
        }
        if name.is_empty() {
            return Err(VrmrError::InvalidName("empty plugin name".to_string()));
        }

        debug!(plugin = name, "registering backend plugin");
        let entry = RegistryEntry {
            name: name.to_string(),
            plugin: Arc::clone(&plugin),
            refcount: 0,
        };
        self.entries.lock().append(entry);
        Ok(())
    }

    /// Take a reference to a plugin.
    pub fn load(&self, name: &str) -> Result<Arc<dyn BackendPlugin>> {
        let mut entries = self.entries.lock();
        let id = entries
            .cursor_top()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| id)
            .ok_or_else(|| VrmrError::PluginNotFound(name.to_string()))?;

        let entry = entries
            .get_mut(id)
            .ok_or_else(|| VrmrError::Internal("registry entry vanished".to_string()))?;
        entry.refcount += 1;
        debug!(plugin = name, refcount = entry.refcount, "plugin loaded");
        Ok(Arc::clone(&entry.plugin))
    }

    /// Drop a reference to a plugin. Unknown names and unbalanced unloads
    /// are logged and otherwise ignored.
    pub fn unload(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        let Some(id) = entries
            .cursor_top()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| id)
        else {
            warn!(plugin = name, "unload of a plugin that is not registered");
            return Ok(());
        };

        let remaining = match entries.get_mut(id) {
            Some(entry) if entry.refcount > 0 => {
                entry.refcount -= 1;
                entry.refcount
            }
            _ => {
                warn!(plugin = name, "unload of a plugin that is not loaded");
                return Ok(());
            }
        };

        if remaining == 0 {
            entries.remove_node(id)?;
            debug!(plugin = name, "plugin removed from registry");
        }
        Ok(())
    }

    /// Current reference count, `None` if no entry has this name.
    pub fn refcount(&self, name: &str) -> Option<usize> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.refcount)
    }

    /// Registered plugin names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::config::Config;

    struct Named(&'static str);

    impl BackendPlugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn setup(&self, _config: &Config) -> Result<Box<dyn Backend>> {
            Err(VrmrError::Internal("not a real plugin".into()))
        }
    }

    #[test]
    fn test_load_missing_plugin() {
        let registry = PluginRegistry::new();
        let err = registry.load("sql").err().unwrap();
        assert!(matches!(err, VrmrError::PluginNotFound(_)));
    }

    #[test]
    fn test_refcount_lifecycle() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Named("textdir"))).unwrap();
        assert_eq!(registry.refcount("textdir"), Some(0));

        registry.load("textdir").unwrap();
        registry.load("textdir").unwrap();
        assert_eq!(registry.refcount("textdir"), Some(2));

        registry.unload("textdir").unwrap();
        assert_eq!(registry.refcount("textdir"), Some(1));
        registry.unload("textdir").unwrap();
        assert_eq!(registry.refcount("textdir"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unbalanced_unload_is_tolerated() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Named("textdir"))).unwrap();
        assert!(registry.unload("textdir").is_ok());
        assert_eq!(registry.refcount("textdir"), Some(0));
        assert!(registry.unload("never-registered").is_ok());
    }

    #[test]
    fn test_name_too_long() {
        let registry = PluginRegistry::new();
        let err = registry
            .register(Arc::new(Named("a-very-long-plugin-name-that-overflows")))
            .unwrap_err();
        assert!(matches!(err, VrmrError::NameTooLong { max: 32, .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicates_first_wins() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Named("dup"))).unwrap();
        registry.register(Arc::new(Named("dup"))).unwrap();
        assert_eq!(registry.len(), 2);
        registry.load("dup").unwrap();
        assert_eq!(registry.refcount("dup"), Some(1));
        registry.unload("dup").unwrap();
        assert_eq!(registry.names(), vec!["dup".to_string()]);
    }

    #[test]
    fn test_builtin_plugins() {
        let registry = PluginRegistry::with_builtin_plugins().unwrap();
        assert_eq!(registry.names(), vec!["textdir".to_string()]);
    }
}

//! Per-category backend dispatch.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{Backend, PluginRegistry};
use crate::config::Config;
use crate::error::{Result, VrmrError};
use crate::types::{BackendCategory, OpenMode};

/// Lifecycle state of one category's backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryState {
    Unloaded,
    Open,
}

/// A loaded plugin together with the instance it set up. Keeping both in
/// one value means a category either has both or neither.
struct BackendSlot {
    plugin: String,
    backend: Box<dyn Backend>,
}

/// Holds the active backend of every object category.
pub struct Context {
    config: Config,
    registry: Arc<PluginRegistry>,
    mode: OpenMode,
    slots: [Option<BackendSlot>; 4],
}

fn slot_index(category: BackendCategory) -> usize {
    match category {
        BackendCategory::Services => 0,
        BackendCategory::Zones => 1,
        BackendCategory::Interfaces => 2,
        BackendCategory::Rules => 3,
    }
}

impl Context {
    /// Create a context with nothing loaded. Backends are opened read-write
    /// unless [`Context::with_open_mode`] says otherwise.
    pub fn new(config: Config, registry: Arc<PluginRegistry>) -> Self {
        Self {
            config,
            registry,
            mode: OpenMode::ReadWrite,
            slots: [None, None, None, None],
        }
    }

    /// Set the mode backends are opened with.
    pub fn with_open_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn state(&self, category: BackendCategory) -> CategoryState {
        if self.slots[slot_index(category)].is_some() {
            CategoryState::Open
        } else {
            CategoryState::Unloaded
        }
    }

    /// Name of the plugin serving a category, if loaded.
    pub fn plugin_name(&self, category: BackendCategory) -> Option<&str> {
        self.slots[slot_index(category)]
            .as_ref()
            .map(|s| s.plugin.as_str())
    }

    /// Load, set up, configure and open the backend of every category, in
    /// category order.
    ///
    /// The first failure is returned as is. Categories opened before it
    /// stay open.
    pub fn load_backends(&mut self) -> Result<()> {
        for category in BackendCategory::ALL {
            self.load_backend(category).inspect_err(|e| {
                error!(%category, "loading backend failed: {}", e);
            })?;
        }
        Ok(())
    }

    fn load_backend(&mut self, category: BackendCategory) -> Result<()> {
        let index = slot_index(category);
        if self.slots[index].is_some() {
            return Err(VrmrError::BackendState(format!(
                "{} backend already loaded",
                category
            )));
        }

        let name = self.config.backend_for(category).to_string();
        let plugin = self.registry.load(&name)?;

        let mut backend = plugin.setup(&self.config)?;
        backend.conf(&self.config)?;
        backend.open(self.mode, category.object_type())?;

        debug!(%category, plugin = %name, "backend open");
        self.slots[index] = Some(BackendSlot {
            plugin: name,
            backend,
        });
        Ok(())
    }

    /// Close every loaded backend and release its plugin, in category
    /// order. Stops at the first failure.
    pub fn unload_backends(&mut self) -> Result<()> {
        for category in BackendCategory::ALL {
            let index = slot_index(category);
            let Some(mut slot) = self.slots[index].take() else {
                warn!(%category, "backend not loaded, nothing to unload");
                continue;
            };

            if let Err(e) = slot.backend.close(category.object_type()) {
                error!(%category, "closing backend failed: {}", e);
                self.slots[index] = Some(slot);
                return Err(e);
            }

            let BackendSlot { plugin, backend } = slot;
            drop(backend);
            self.registry.unload(&plugin)?;
            debug!(%category, plugin = %plugin, "backend unloaded");
        }
        Ok(())
    }

    /// The open backend of a category.
    pub fn backend(&mut self, category: BackendCategory) -> Result<&mut dyn Backend> {
        match self.slots[slot_index(category)].as_mut() {
            Some(slot) => Ok(slot.backend.as_mut()),
            None => Err(VrmrError::BackendState(format!(
                "{} backend not loaded",
                category
            ))),
        }
    }

    pub fn services(&mut self) -> Result<&mut dyn Backend> {
        self.backend(BackendCategory::Services)
    }

    pub fn zones(&mut self) -> Result<&mut dyn Backend> {
        self.backend(BackendCategory::Zones)
    }

    pub fn interfaces(&mut self) -> Result<&mut dyn Backend> {
        self.backend(BackendCategory::Interfaces)
    }

    pub fn rules(&mut self) -> Result<&mut dyn Backend> {
        self.backend(BackendCategory::Rules)
    }
}

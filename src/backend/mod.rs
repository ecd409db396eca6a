//! Storage backend contract and dispatch.
//!
//! A [`BackendPlugin`] is registered by name in a [`PluginRegistry`]. The
//! [`Context`] loads one plugin per [`BackendCategory`], creates a
//! [`Backend`] instance with `setup`, configures and opens it, and hands it
//! out to callers for object CRUD.
//!
//! [`BackendCategory`]: crate::types::BackendCategory

pub mod context;
pub mod registry;

pub use context::{CategoryState, Context};
pub use registry::{PluginRegistry, MAX_PLUGIN_NAME};

use crate::config::Config;
use crate::error::Result;
use crate::types::{ListEntry, ObjectType, OpenMode};

/// Lazy sequence of every value stored under one key.
///
/// Holds the underlying file (or other resource) open until it is
/// exhausted or dropped.
pub type Answers = Box<dyn Iterator<Item = Result<String>> + Send>;

/// Operations every storage backend provides.
pub trait Backend: Send {
    /// Validate and apply configuration.
    fn conf(&mut self, config: &Config) -> Result<()>;

    /// Acquire the storage for one category.
    fn open(&mut self, mode: OpenMode, object_type: ObjectType) -> Result<()>;

    /// Release the storage.
    fn close(&mut self, object_type: ObjectType) -> Result<()>;

    /// First value of `question` for object `name`. `Ok(None)` when the
    /// key is absent. Values longer than `max_len` are an error.
    fn ask(
        &mut self,
        name: &str,
        question: &str,
        max_len: usize,
        object_type: ObjectType,
    ) -> Result<Option<String>>;

    /// Every value of a key that may repeat, in file order.
    fn ask_multi(
        &mut self,
        name: &str,
        question: &str,
        max_len: usize,
        object_type: ObjectType,
    ) -> Result<Answers>;

    /// Store `answer` under `question`. With `overwrite` the key ends up
    /// with exactly this one value; without it the value is added after
    /// the existing ones.
    fn tell(
        &mut self,
        name: &str,
        question: &str,
        answer: &str,
        overwrite: bool,
        object_type: ObjectType,
    ) -> Result<()>;

    /// Next stored object of `object_type`, `None` once the listing is
    /// exhausted. The following call starts a new listing.
    fn list(&mut self, object_type: ObjectType) -> Result<Option<ListEntry>>;

    /// Create an empty object.
    fn add(&mut self, name: &str, object_type: ObjectType) -> Result<()>;

    /// Delete an object. Containers (zones, networks) must be empty unless
    /// `recursive` is set.
    fn del(&mut self, name: &str, object_type: ObjectType, recursive: bool) -> Result<()>;

    fn rename(&mut self, name: &str, new_name: &str, object_type: ObjectType) -> Result<()>;

    /// Run `list` to the end and collect the entries.
    fn list_all(&mut self, object_type: ObjectType) -> Result<Vec<ListEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.list(object_type)? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// A named factory of [`Backend`] instances.
pub trait BackendPlugin: Send + Sync {
    /// Registry name, e.g. `textdir`
    fn name(&self) -> &str;

    /// Allocate a fresh backend instance.
    fn setup(&self, config: &Config) -> Result<Box<dyn Backend>>;
}

//! "textdir" storage backend.
//!
//! Stores every object as a small text file of `KEY="value"` lines below a
//! root directory:
//!
//! | Object | Path |
//! |--------|------|
//! | service | `services/<name>` |
//! | zone | `zones/<zone>/zone.config` |
//! | network | `zones/<zone>/networks/<net>/network.config` |
//! | host | `zones/<zone>/networks/<net>/hosts/<host>.host` |
//! | group | `zones/<zone>/networks/<net>/groups/<group>.group` |
//! | interface | `interfaces/<name>.conf` |
//! | rule set | `rules/<name>.conf` |
//!
//! Rule files are rewritten under a `<file>.LOCK` lock file.

pub mod ask;
pub mod list;
pub mod location;
pub mod lock;
pub mod ops;
pub mod tell;

pub use ask::AnswerIter;
pub use location::{file_location, validate_name, ZonePath};
pub use lock::LockFile;

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::vec;

use tracing::{debug, error};

use crate::backend::{Answers, Backend, BackendPlugin};
use crate::config::Config;
use crate::error::{Result, VrmrError};
use crate::kv::parse_line;
use crate::types::{ListEntry, ObjectType, OpenMode};

/// Registry name of the textdir plugin
pub const PLUGIN_NAME: &str = "textdir";

/// Plugin entry that sets up [`TextDir`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDirPlugin;

impl BackendPlugin for TextDirPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn setup(&self, config: &Config) -> Result<Box<dyn Backend>> {
        Ok(Box::new(TextDir::new(config)))
    }
}

/// In-progress `list` walk
struct ListCursor {
    object_type: ObjectType,
    entries: vec::IntoIter<ListEntry>,
}

/// One textdir backend instance.
pub struct TextDir {
    root: PathBuf,
    opened: bool,
    writable: bool,
    lock_attempts: u32,
    lock_interval: Duration,
    cursor: Option<ListCursor>,
}

impl TextDir {
    /// Create a closed backend rooted at the configured location.
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.textdir_location.clone(),
            opened: false,
            writable: false,
            lock_attempts: config.lock_attempts,
            lock_interval: config.lock_interval,
            cursor: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.opened {
            error!("Internal Error: textdir backend not opened");
            return Err(VrmrError::BackendState("backend not opened".to_string()));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.writable {
            return Err(VrmrError::BackendState(
                "backend opened read-only".to_string(),
            ));
        }
        Ok(())
    }

    fn path_of(&self, name: &str, object_type: ObjectType) -> Result<PathBuf> {
        file_location(&self.root, name, object_type)
    }
}

impl Backend for TextDir {
    fn conf(&mut self, config: &Config) -> Result<()> {
        let conf_path = config.plugin_config_path(PLUGIN_NAME);
        self.root = config.textdir_location.clone();
        self.lock_attempts = config.lock_attempts;
        self.lock_interval = config.lock_interval;

        if conf_path.is_file() {
            let text = std::fs::read_to_string(&conf_path)
                .map_err(|e| VrmrError::io_at(&conf_path, e))?;
            for line in text.lines() {
                if let Some((key, value)) = parse_line(line) {
                    if key.eq_ignore_ascii_case("LOCATION") {
                        self.root = PathBuf::from(value);
                    }
                }
            }
        }

        if !self.root.is_absolute() {
            return Err(VrmrError::Config(format!(
                "textdir location '{}' is not an absolute path",
                self.root.display()
            )));
        }
        debug!(root = %self.root.display(), "textdir configured");
        Ok(())
    }

    fn open(&mut self, mode: OpenMode, object_type: ObjectType) -> Result<()> {
        if self.opened {
            return Err(VrmrError::BackendState("backend already open".to_string()));
        }
        if !self.root.is_dir() {
            error!(root = %self.root.display(), "textdir location is not a directory");
            return Err(VrmrError::NotFound(self.root.display().to_string()));
        }

        let dir = location::category_dir(&self.root, object_type);
        if !dir.is_dir() {
            if mode.is_writable() {
                std::fs::create_dir_all(&dir).map_err(|e| VrmrError::io_at(&dir, e))?;
            } else {
                return Err(VrmrError::NotFound(dir.display().to_string()));
            }
        }

        self.opened = true;
        self.writable = mode.is_writable();
        debug!(%object_type, writable = self.writable, "textdir opened");
        Ok(())
    }

    fn close(&mut self, object_type: ObjectType) -> Result<()> {
        if !self.opened {
            return Err(VrmrError::BackendState("backend not open".to_string()));
        }
        self.opened = false;
        self.writable = false;
        self.cursor = None;
        debug!(%object_type, "textdir closed");
        Ok(())
    }

    fn ask(
        &mut self,
        name: &str,
        question: &str,
        max_len: usize,
        object_type: ObjectType,
    ) -> Result<Option<String>> {
        self.ensure_open()?;
        let path = self.path_of(name, object_type)?;
        ask::ask_file(&path, question, max_len)
    }

    fn ask_multi(
        &mut self,
        name: &str,
        question: &str,
        max_len: usize,
        object_type: ObjectType,
    ) -> Result<Answers> {
        self.ensure_open()?;
        let path = self.path_of(name, object_type)?;
        Ok(Box::new(AnswerIter::open(&path, question, max_len)?))
    }

    fn tell(
        &mut self,
        name: &str,
        question: &str,
        answer: &str,
        overwrite: bool,
        object_type: ObjectType,
    ) -> Result<()> {
        self.ensure_writable()?;
        let path = self.path_of(name, object_type)?;

        let _lock = if object_type == ObjectType::Rule {
            Some(LockFile::acquire(
                &path,
                self.lock_attempts,
                self.lock_interval,
            )?)
        } else {
            None
        };
        tell::tell_file(&path, question, answer, overwrite)
    }

    fn list(&mut self, object_type: ObjectType) -> Result<Option<ListEntry>> {
        self.ensure_open()?;

        let fresh = self
            .cursor
            .as_ref()
            .map_or(true, |c| c.object_type != object_type);
        if fresh {
            let entries = list::collect_entries(&self.root, object_type)?;
            self.cursor = Some(ListCursor {
                object_type,
                entries: entries.into_iter(),
            });
        }

        let next = self.cursor.as_mut().and_then(|c| c.entries.next());
        if next.is_none() {
            self.cursor = None;
        }
        Ok(next)
    }

    fn add(&mut self, name: &str, object_type: ObjectType) -> Result<()> {
        self.ensure_writable()?;
        ops::add_object(&self.root, name, object_type)
    }

    fn del(&mut self, name: &str, object_type: ObjectType, recursive: bool) -> Result<()> {
        self.ensure_writable()?;
        ops::delete_object(&self.root, name, object_type, recursive)
    }

    fn rename(&mut self, name: &str, new_name: &str, object_type: ObjectType) -> Result<()> {
        self.ensure_writable()?;
        ops::rename_object(&self.root, name, new_name, object_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn open_backend(dir: &TempDir, mode: OpenMode) -> TextDir {
        let config = Config::default()
            .with_config_dir(dir.path().join("etc"))
            .with_textdir_location(dir.path());
        let mut backend = TextDir::new(&config);
        backend.conf(&config).unwrap();
        backend.open(mode, ObjectType::Service).unwrap();
        backend
    }

    #[test]
    fn test_conf_reads_location() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("store");
        fs::create_dir_all(dir.path().join("plugins")).unwrap();
        fs::write(
            dir.path().join("plugins/textdir.conf"),
            format!("# textdir\nLOCATION=\"{}\"\n", store.display()),
        )
        .unwrap();

        let config = Config::default().with_config_dir(dir.path());
        let mut backend = TextDir::new(&config);
        backend.conf(&config).unwrap();
        assert_eq!(backend.root(), store.as_path());
    }

    #[test]
    fn test_conf_rejects_relative_location() {
        let dir = TempDir::new().unwrap();
        let config = Config::default()
            .with_config_dir(dir.path())
            .with_textdir_location("relative/dir");
        let mut backend = TextDir::new(&config);
        assert!(matches!(
            backend.conf(&config).unwrap_err(),
            VrmrError::Config(_)
        ));
    }

    #[test]
    fn test_open_close_states() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_backend(&dir, OpenMode::ReadWrite);
        assert!(backend.is_open());
        assert!(dir.path().join("services").is_dir());
        assert!(backend.open(OpenMode::ReadWrite, ObjectType::Service).is_err());
        backend.close(ObjectType::Service).unwrap();
        assert!(backend.close(ObjectType::Service).is_err());
        assert!(backend.ask("ssh", "ACTIVE", 64, ObjectType::Service).is_err());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("services")).unwrap();
        let mut backend = open_backend(&dir, OpenMode::ReadOnly);
        let err = backend.add("ssh", ObjectType::Service).unwrap_err();
        assert!(matches!(err, VrmrError::BackendState(_)));
    }

    #[test]
    fn test_read_only_open_needs_category_dir() {
        let dir = TempDir::new().unwrap();
        let config = Config::default()
            .with_config_dir(dir.path().join("etc"))
            .with_textdir_location(dir.path());
        let mut backend = TextDir::new(&config);
        backend.conf(&config).unwrap();
        let err = backend
            .open(OpenMode::ReadOnly, ObjectType::Service)
            .unwrap_err();
        assert!(matches!(err, VrmrError::NotFound(_)));
    }

    #[test]
    fn test_list_is_stateful() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_backend(&dir, OpenMode::ReadWrite);
        backend.add("ssh", ObjectType::Service).unwrap();
        backend.add("dns", ObjectType::Service).unwrap();

        assert_eq!(
            backend.list(ObjectType::Service).unwrap().unwrap().name,
            "dns"
        );
        assert_eq!(
            backend.list(ObjectType::Service).unwrap().unwrap().name,
            "ssh"
        );
        assert!(backend.list(ObjectType::Service).unwrap().is_none());
        // a new listing starts after the end was reached
        assert_eq!(backend.list_all(ObjectType::Service).unwrap().len(), 2);
    }

    #[test]
    fn test_ask_multi_through_backend() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_backend(&dir, OpenMode::ReadWrite);
        backend.add("ftp", ObjectType::Service).unwrap();
        backend
            .tell("ftp", "RANGE", "TCP;1024:65535;21", false, ObjectType::Service)
            .unwrap();
        backend
            .tell("ftp", "RANGE", "TCP;1024:65535;20", false, ObjectType::Service)
            .unwrap();

        let ranges: Vec<String> = backend
            .ask_multi("ftp", "range", 64, ObjectType::Service)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(ranges, vec!["TCP;1024:65535;21", "TCP;1024:65535;20"]);
    }
}

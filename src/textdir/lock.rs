use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, VrmrError};

/// Suffix appended to a file name to form its lock file
pub const LOCK_SUFFIX: &str = ".LOCK";

/// Advisory lock file next to a file being rewritten.
///
/// The lock is taken by checking that `<path>.LOCK` does not exist and then
/// creating it. The two steps are not atomic, so two processes can both
/// get through; the lock only serializes writers that do not start at the
/// same instant. A crashed holder leaves the lock file behind and it has to
/// be removed by hand.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Lock file path for `target`.
    pub fn path_for(target: &Path) -> PathBuf {
        let mut name = OsString::from(target.as_os_str());
        name.push(LOCK_SUFFIX);
        PathBuf::from(name)
    }

    /// Wait for the lock on `target` to be free and take it. Polls up to
    /// `attempts` times, `interval` apart.
    pub fn acquire(target: &Path, attempts: u32, interval: Duration) -> Result<Self> {
        let path = Self::path_for(target);
        let attempts = attempts.max(1);

        for attempt in 1..=attempts {
            if !path.exists() {
                let mut file = File::create(&path).map_err(|e| VrmrError::io_at(&path, e))?;
                writeln!(file, "{}", std::process::id()).map_err(|e| VrmrError::io_at(&path, e))?;
                debug!(path = %path.display(), "lock taken");
                return Ok(Self { path });
            }
            debug!(path = %path.display(), attempt, "waiting for lock");
            if attempt < attempts {
                thread::sleep(interval);
            }
        }

        warn!(path = %path.display(), attempts, "timed out waiting for lock");
        Err(VrmrError::LockTimeout { path, attempts })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), "removing lock file failed: {}", e);
        }
    }
}

//! Creating, deleting and renaming objects on disk.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, VrmrError};
use crate::textdir::location::{container_dir, file_location, validate_name, ZonePath};
use crate::types::ObjectType;

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| VrmrError::io_at(path, e))
}

fn require_dir(path: &Path, what: &str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(VrmrError::NotFound(format!("{} '{}'", what, path.display())))
    }
}

/// Directory that must exist before a zone-tree object can be created in it.
fn parent_container(root: &Path, zp: &ZonePath<'_>, object_type: ObjectType) -> Result<Option<PathBuf>> {
    Ok(match object_type {
        ObjectType::Network => Some(container_dir(root, zp.zone, ObjectType::Zone)?),
        ObjectType::Host | ObjectType::Group => {
            let network = format!("{}.{}", zp.network.unwrap_or_default(), zp.zone);
            Some(container_dir(root, &network, ObjectType::Network)?)
        }
        _ => None,
    })
}

/// Create an empty object file, plus the directory skeleton of a zone or
/// network.
pub fn add_object(root: &Path, name: &str, object_type: ObjectType) -> Result<()> {
    let path = file_location(root, name, object_type)?;

    match object_type {
        ObjectType::Zone | ObjectType::Network => {
            let zp = ZonePath::parse(name, object_type)?;
            if let Some(parent) = parent_container(root, &zp, object_type)? {
                require_dir(&parent, "zone")?;
            }
            let dir = container_dir(root, name, object_type)?;
            if dir.exists() {
                return Err(VrmrError::AlreadyExists(name.to_string()));
            }
            if object_type == ObjectType::Zone {
                create_dir(&dir.join("networks"))?;
            } else {
                create_dir(&dir.join("hosts"))?;
                create_dir(&dir.join("groups"))?;
            }
        }
        ObjectType::Host | ObjectType::Group => {
            let zp = ZonePath::parse(name, object_type)?;
            if let Some(parent) = parent_container(root, &zp, object_type)? {
                require_dir(&parent, "network")?;
            }
            if let Some(dir) = path.parent() {
                create_dir(dir)?;
            }
        }
        ObjectType::Service | ObjectType::Interface | ObjectType::Rule => {
            if let Some(dir) = path.parent() {
                create_dir(dir)?;
            }
        }
    }

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => VrmrError::AlreadyExists(name.to_string()),
            _ => VrmrError::io_at(&path, e),
        })?;
    debug!(%object_type, name, "object added");
    Ok(())
}

fn has_entries(dir: &Path) -> Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut read) => Ok(read.next().is_some()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(VrmrError::io_at(dir, e)),
    }
}

/// Remove an object. A zone or network that still holds objects is only
/// removed when `recursive` is set.
pub fn delete_object(root: &Path, name: &str, object_type: ObjectType, recursive: bool) -> Result<()> {
    match object_type {
        ObjectType::Zone | ObjectType::Network => {
            let dir = container_dir(root, name, object_type)?;
            require_dir(&dir, "object")?;

            if !recursive {
                let children: &[&str] = if object_type == ObjectType::Zone {
                    &["networks"]
                } else {
                    &["hosts", "groups"]
                };
                for child in children {
                    if has_entries(&dir.join(child))? {
                        return Err(VrmrError::BackendState(format!(
                            "{} '{}' is not empty",
                            object_type, name
                        )));
                    }
                }
            }
            fs::remove_dir_all(&dir).map_err(|e| VrmrError::io_at(&dir, e))?;
        }
        _ => {
            let path = file_location(root, name, object_type)?;
            fs::remove_file(&path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => VrmrError::NotFound(name.to_string()),
                _ => VrmrError::io_at(&path, e),
            })?;
        }
    }
    debug!(%object_type, name, recursive, "object deleted");
    Ok(())
}

/// Rename an object. Zone-tree objects keep their parents; only the last
/// component of the name may change.
pub fn rename_object(root: &Path, name: &str, new_name: &str, object_type: ObjectType) -> Result<()> {
    validate_name(name, object_type)?;
    validate_name(new_name, object_type)?;

    let (from, to) = match object_type {
        ObjectType::Zone | ObjectType::Network | ObjectType::Host | ObjectType::Group => {
            let old = ZonePath::parse(name, object_type)?;
            let new = ZonePath::parse(new_name, object_type)?;
            let same_parent = match object_type {
                ObjectType::Zone => true,
                ObjectType::Network => old.zone == new.zone,
                _ => old.zone == new.zone && old.network == new.network,
            };
            if !same_parent {
                return Err(VrmrError::InvalidName(format!(
                    "cannot move '{}' to '{}'",
                    name, new_name
                )));
            }
            if matches!(object_type, ObjectType::Zone | ObjectType::Network) {
                (
                    container_dir(root, name, object_type)?,
                    container_dir(root, new_name, object_type)?,
                )
            } else {
                (
                    file_location(root, name, object_type)?,
                    file_location(root, new_name, object_type)?,
                )
            }
        }
        _ => (
            file_location(root, name, object_type)?,
            file_location(root, new_name, object_type)?,
        ),
    };

    if !from.exists() {
        return Err(VrmrError::NotFound(name.to_string()));
    }
    if to.exists() {
        return Err(VrmrError::AlreadyExists(new_name.to_string()));
    }
    fs::rename(&from, &to).map_err(|e| VrmrError::io_at(&from, e))?;
    debug!(%object_type, name, new_name, "object renamed");
    Ok(())
}

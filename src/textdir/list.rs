use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Result, VrmrError};
use crate::textdir::location::{category_dir, validate_name};
use crate::textdir::lock::LOCK_SUFFIX;
use crate::types::{ListEntry, ObjectType};

/// Sorted `(name, is_dir)` pairs of a directory, without hidden entries and
/// lock files. A missing directory is empty.
fn read_sorted(dir: &Path) -> Result<Vec<(String, bool)>> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(VrmrError::io_at(dir, e)),
    };

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| VrmrError::io_at(dir, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || name.ends_with(LOCK_SUFFIX) {
            continue;
        }
        let is_dir = entry
            .file_type()
            .map_err(|e| VrmrError::io_at(entry.path(), e))?
            .is_dir();
        entries.push((name, is_dir));
    }
    entries.sort();
    Ok(entries)
}

/// Files of `dir` ending in `suffix`, with the suffix stripped and only
/// names that pass validation.
fn files_with_suffix(dir: &Path, suffix: &str, object_type: ObjectType) -> Result<Vec<String>> {
    Ok(read_sorted(dir)?
        .into_iter()
        .filter(|(_, is_dir)| !is_dir)
        .filter_map(|(name, _)| name.strip_suffix(suffix).map(str::to_string))
        .filter(|name| validate_name(name, object_type).is_ok())
        .collect())
}

/// Every stored object of `object_type` below `root`.
///
/// Listing [`ObjectType::Zone`] walks the whole zone tree and yields zones,
/// networks, hosts and groups; the other zone-tree types yield only their
/// own kind.
pub fn collect_entries(root: &Path, object_type: ObjectType) -> Result<Vec<ListEntry>> {
    let dir = category_dir(root, object_type);
    match object_type {
        ObjectType::Service => Ok(files_with_suffix(&dir, "", object_type)?
            .into_iter()
            .map(|name| ListEntry::new(name, object_type))
            .collect()),
        ObjectType::Interface | ObjectType::Rule => Ok(files_with_suffix(&dir, ".conf", object_type)?
            .into_iter()
            .map(|name| ListEntry::new(name, object_type))
            .collect()),
        ObjectType::Zone | ObjectType::Network | ObjectType::Host | ObjectType::Group => {
            let all = walk_zones(&dir)?;
            if object_type == ObjectType::Zone {
                Ok(all)
            } else {
                Ok(all
                    .into_iter()
                    .filter(|e| e.object_type == object_type)
                    .collect())
            }
        }
    }
}

fn walk_zones(zones_dir: &Path) -> Result<Vec<ListEntry>> {
    let mut entries = Vec::new();
    for (zone, is_dir) in read_sorted(zones_dir)? {
        if !is_dir || validate_name(&zone, ObjectType::Zone).is_err() {
            continue;
        }
        entries.push(ListEntry::new(zone.clone(), ObjectType::Zone));

        let networks_dir = zones_dir.join(&zone).join("networks");
        for (network, is_dir) in read_sorted(&networks_dir)? {
            let network_name = format!("{}.{}", network, zone);
            if !is_dir || validate_name(&network_name, ObjectType::Network).is_err() {
                continue;
            }
            entries.push(ListEntry::new(network_name.clone(), ObjectType::Network));

            let network_dir = networks_dir.join(&network);
            for (kind, subdir, suffix) in [
                (ObjectType::Host, "hosts", ".host"),
                (ObjectType::Group, "groups", ".group"),
            ] {
                for (file, is_dir) in read_sorted(&network_dir.join(subdir))? {
                    if is_dir {
                        continue;
                    }
                    let Some(member) = file.strip_suffix(suffix) else {
                        continue;
                    };
                    let name = format!("{}.{}", member, network_name);
                    if validate_name(&name, kind).is_ok() {
                        entries.push(ListEntry::new(name, kind));
                    }
                }
            }
        }
    }
    Ok(entries)
}

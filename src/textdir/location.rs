//! Object name validation and name-to-path mapping.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, VrmrError};
use crate::types::ObjectType;

/// One component of a zone-tree name (`host`, `network` or `zone`)
static ZONE_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{1,32}$").expect("ZONE_PART: hardcoded regex is invalid")
});

/// Service, interface and rule set names: dot-separated words, no empty parts
static FLAT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+(\.[a-zA-Z0-9_-]+)*$")
        .expect("FLAT_NAME: hardcoded regex is invalid")
});

/// Longest flat object name, in bytes
const MAX_FLAT_NAME: usize = 64;

/// A validated zone-tree name split into its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonePath<'a> {
    pub host: Option<&'a str>,
    pub network: Option<&'a str>,
    pub zone: &'a str,
}

impl<'a> ZonePath<'a> {
    /// Split `host.network.zone`, `network.zone` or `zone` according to
    /// the expected object type.
    pub fn parse(name: &'a str, object_type: ObjectType) -> Result<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        let expected = match object_type {
            ObjectType::Zone => 1,
            ObjectType::Network => 2,
            ObjectType::Host | ObjectType::Group => 3,
            _ => {
                return Err(VrmrError::Internal(format!(
                    "{} is not a zone-tree type",
                    object_type
                )))
            }
        };
        if parts.len() != expected || !parts.iter().all(|p| ZONE_PART.is_match(p)) {
            return Err(VrmrError::InvalidName(format!(
                "'{}' is not a valid {} name",
                name, object_type
            )));
        }

        Ok(match parts[..] {
            [zone] => Self {
                host: None,
                network: None,
                zone,
            },
            [network, zone] => Self {
                host: None,
                network: Some(network),
                zone,
            },
            [host, network, zone] => Self {
                host: Some(host),
                network: Some(network),
                zone,
            },
            _ => unreachable!("component count checked above"),
        })
    }
}

/// Check an object name before it is turned into a path.
pub fn validate_name(name: &str, object_type: ObjectType) -> Result<()> {
    match object_type {
        ObjectType::Service | ObjectType::Interface | ObjectType::Rule => {
            if name.len() > MAX_FLAT_NAME || !FLAT_NAME.is_match(name) {
                return Err(VrmrError::InvalidName(format!(
                    "'{}' is not a valid {} name",
                    name, object_type
                )));
            }
            Ok(())
        }
        _ => ZonePath::parse(name, object_type).map(|_| ()),
    }
}

/// Directory below the root that holds a category's files.
pub fn category_dir(root: &Path, object_type: ObjectType) -> PathBuf {
    match object_type {
        ObjectType::Service => root.join("services"),
        ObjectType::Interface => root.join("interfaces"),
        ObjectType::Rule => root.join("rules"),
        ObjectType::Zone | ObjectType::Network | ObjectType::Host | ObjectType::Group => {
            root.join("zones")
        }
    }
}

/// Directory of a zone or network, the container of its config file.
pub fn container_dir(root: &Path, name: &str, object_type: ObjectType) -> Result<PathBuf> {
    let zp = ZonePath::parse(name, object_type)?;
    let zone_dir = root.join("zones").join(zp.zone);
    Ok(match zp.network {
        Some(network) => zone_dir.join("networks").join(network),
        None => zone_dir,
    })
}

/// Path of the file holding object `name`.
pub fn file_location(root: &Path, name: &str, object_type: ObjectType) -> Result<PathBuf> {
    validate_name(name, object_type)?;

    let path = match object_type {
        ObjectType::Service => category_dir(root, object_type).join(name),
        ObjectType::Interface | ObjectType::Rule => {
            category_dir(root, object_type).join(format!("{}.conf", name))
        }
        ObjectType::Zone => container_dir(root, name, object_type)?.join("zone.config"),
        ObjectType::Network => container_dir(root, name, object_type)?.join("network.config"),
        ObjectType::Host | ObjectType::Group => {
            let zp = ZonePath::parse(name, object_type)?;
            let network = zp.network.unwrap_or_default();
            let host = zp.host.unwrap_or_default();
            let network_dir = root
                .join("zones")
                .join(zp.zone)
                .join("networks")
                .join(network);
            if object_type == ObjectType::Host {
                network_dir.join("hosts").join(format!("{}.host", host))
            } else {
                network_dir.join("groups").join(format!("{}.group", host))
            }
        }
    };
    Ok(path)
}

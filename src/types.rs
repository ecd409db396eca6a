use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage partition served by one backend instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendCategory {
    Services,
    Zones,
    Interfaces,
    Rules,
}

impl BackendCategory {
    /// All categories, in load order.
    pub const ALL: [BackendCategory; 4] = [
        BackendCategory::Services,
        BackendCategory::Zones,
        BackendCategory::Interfaces,
        BackendCategory::Rules,
    ];

    /// Object type passed to `open`/`close` for this category
    pub fn object_type(&self) -> ObjectType {
        match self {
            BackendCategory::Services => ObjectType::Service,
            BackendCategory::Zones => ObjectType::Zone,
            BackendCategory::Interfaces => ObjectType::Interface,
            BackendCategory::Rules => ObjectType::Rule,
        }
    }
}

impl fmt::Display for BackendCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendCategory::Services => "services",
            BackendCategory::Zones => "zones",
            BackendCategory::Interfaces => "interfaces",
            BackendCategory::Rules => "rules",
        };
        f.write_str(s)
    }
}

/// Kind of stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Host,
    Group,
    Network,
    Zone,
    Service,
    Interface,
    Rule,
}

impl ObjectType {
    /// Category whose backend stores this type
    pub fn category(&self) -> BackendCategory {
        match self {
            ObjectType::Host | ObjectType::Group | ObjectType::Network | ObjectType::Zone => {
                BackendCategory::Zones
            }
            ObjectType::Service => BackendCategory::Services,
            ObjectType::Interface => BackendCategory::Interfaces,
            ObjectType::Rule => BackendCategory::Rules,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectType::Host => "host",
            ObjectType::Group => "group",
            ObjectType::Network => "network",
            ObjectType::Zone => "zone",
            ObjectType::Service => "service",
            ObjectType::Interface => "interface",
            ObjectType::Rule => "rule",
        };
        f.write_str(s)
    }
}

/// How a backend is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

impl OpenMode {
    pub fn is_writable(&self) -> bool {
        matches!(self, OpenMode::ReadWrite)
    }
}

/// One object produced by a backend `list` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Full object name, e.g. `web.dmz.ext` for a host
    pub name: String,
    pub object_type: ObjectType,
}

impl ListEntry {
    pub fn new(name: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            name: name.into(),
            object_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order() {
        assert_eq!(BackendCategory::ALL[0], BackendCategory::Services);
        assert_eq!(BackendCategory::ALL[3], BackendCategory::Rules);
    }

    #[test]
    fn test_zone_types_share_a_category() {
        for ty in [
            ObjectType::Host,
            ObjectType::Group,
            ObjectType::Network,
            ObjectType::Zone,
        ] {
            assert_eq!(ty.category(), BackendCategory::Zones);
        }
        assert_eq!(
            BackendCategory::Rules.object_type().category(),
            BackendCategory::Rules
        );
    }
}

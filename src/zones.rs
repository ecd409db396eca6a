//! Zones, networks, hosts and groups, indexed by name and by IPv4 address.

use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{Backend, Context};
use crate::error::{Result, VrmrError};
use crate::hash::{name_index, HashStrategy, HashTable, Named, StringHash};
use crate::list::List;
use crate::textdir::validate_name;
use crate::types::ObjectType;

/// Row count of the address table
pub const ZONE_IP_HASH_ROWS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    Zone,
    Network,
    Host,
    Group,
}

impl ZoneKind {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ZoneKind::Zone => ObjectType::Zone,
            ZoneKind::Network => ObjectType::Network,
            ZoneKind::Host => ObjectType::Host,
            ZoneKind::Group => ObjectType::Group,
        }
    }
}

impl TryFrom<ObjectType> for ZoneKind {
    type Error = VrmrError;

    fn try_from(ty: ObjectType) -> Result<Self> {
        match ty {
            ObjectType::Zone => Ok(ZoneKind::Zone),
            ObjectType::Network => Ok(ZoneKind::Network),
            ObjectType::Host => Ok(ZoneKind::Host),
            ObjectType::Group => Ok(ZoneKind::Group),
            other => Err(VrmrError::Internal(format!("{} is not a zone type", other))),
        }
    }
}

/// One object of the zone tree. Names are dotted from the leaf up, e.g.
/// `pc1.office.lan` for host `pc1` in network `office` of zone `lan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub kind: ZoneKind,
    pub active: bool,
    pub comment: Option<String>,
    /// Address of a host
    pub ipv4: Option<Ipv4Addr>,
    /// Address range of a network
    pub network: Option<Ipv4Net>,
    /// Host names of a group
    pub members: Vec<String>,
}

impl Named for Zone {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a network from an address and a dotted netmask.
pub fn network_from_mask(addr: Ipv4Addr, mask: Ipv4Addr) -> Result<Ipv4Net> {
    let bits = u32::from(mask);
    let prefix = bits.leading_ones();
    if bits.count_ones() != prefix {
        return Err(VrmrError::Parse(format!("non-contiguous netmask {}", mask)));
    }
    Ipv4Net::new(addr, prefix as u8)
        .map(|net| net.trunc())
        .map_err(|e| VrmrError::Parse(e.to_string()))
}

fn parse_addr(value: Option<String>, zone: &str, key: &str) -> Option<Ipv4Addr> {
    let value = value?;
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            warn!(zone, "invalid {} '{}'", key, value);
            None
        }
    }
}

impl Zone {
    pub fn new(name: impl Into<String>, kind: ZoneKind) -> Self {
        Self {
            name: name.into(),
            kind,
            active: false,
            comment: None,
            ipv4: None,
            network: None,
            members: Vec::new(),
        }
    }

    pub fn host(name: impl Into<String>, ipv4: Ipv4Addr) -> Self {
        Self {
            ipv4: Some(ipv4),
            active: true,
            ..Self::new(name, ZoneKind::Host)
        }
    }

    pub fn network(name: impl Into<String>, network: Ipv4Net) -> Self {
        Self {
            network: Some(network.trunc()),
            active: true,
            ..Self::new(name, ZoneKind::Network)
        }
    }

    pub fn group<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            active: true,
            ..Self::new(name, ZoneKind::Group)
        }
    }

    /// `network.zone` part of a host, group or network name.
    pub fn parent_name(&self) -> Option<&str> {
        match self.kind {
            ZoneKind::Zone => None,
            _ => self.name.split_once('.').map(|(_, parent)| parent),
        }
    }

    /// Key of this object in the address table.
    pub fn ip_key(&self) -> Option<String> {
        match self.kind {
            ZoneKind::Host => self.ipv4.map(|ip| ip.to_string()),
            ZoneKind::Network => self.network.map(|net| net.network().to_string()),
            _ => None,
        }
    }

    /// Read one zone-tree object from a backend.
    pub fn load(backend: &mut dyn Backend, name: &str, kind: ZoneKind, max_len: usize) -> Result<Self> {
        let ty = kind.object_type();
        let mut zone = Self::new(name, kind);
        zone.active = backend
            .ask(name, "ACTIVE", max_len, ty)?
            .is_some_and(|v| v.eq_ignore_ascii_case("yes"));
        zone.comment = backend.ask(name, "COMMENT", max_len, ty)?;

        match kind {
            ZoneKind::Host => {
                zone.ipv4 = parse_addr(backend.ask(name, "IPADDRESS", max_len, ty)?, name, "IPADDRESS");
            }
            ZoneKind::Network => {
                let addr = parse_addr(backend.ask(name, "NETWORK", max_len, ty)?, name, "NETWORK");
                let mask = parse_addr(backend.ask(name, "NETMASK", max_len, ty)?, name, "NETMASK");
                if let (Some(addr), Some(mask)) = (addr, mask) {
                    match network_from_mask(addr, mask) {
                        Ok(net) => zone.network = Some(net),
                        Err(e) => warn!(zone = name, "{}", e),
                    }
                }
            }
            ZoneKind::Group => {
                for member in backend.ask_multi(name, "MEMBER", max_len, ty)? {
                    zone.members.push(member?);
                }
            }
            ZoneKind::Zone => {}
        }
        Ok(zone)
    }
}

/// Sum of each byte's offset from `'0'`.
pub fn hash_ipv4(dotted: &str) -> usize {
    dotted
        .bytes()
        .map(|b| usize::from(b.wrapping_sub(b'0')))
        .sum()
}

/// Address table strategy over hosts and networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneIpHash;

impl HashStrategy for ZoneIpHash {
    type Item = Arc<Zone>;
    type Key = str;

    fn hash_item(&self, item: &Arc<Zone>) -> usize {
        item.ip_key().map_or(0, |key| hash_ipv4(&key))
    }

    fn hash_key(&self, key: &str) -> usize {
        hash_ipv4(key)
    }

    fn equals(&self, item: &Arc<Zone>, key: &str) -> bool {
        item.ip_key().as_deref() == Some(key)
    }
}

/// The whole zone tree.
pub struct Zones {
    list: List<Arc<Zone>>,
    by_ip: HashTable<ZoneIpHash>,
    by_name: HashTable<StringHash<Zone>>,
}

impl Default for Zones {
    fn default() -> Self {
        Self::new()
    }
}

impl Zones {
    pub fn new() -> Self {
        Self {
            list: List::new(),
            by_ip: HashTable::new(ZONE_IP_HASH_ROWS, ZoneIpHash),
            by_name: HashTable::new(0, StringHash::new()),
        }
    }

    /// Load the zone tree in backend listing order.
    pub fn load(backend: &mut dyn Backend, max_len: usize) -> Result<Self> {
        let mut zones = Self::new();
        for entry in backend.list_all(ObjectType::Zone)? {
            let Ok(kind) = ZoneKind::try_from(entry.object_type) else {
                continue;
            };
            let zone = Zone::load(backend, &entry.name, kind, max_len)?;
            zones.list.append(Arc::new(zone));
        }
        zones.rebuild();
        debug!(count = zones.len(), "zones loaded");
        Ok(zones)
    }

    /// Load through the context's zones backend, with values capped at
    /// the configured `max_value_len`.
    pub fn load_from(ctx: &mut Context) -> Result<Self> {
        let max_len = ctx.config().max_value_len;
        Self::load(ctx.zones()?, max_len)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Zone>> {
        self.list.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Zone>> {
        self.by_name.search(name)
    }

    /// Host or network stored under a dotted-quad address.
    pub fn search_ip(&self, dotted: &str) -> Option<&Arc<Zone>> {
        self.by_ip.search(dotted)
    }

    /// Add an object. Everything but a zone needs its parent present.
    pub fn add(&mut self, zone: Zone) -> Result<Arc<Zone>> {
        if self.get(&zone.name).is_some() {
            return Err(VrmrError::AlreadyExists(zone.name));
        }
        if let Some(parent) = zone.parent_name() {
            let wanted = if zone.kind == ZoneKind::Network {
                ZoneKind::Zone
            } else {
                ZoneKind::Network
            };
            if !self.get(parent).is_some_and(|p| p.kind == wanted) {
                return Err(VrmrError::NotFound(format!(
                    "parent '{}' of '{}'",
                    parent, zone.name
                )));
            }
        }
        let zone = Arc::new(zone);
        self.list.append(Arc::clone(&zone));
        self.rebuild();
        Ok(zone)
    }

    /// Remove an object together with everything below it.
    pub fn remove(&mut self, name: &str) -> Result<Arc<Zone>> {
        if self.get(name).is_none() {
            return Err(VrmrError::NotFound(name.to_string()));
        }
        let suffix = format!(".{}", name);
        let mut target = None;
        let ids: Vec<_> = self
            .list
            .cursor_top()
            .filter(|(_, z)| z.name == name || z.name.ends_with(&suffix))
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            let zone = self.list.unlink(id)?;
            if zone.name == name {
                target = Some(zone);
            }
        }
        let target = target.ok_or_else(|| VrmrError::NotFound(name.to_string()))?;
        self.rebuild();
        Ok(target)
    }

    /// Rename an object. Only the leaf part of the name may change; names
    /// of objects below a zone or network follow.
    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let Some(current) = self.get(name) else {
            return Err(VrmrError::NotFound(name.to_string()));
        };
        validate_name(new_name, current.kind.object_type())?;
        let parent = current.parent_name();
        let new_parent = match current.kind {
            ZoneKind::Zone => None,
            _ => new_name.split_once('.').map(|(_, parent)| parent),
        };
        if parent != new_parent {
            return Err(VrmrError::InvalidName(format!(
                "cannot move '{}' to '{}'",
                name, new_name
            )));
        }
        if self.get(new_name).is_some() {
            return Err(VrmrError::AlreadyExists(new_name.to_string()));
        }

        let suffix = format!(".{}", name);
        let ids: Vec<_> = self
            .list
            .cursor_top()
            .filter(|(_, z)| z.name == name || z.name.ends_with(&suffix))
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            let Some(slot) = self.list.get_mut(id) else {
                continue;
            };
            let mut renamed = (**slot).clone();
            renamed.name = match renamed.name.strip_suffix(&suffix) {
                Some(leaf) => format!("{}.{}", leaf, new_name),
                None => new_name.to_string(),
            };
            *slot = Arc::new(renamed);
        }
        self.rebuild();
        Ok(())
    }

    /// Hosts named by a group's `MEMBER` lines. Short member names are
    /// taken from the group's own network; unknown members are skipped.
    pub fn resolve_members(&self, group: &str) -> Result<Vec<Arc<Zone>>> {
        let group = self
            .get(group)
            .ok_or_else(|| VrmrError::NotFound(group.to_string()))?;
        if group.kind != ZoneKind::Group {
            return Err(VrmrError::InvalidName(format!("'{}' is not a group", group.name)));
        }
        let network = group.parent_name().unwrap_or_default();

        let mut hosts = Vec::with_capacity(group.members.len());
        for member in &group.members {
            let full = if member.contains('.') {
                member.clone()
            } else {
                format!("{}.{}", member, network)
            };
            match self.get(&full) {
                Some(host) if host.kind == ZoneKind::Host => hosts.push(Arc::clone(host)),
                _ => warn!(group = %group.name, member = %full, "group member not found"),
            }
        }
        Ok(hosts)
    }

    fn rebuild(&mut self) {
        let mut by_ip = HashTable::new(ZONE_IP_HASH_ROWS, ZoneIpHash);
        for zone in self.list.iter().filter(|z| z.ip_key().is_some()) {
            by_ip.insert(Arc::clone(zone));
        }
        self.by_ip = by_ip;
        self.by_name = name_index(0, self.list.iter());
    }
}

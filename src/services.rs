//! Services and the port lookup table over them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{Backend, Context};
use crate::error::{Result, VrmrError};
use crate::hash::{name_index, HashStrategy, HashTable, Named, StringHash};
use crate::list::List;
use crate::types::ObjectType;

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;
pub const PROTO_GRE: u8 = 47;
pub const PROTO_ESP: u8 = 50;
pub const PROTO_AH: u8 = 51;

/// Row count of the port table
pub const SERVICE_HASH_ROWS: usize = 256;

/// One `RANGE` line of a service.
///
/// For TCP and UDP the fields are source and destination port ranges, a
/// `high` of 0 meaning a single port. For ICMP `dst_low` holds the type
/// and `dst_high` the code, where -1 accepts any code. Other protocols only
/// use `protocol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub protocol: u8,
    pub src_low: i32,
    pub src_high: i32,
    pub dst_low: i32,
    pub dst_high: i32,
}

impl PortRange {
    pub fn tcp(src: (i32, i32), dst: (i32, i32)) -> Self {
        Self::ports(PROTO_TCP, src, dst)
    }

    pub fn udp(src: (i32, i32), dst: (i32, i32)) -> Self {
        Self::ports(PROTO_UDP, src, dst)
    }

    fn ports(protocol: u8, src: (i32, i32), dst: (i32, i32)) -> Self {
        Self {
            protocol,
            src_low: src.0,
            src_high: src.1,
            dst_low: dst.0,
            dst_high: dst.1,
        }
    }

    pub fn icmp(icmp_type: i32, code: i32) -> Self {
        Self {
            protocol: PROTO_ICMP,
            src_low: 0,
            src_high: 0,
            dst_low: icmp_type,
            dst_high: code,
        }
    }

    pub fn protocol(protocol: u8) -> Self {
        Self {
            protocol,
            src_low: 0,
            src_high: 0,
            dst_low: 0,
            dst_high: 0,
        }
    }

    /// Ports under which this range is stored in the port table.
    pub fn hash_ports(&self) -> Vec<i32> {
        match self.protocol {
            PROTO_TCP | PROTO_UDP if self.dst_high == 0 => vec![self.dst_low],
            PROTO_TCP | PROTO_UDP => (self.dst_low..=self.dst_high).collect(),
            PROTO_ICMP => vec![self.dst_low],
            p => vec![i32::from(p)],
        }
    }

    /// Does a packet described by `probe` fall inside this range?
    pub fn matches(&self, probe: &ServiceProbe) -> bool {
        if self.protocol != probe.protocol {
            return false;
        }
        match self.protocol {
            PROTO_TCP | PROTO_UDP => {
                in_range(probe.dst_port, self.dst_low, self.dst_high)
                    && in_range(probe.src_port, self.src_low, self.src_high)
            }
            PROTO_ICMP => {
                self.dst_low == probe.dst_port
                    && (self.dst_high == -1 || self.dst_high == probe.src_port)
            }
            _ => true,
        }
    }
}

fn in_range(port: i32, low: i32, high: i32) -> bool {
    if high == 0 {
        port == low
    } else {
        (low..=high).contains(&port)
    }
}

fn parse_ports(s: &str) -> Result<(i32, i32)> {
    let port = |p: &str| -> Result<i32> {
        p.trim()
            .parse::<u16>()
            .map(i32::from)
            .map_err(|_| VrmrError::Parse(format!("invalid port '{}'", p)))
    };
    match s.split_once(':') {
        Some((low, high)) => {
            let (low, high) = (port(low)?, port(high)?);
            if low > high {
                return Err(VrmrError::Parse(format!("inverted port range '{}'", s)));
            }
            Ok((low, high))
        }
        None => Ok((port(s)?, 0)),
    }
}

impl FromStr for PortRange {
    type Err = VrmrError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(';').map(str::trim);
        let proto = parts.next().unwrap_or_default().to_ascii_uppercase();

        let range = match proto.as_str() {
            "TCP" | "UDP" => {
                let (Some(src), Some(dst)) = (parts.next(), parts.next()) else {
                    return Err(VrmrError::Parse(format!("incomplete range '{}'", s)));
                };
                let proto = if proto == "TCP" { PROTO_TCP } else { PROTO_UDP };
                Self::ports(proto, parse_ports(src)?, parse_ports(dst)?)
            }
            "ICMP" => {
                let icmp_type = parts
                    .next()
                    .and_then(|t| t.parse::<u8>().ok())
                    .ok_or_else(|| VrmrError::Parse(format!("invalid icmp type in '{}'", s)))?;
                let code = match parts.next() {
                    Some(c) if !c.is_empty() => c
                        .parse::<i32>()
                        .ok()
                        .filter(|c| (-1..=255).contains(c))
                        .ok_or_else(|| {
                            VrmrError::Parse(format!("invalid icmp code in '{}'", s))
                        })?,
                    _ => -1,
                };
                Self::icmp(i32::from(icmp_type), code)
            }
            "GRE" => Self::protocol(PROTO_GRE),
            "ESP" => Self::protocol(PROTO_ESP),
            "AH" => Self::protocol(PROTO_AH),
            other => {
                let number = other
                    .strip_prefix("PROTO_")
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or_else(|| VrmrError::Parse(format!("unknown protocol in '{}'", s)))?;
                Self::protocol(number)
            }
        };
        Ok(range)
    }
}

fn fmt_ports(f: &mut fmt::Formatter<'_>, low: i32, high: i32) -> fmt::Result {
    if high == 0 {
        write!(f, "{}", low)
    } else {
        write!(f, "{}:{}", low, high)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            PROTO_TCP | PROTO_UDP => {
                f.write_str(if self.protocol == PROTO_TCP { "TCP;" } else { "UDP;" })?;
                fmt_ports(f, self.src_low, self.src_high)?;
                f.write_str(";")?;
                fmt_ports(f, self.dst_low, self.dst_high)
            }
            PROTO_ICMP if self.dst_high == -1 => write!(f, "ICMP;{}", self.dst_low),
            PROTO_ICMP => write!(f, "ICMP;{};{}", self.dst_low, self.dst_high),
            PROTO_GRE => f.write_str("GRE"),
            PROTO_ESP => f.write_str("ESP"),
            PROTO_AH => f.write_str("AH"),
            p => write!(f, "PROTO_{}", p),
        }
    }
}

/// Packet description looked up in the port table. For ICMP `dst_port`
/// is the type and `src_port` the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceProbe {
    pub protocol: u8,
    pub src_port: i32,
    pub dst_port: i32,
}

impl ServiceProbe {
    pub fn new(protocol: u8, src_port: i32, dst_port: i32) -> Self {
        Self {
            protocol,
            src_port,
            dst_port,
        }
    }

    fn hash_port(&self) -> i32 {
        match self.protocol {
            PROTO_TCP | PROTO_UDP | PROTO_ICMP => self.dst_port,
            p => i32::from(p),
        }
    }
}

/// A named set of port ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub active: bool,
    pub broadcast: bool,
    pub comment: Option<String>,
    pub ranges: Vec<PortRange>,
}

impl Named for Service {
    fn name(&self) -> &str {
        &self.name
    }
}

fn yes(value: Option<String>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("yes"))
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_range(mut self, range: PortRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Read one service from a backend. Unparsable `RANGE` lines are
    /// skipped with a warning.
    pub fn load(backend: &mut dyn Backend, name: &str, max_len: usize) -> Result<Self> {
        let ty = ObjectType::Service;
        let active = yes(backend.ask(name, "ACTIVE", max_len, ty)?);
        let broadcast = yes(backend.ask(name, "BROADCAST", max_len, ty)?);
        let comment = backend.ask(name, "COMMENT", max_len, ty)?;

        let mut ranges = Vec::new();
        for line in backend.ask_multi(name, "RANGE", max_len, ty)? {
            let line = line?;
            match line.parse::<PortRange>() {
                Ok(range) => ranges.push(range),
                Err(e) => warn!(service = name, "skipping range '{}': {}", line, e),
            }
        }

        Ok(Self {
            name: name.to_string(),
            active,
            broadcast,
            comment,
            ranges,
        })
    }

    /// Write this service to a backend. The first range replaces any
    /// stored ranges and the rest are appended after it.
    pub fn save(&self, backend: &mut dyn Backend) -> Result<()> {
        let ty = ObjectType::Service;
        backend.tell(&self.name, "ACTIVE", yes_no(self.active), true, ty)?;
        backend.tell(&self.name, "BROADCAST", yes_no(self.broadcast), true, ty)?;
        if let Some(comment) = &self.comment {
            backend.tell(&self.name, "COMMENT", comment, true, ty)?;
        }
        for (i, range) in self.ranges.iter().enumerate() {
            backend.tell(&self.name, "RANGE", &range.to_string(), i == 0, ty)?;
        }
        Ok(())
    }
}

/// Port table entry: a service stored under one of its ports.
#[derive(Debug, Clone)]
pub struct ServicePort {
    pub service: Arc<Service>,
    pub hash_port: i32,
}

/// Port table strategy. Hashes by port, matches against every range of
/// the service.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceHash;

impl HashStrategy for ServiceHash {
    type Item = ServicePort;
    type Key = ServiceProbe;

    fn hash_item(&self, item: &ServicePort) -> usize {
        item.hash_port.unsigned_abs() as usize
    }

    fn hash_key(&self, key: &ServiceProbe) -> usize {
        key.hash_port().unsigned_abs() as usize
    }

    fn equals(&self, item: &ServicePort, key: &ServiceProbe) -> bool {
        item.service.ranges.iter().any(|r| r.matches(key))
    }
}

/// All services, indexed by port and by name.
pub struct Services {
    list: List<Arc<Service>>,
    by_port: HashTable<ServiceHash>,
    by_name: HashTable<StringHash<Service>>,
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}

impl Services {
    pub fn new() -> Self {
        Self {
            list: List::new(),
            by_port: HashTable::new(SERVICE_HASH_ROWS, ServiceHash),
            by_name: HashTable::new(0, StringHash::new()),
        }
    }

    /// Load every service the backend lists.
    pub fn load(backend: &mut dyn Backend, max_len: usize) -> Result<Self> {
        let mut services = Self::new();
        for entry in backend.list_all(ObjectType::Service)? {
            let service = Service::load(backend, &entry.name, max_len)?;
            services.list.append(Arc::new(service));
        }
        services.rebuild();
        debug!(count = services.len(), "services loaded");
        Ok(services)
    }

    /// Write one service back to the backend.
    pub fn save(&self, backend: &mut dyn Backend, service: &Service) -> Result<()> {
        service.save(backend)
    }

    /// Load through the context's services backend, with values capped at
    /// the configured `max_value_len`.
    pub fn load_from(ctx: &mut Context) -> Result<Self> {
        let max_len = ctx.config().max_value_len;
        Self::load(ctx.services()?, max_len)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.list.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Service>> {
        self.by_name.search(name)
    }

    /// First service with a range matching the probe.
    pub fn search(&self, probe: &ServiceProbe) -> Option<&Arc<Service>> {
        self.by_port.search(probe).map(|entry| &entry.service)
    }

    pub fn add(&mut self, service: Service) -> Result<Arc<Service>> {
        if self.get(&service.name).is_some() {
            return Err(VrmrError::AlreadyExists(service.name));
        }
        let service = Arc::new(service);
        self.list.append(Arc::clone(&service));
        self.rebuild();
        Ok(service)
    }

    pub fn remove(&mut self, name: &str) -> Result<Arc<Service>> {
        let id = self
            .list
            .cursor_top()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
            .ok_or_else(|| VrmrError::NotFound(name.to_string()))?;
        let service = self.list.unlink(id)?;
        self.rebuild();
        Ok(service)
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<Arc<Service>> {
        if self.get(new_name).is_some() {
            return Err(VrmrError::AlreadyExists(new_name.to_string()));
        }
        let id = self
            .list
            .cursor_top()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
            .ok_or_else(|| VrmrError::NotFound(name.to_string()))?;

        let slot = self
            .list
            .get_mut(id)
            .ok_or_else(|| VrmrError::Internal("stale service handle".to_string()))?;
        let mut renamed = (**slot).clone();
        renamed.name = new_name.to_string();
        let renamed = Arc::new(renamed);
        *slot = Arc::clone(&renamed);

        self.rebuild();
        Ok(renamed)
    }

    /// Tear down both tables and index the current list again.
    fn rebuild(&mut self) {
        let mut by_port = HashTable::new(SERVICE_HASH_ROWS, ServiceHash);
        for service in self.list.iter() {
            for range in &service.ranges {
                for port in range.hash_ports() {
                    by_port.insert(ServicePort {
                        service: Arc::clone(service),
                        hash_port: port,
                    });
                }
            }
        }
        self.by_port = by_port;
        self.by_name = name_index(0, self.list.iter());
        debug!(
            services = self.list.len(),
            ports = self.by_port.cells(),
            "service tables rebuilt"
        );
    }
}

//! IPVS data types and structures.

use std::fmt;
use std::net::IpAddr;

use crate::addr::{Address, Netmask};

/// IPVS version information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IPVSVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl IPVSVersion {
    /// Unpack the kernel's `major << 16 | minor << 8 | patch` encoding.
    pub fn from_packed(version: u32) -> Self {
        Self {
            major: version >> 16,
            minor: (version & 0xFF00) >> 8,
            patch: version & 0xFF,
        }
    }
}

impl fmt::Display for IPVSVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Kernel module version and connection table size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Info {
    pub version: IPVSVersion,
    pub connection_table_size: u32,
}

/// Address family of a service or destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    /// Not reported; the caller's context decides.
    #[default]
    Unspecified,
    Inet,
    Inet6,
    Other(u16),
}

impl From<u16> for AddressFamily {
    fn from(af: u16) -> Self {
        match i32::from(af) {
            0 => AddressFamily::Unspecified,
            libc::AF_INET => AddressFamily::Inet,
            libc::AF_INET6 => AddressFamily::Inet6,
            _ => AddressFamily::Other(af),
        }
    }
}

impl From<AddressFamily> for u16 {
    fn from(af: AddressFamily) -> u16 {
        match af {
            AddressFamily::Unspecified => 0,
            AddressFamily::Inet => libc::AF_INET as u16,
            AddressFamily::Inet6 => libc::AF_INET6 as u16,
            AddressFamily::Other(n) => n,
        }
    }
}

impl From<IpAddr> for AddressFamily {
    /// IPv4-mapped IPv6 addresses count as IPv4, matching [`Address`].
    fn from(ip: IpAddr) -> Self {
        match ip.to_canonical() {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Unspecified => write!(f, "AF_UNSPEC"),
            AddressFamily::Inet => write!(f, "AF_INET"),
            AddressFamily::Inet6 => write!(f, "AF_INET6"),
            AddressFamily::Other(n) => write!(f, "AF({})", n),
        }
    }
}

/// IP protocol for IPVS services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    TCP,
    UDP,
    SCTP,
    Other(u16),
}

impl From<u16> for Protocol {
    fn from(proto: u16) -> Self {
        match i32::from(proto) {
            libc::IPPROTO_TCP => Protocol::TCP,
            libc::IPPROTO_UDP => Protocol::UDP,
            libc::IPPROTO_SCTP => Protocol::SCTP,
            _ => Protocol::Other(proto),
        }
    }
}

impl From<Protocol> for u16 {
    fn from(proto: Protocol) -> u16 {
        match proto {
            Protocol::TCP => libc::IPPROTO_TCP as u16,
            Protocol::UDP => libc::IPPROTO_UDP as u16,
            Protocol::SCTP => libc::IPPROTO_SCTP as u16,
            Protocol::Other(n) => n,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::TCP => write!(f, "TCP"),
            Protocol::UDP => write!(f, "UDP"),
            Protocol::SCTP => write!(f, "SCTP"),
            Protocol::Other(n) => write!(f, "IP({})", n),
        }
    }
}

/// IPVS scheduling algorithm, identified by its kernel module name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scheduler {
    RoundRobin,
    WeightedRoundRobin,
    LeastConnection,
    WeightedLeastConnection,
    LocalityBasedLeastConnection,
    LocalityBasedLeastConnectionReplicated,
    DestinationHashing,
    SourceHashing,
    ShortestExpectedDelay,
    NeverQueue,
    WeightedFailover,
    WeightedOverflow,
    MaglevHashing,
    Other(String),
}

impl Scheduler {
    /// Kernel name of the scheduler, as carried on the wire.
    pub fn name(&self) -> &str {
        match self {
            Scheduler::RoundRobin => "rr",
            Scheduler::WeightedRoundRobin => "wrr",
            Scheduler::LeastConnection => "lc",
            Scheduler::WeightedLeastConnection => "wlc",
            Scheduler::LocalityBasedLeastConnection => "lblc",
            Scheduler::LocalityBasedLeastConnectionReplicated => "lblcr",
            Scheduler::DestinationHashing => "dh",
            Scheduler::SourceHashing => "sh",
            Scheduler::ShortestExpectedDelay => "sed",
            Scheduler::NeverQueue => "nq",
            Scheduler::WeightedFailover => "fo",
            Scheduler::WeightedOverflow => "ovf",
            Scheduler::MaglevHashing => "mh",
            Scheduler::Other(s) => s,
        }
    }
}

impl From<&str> for Scheduler {
    fn from(name: &str) -> Self {
        match name {
            "rr" => Scheduler::RoundRobin,
            "wrr" => Scheduler::WeightedRoundRobin,
            "lc" => Scheduler::LeastConnection,
            "wlc" => Scheduler::WeightedLeastConnection,
            "lblc" => Scheduler::LocalityBasedLeastConnection,
            "lblcr" => Scheduler::LocalityBasedLeastConnectionReplicated,
            "dh" => Scheduler::DestinationHashing,
            "sh" => Scheduler::SourceHashing,
            "sed" => Scheduler::ShortestExpectedDelay,
            "nq" => Scheduler::NeverQueue,
            "fo" => Scheduler::WeightedFailover,
            "ovf" => Scheduler::WeightedOverflow,
            "mh" => Scheduler::MaglevHashing,
            other => Scheduler::Other(other.to_string()),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::WeightedLeastConnection
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Service flags for IPVS.
///
/// Bits this crate has no name for are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ServiceFlags(pub u32);

impl ServiceFlags {
    pub const PERSISTENT: u32 = 0x1;
    pub const HASHED: u32 = 0x2;
    pub const ONE_PACKET: u32 = 0x4;
    pub const SCHED_OPT1: u32 = 0x8;
    pub const SCHED_OPT2: u32 = 0x10;
    pub const SCHED_OPT3: u32 = 0x20;

    // sh and mh reuse the scheduler option bits.
    pub const SCHED_SH_FALLBACK: u32 = Self::SCHED_OPT1;
    pub const SCHED_SH_PORT: u32 = Self::SCHED_OPT2;
    pub const SCHED_MH_FALLBACK: u32 = Self::SCHED_OPT1;
    pub const SCHED_MH_PORT: u32 = Self::SCHED_OPT2;

    const NAMES: [(u32, &'static str); 6] = [
        (Self::PERSISTENT, "PERSISTENT"),
        (Self::HASHED, "HASHED"),
        (Self::ONE_PACKET, "ONE_PACKET"),
        (Self::SCHED_OPT1, "SCHED_OPT1"),
        (Self::SCHED_OPT2, "SCHED_OPT2"),
        (Self::SCHED_OPT3, "SCHED_OPT3"),
    ];

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

impl fmt::Display for ServiceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Self::NAMES
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| name.to_string())
            .collect();
        let known = Self::NAMES.iter().fold(0, |acc, (bit, _)| acc | bit);
        let unknown = self.0 & !known;
        if unknown != 0 {
            parts.push(format!("{:#x}", unknown));
        }
        f.write_str(&parts.join(" | "))
    }
}

/// How IPVS forwards traffic to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForwardMethod {
    /// NAT mode (masquerading)
    #[default]
    Masquerade,
    /// Local delivery
    Local,
    /// Tunnel mode (IP-in-IP, GUE or GRE)
    Tunnel,
    /// Route mode (DSR - Direct Server Return)
    DirectRoute,
    /// Bypass
    Bypass,
    Other(u32),
}

impl From<u32> for ForwardMethod {
    fn from(method: u32) -> Self {
        match method {
            0 => ForwardMethod::Masquerade,
            1 => ForwardMethod::Local,
            2 => ForwardMethod::Tunnel,
            3 => ForwardMethod::DirectRoute,
            4 => ForwardMethod::Bypass,
            n => ForwardMethod::Other(n),
        }
    }
}

impl From<ForwardMethod> for u32 {
    fn from(method: ForwardMethod) -> u32 {
        match method {
            ForwardMethod::Masquerade => 0,
            ForwardMethod::Local => 1,
            ForwardMethod::Tunnel => 2,
            ForwardMethod::DirectRoute => 3,
            ForwardMethod::Bypass => 4,
            ForwardMethod::Other(n) => n,
        }
    }
}

/// Encapsulation used by [`ForwardMethod::Tunnel`] destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TunnelType {
    #[default]
    Ipip,
    /// Generic UDP Encapsulation
    Gue,
    Gre,
    Other(u8),
}

impl From<u8> for TunnelType {
    fn from(ty: u8) -> Self {
        match ty {
            0 => TunnelType::Ipip,
            1 => TunnelType::Gue,
            2 => TunnelType::Gre,
            n => TunnelType::Other(n),
        }
    }
}

impl From<TunnelType> for u8 {
    fn from(ty: TunnelType) -> u8 {
        match ty {
            TunnelType::Ipip => 0,
            TunnelType::Gue => 1,
            TunnelType::Gre => 2,
            TunnelType::Other(n) => n,
        }
    }
}

/// Tunnel encapsulation checksum flags. Zero means no checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TunnelFlags(pub u16);

impl TunnelFlags {
    pub const NO_CSUM: u16 = 0;
    pub const CSUM: u16 = 0x1;
    pub const REMOTE_CSUM: u16 = 0x2;
}

/// Traffic counters of a service or destination.
///
/// Always 64-bit in memory, whatever width the kernel reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub connections: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub cps: u64,
    pub pps_in: u64,
    pub pps_out: u64,
    pub bps_in: u64,
    pub bps_out: u64,
}

/// How a virtual service is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    /// Virtual IP, port and protocol.
    ByAddress {
        protocol: Protocol,
        address: Address,
        port: u16,
    },
    /// Firewall mark. Never zero.
    ByFwmark(u32),
}

impl ServiceId {
    /// Identity by virtual IP, port and protocol.
    pub fn address(protocol: Protocol, address: impl Into<Address>, port: u16) -> Self {
        ServiceId::ByAddress {
            protocol,
            address: address.into(),
            port,
        }
    }

    /// Identity by firewall mark.
    ///
    /// A zero mark yields the empty address identity, which is refused when
    /// encoded; see [`ServiceId::is_empty`].
    pub fn fwmark(mark: u32) -> Self {
        if mark == 0 {
            return ServiceId::ByAddress {
                protocol: Protocol::Other(0),
                address: Address::default(),
                port: 0,
            };
        }
        ServiceId::ByFwmark(mark)
    }

    /// True for an address identity with no protocol, address or port.
    pub fn is_empty(&self) -> bool {
        matches!(
            self,
            ServiceId::ByAddress {
                protocol: Protocol::Other(0),
                address,
                port: 0,
            } if address.is_unspecified()
        )
    }

    pub fn fwmark_value(&self) -> Option<u32> {
        match self {
            ServiceId::ByFwmark(mark) => Some(*mark),
            ServiceId::ByAddress { .. } => None,
        }
    }
}

/// An IPVS service (virtual server).
///
/// When referencing an existing service only `id` and `family` need to be
/// meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: ServiceId,
    pub family: AddressFamily,
    pub netmask: Netmask,
    pub scheduler: Scheduler,
    /// Persistence timeout in seconds; 0 disables persistence expiry.
    pub timeout: u32,
    pub flags: ServiceFlags,
    pub persistence_engine: Option<String>,
}

impl Service {
    /// A service identified by virtual IP, port and protocol.
    pub fn new(protocol: Protocol, address: IpAddr, port: u16) -> Self {
        Self {
            id: ServiceId::address(protocol, address, port),
            family: AddressFamily::from(address),
            netmask: Netmask::Invalid,
            scheduler: Scheduler::default(),
            timeout: 0,
            flags: ServiceFlags::default(),
            persistence_engine: None,
        }
    }

    /// A service identified by firewall mark.
    pub fn with_fwmark(mark: u32, family: AddressFamily) -> Self {
        Self {
            id: ServiceId::fwmark(mark),
            family,
            netmask: Netmask::Invalid,
            scheduler: Scheduler::default(),
            timeout: 0,
            flags: ServiceFlags::default(),
            persistence_engine: None,
        }
    }

    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// The virtual IP, for address-identified services.
    pub fn ip(&self) -> Option<IpAddr> {
        match self.id {
            ServiceId::ByAddress { address, .. } => address.to_ip(self.family),
            ServiceId::ByFwmark(_) => None,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            ServiceId::ByFwmark(mark) => write!(f, "FWM {} ({})", mark, self.scheduler),
            ServiceId::ByAddress { protocol, port, .. } => match self.ip() {
                Some(IpAddr::V6(ip)) => {
                    write!(f, "{} [{}]:{} ({})", protocol, ip, port, self.scheduler)
                }
                Some(ip) => write!(f, "{} {}:{} ({})", protocol, ip, port, self.scheduler),
                None => write!(f, "{} ?:{} ({})", protocol, port, self.scheduler),
            },
        }
    }
}

/// A service as reported by the kernel, with both statistics views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceExtended {
    pub service: Service,
    /// Counters from the 32-bit statistics group.
    pub stats: Stats,
    /// Counters from the 64-bit statistics group.
    pub stats64: Stats,
}

/// An IPVS destination (real server).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Destination {
    pub address: Address,
    pub family: AddressFamily,
    pub port: u16,
    pub forward_method: ForwardMethod,
    pub weight: u32,
    pub upper_threshold: u32,
    pub lower_threshold: u32,
    // Only meaningful for ForwardMethod::Tunnel, but always sent.
    pub tunnel_type: TunnelType,
    pub tunnel_port: u16,
    pub tunnel_flags: TunnelFlags,
}

impl Destination {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self {
            address: Address::from(address),
            family: AddressFamily::from(address),
            port,
            ..Default::default()
        }
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.address.to_ip(self.family)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip() {
            Some(IpAddr::V6(ip)) => write!(f, "[{}]:{}", ip, self.port),
            Some(ip) => write!(f, "{}:{}", ip, self.port),
            None => write!(f, "?:{}", self.port),
        }
    }
}

/// A destination as reported by the kernel, with live counters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DestinationExtended {
    pub destination: Destination,
    pub active_connections: u32,
    pub inactive_connections: u32,
    pub persistent_connections: u32,
    pub stats: Stats,
    pub stats64: Stats,
}

//! IPVS netlink commands and attribute definitions.
//!
//! Based on Linux kernel's include/uapi/linux/ip_vs.h

/// Generic netlink family name registered by the IPVS module.
pub const IPVS_GENL_NAME: &str = "IPVS";

/// Generic netlink protocol version spoken by this crate.
pub const IPVS_GENL_VERSION: u8 = 1;

/// Size of the generic netlink header preceding the attributes.
pub const GENL_HDRLEN: usize = 4;

/// IPVS generic netlink commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPVSCommand {
    /// Add a new virtual service
    NewService = 1,
    /// Modify an existing virtual service
    SetService = 2,
    /// Delete a virtual service
    DelService = 3,
    /// Get virtual service information
    GetService = 4,
    /// Add a new destination to a service
    NewDest = 5,
    /// Modify an existing destination
    SetDest = 6,
    /// Delete a destination from a service
    DelDest = 7,
    /// Get destination information
    GetDest = 8,
    /// Get IPVS version and connection table size
    GetInfo = 15,
}

impl From<IPVSCommand> for u8 {
    fn from(cmd: IPVSCommand) -> u8 {
        cmd as u8
    }
}

/// Top-level IPVS netlink attributes
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPVSAttr {
    /// Service information (nested)
    Service = 1,
    /// Destination information (nested)
    Dest = 2,
}

/// Service-specific attributes (nested under IPVS_CMD_ATTR_SERVICE)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPVSServiceAttr {
    /// Address family (AF_INET or AF_INET6)
    AddressFamily = 1,
    /// IP protocol (IPPROTO_TCP, IPPROTO_UDP, etc.)
    Protocol = 2,
    /// Virtual IP address
    Address = 3,
    /// Virtual port
    Port = 4,
    /// Firewall mark
    FirewallMark = 5,
    /// Scheduler name (string)
    Scheduler = 6,
    /// Service flags and mask (two u32)
    Flags = 7,
    /// Persistence timeout
    Timeout = 8,
    /// Persistence netmask
    Netmask = 9,
    /// 32-bit statistics (nested)
    Stats = 10,
    /// Persistence engine name
    PersistenceEngine = 11,
    /// 64-bit statistics (nested)
    Stats64 = 12,
}

/// Destination-specific attributes (nested under IPVS_CMD_ATTR_DEST)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPVSDestAttr {
    /// Destination IP address
    Address = 1,
    /// Destination port
    Port = 2,
    /// Forwarding method
    ForwardingMethod = 3,
    /// Weight
    Weight = 4,
    /// Upper threshold
    UpperThreshold = 5,
    /// Lower threshold
    LowerThreshold = 6,
    /// Active connections count
    ActiveConns = 7,
    /// Inactive connections count
    InactiveConns = 8,
    /// Persistent connections count
    PersistConns = 9,
    /// 32-bit statistics (nested)
    Stats = 10,
    /// Address family
    AddressFamily = 11,
    /// 64-bit statistics (nested)
    Stats64 = 12,
    /// Tunnel encapsulation type
    TunnelType = 13,
    /// Tunnel encapsulation port
    TunnelPort = 14,
    /// Tunnel encapsulation flags
    TunnelFlags = 15,
}

/// Statistics attributes, shared by the 32-bit and 64-bit groups
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum IPVSStatsAttr {
    /// Total connections
    Connections = 1,
    /// Packets received
    PacketsIn = 2,
    /// Packets sent
    PacketsOut = 3,
    /// Bytes received
    BytesIn = 4,
    /// Bytes sent
    BytesOut = 5,
    /// Connections per second
    CPS = 6,
    /// Packets per second (in)
    PPSIn = 7,
    /// Packets per second (out)
    PPSOut = 8,
    /// Bytes per second (in)
    BPSIn = 9,
    /// Bytes per second (out)
    BPSOut = 10,
}

/// Info attributes (for IPVS_CMD_GET_INFO)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPVSInfoAttr {
    /// IPVS version
    Version = 1,
    /// Connection table size
    ConnTableSize = 2,
}

macro_rules! attr_kind {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for u16 {
                fn from(attr: $ty) -> u16 {
                    attr as u16
                }
            }
        )*
    };
}

attr_kind!(IPVSAttr, IPVSServiceAttr, IPVSDestAttr, IPVSStatsAttr, IPVSInfoAttr);

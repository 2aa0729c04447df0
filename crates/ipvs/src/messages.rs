//! IPVS netlink message serialization.
//!
//! Typed attributes implement [`Nla`] so that `netlink-packet-core` handles
//! headers, the nested flag and alignment. [`GenlFrame`] carries an encoded
//! attribute body behind the 4-byte generic netlink header.

use common::{Error, Result};
use netlink_packet_core::{
    Emitable, Nla, NetlinkDeserializable, NetlinkHeader, NetlinkPayload, NetlinkSerializable,
};
use netlink_packet_generic::GenlBuffer;

use crate::attr::MAX_ATTR_PAYLOAD;
use crate::commands::{GENL_HDRLEN, IPVSAttr, IPVSCommand, IPVSDestAttr, IPVSServiceAttr};

/// An IPVS request: command plus top-level attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IPVSMessage {
    pub cmd: IPVSCommand,
    pub nlas: Vec<IPVSNla>,
}

impl IPVSMessage {
    pub fn new(cmd: IPVSCommand) -> Self {
        Self {
            cmd,
            nlas: Vec::new(),
        }
    }

    pub fn with_nlas(cmd: IPVSCommand, nlas: Vec<IPVSNla>) -> Self {
        Self { cmd, nlas }
    }

    /// Serialize the attributes into a request body.
    ///
    /// Fails when any attribute, nested ones included, would not fit the
    /// 16-bit attribute length.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        for nla in &self.nlas {
            nla.check_len()?;
        }
        let mut buf = vec![0u8; self.nlas.iter().map(Emitable::buffer_len).sum()];
        emit_all(&self.nlas, &mut buf);
        Ok(buf)
    }
}

/// Top-level IPVS netlink attributes. Both are nested containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IPVSNla {
    Service(Vec<ServiceNla>),
    Dest(Vec<DestNla>),
}

impl IPVSNla {
    fn check_len(&self) -> Result<()> {
        let (name, nested) = match self {
            Self::Service(nlas) => {
                nlas.iter().try_for_each(|nla| check_payload(nla.kind(), nla.value_len()))?;
                ("service", self.value_len())
            }
            Self::Dest(nlas) => {
                nlas.iter().try_for_each(|nla| check_payload(nla.kind(), nla.value_len()))?;
                ("destination", self.value_len())
            }
        };
        if nested > MAX_ATTR_PAYLOAD {
            return Err(Error::encode(format!(
                "{} attributes too long: {} bytes",
                name, nested
            )));
        }
        Ok(())
    }
}

fn check_payload(kind: u16, len: usize) -> Result<()> {
    if len > MAX_ATTR_PAYLOAD {
        return Err(Error::encode(format!(
            "attribute {} too long: {} bytes",
            kind, len
        )));
    }
    Ok(())
}

/// Serialize a flat attribute list, as found inside a nested container.
pub(crate) fn encode_nlas<T: Nla>(nlas: &[T]) -> Result<Vec<u8>> {
    nlas.iter()
        .try_for_each(|nla| check_payload(nla.kind(), nla.value_len()))?;
    let mut buf = vec![0u8; nlas.iter().map(Emitable::buffer_len).sum()];
    emit_all(nlas, &mut buf);
    Ok(buf)
}

fn emit_all<T: Nla>(nlas: &[T], buffer: &mut [u8]) {
    let mut offset = 0;
    for nla in nlas {
        let len = nla.buffer_len();
        nla.emit(&mut buffer[offset..offset + len]);
        offset += len;
    }
}

impl Nla for IPVSNla {
    fn value_len(&self) -> usize {
        match self {
            Self::Service(nlas) => nlas.iter().map(Emitable::buffer_len).sum(),
            Self::Dest(nlas) => nlas.iter().map(Emitable::buffer_len).sum(),
        }
    }

    fn kind(&self) -> u16 {
        match self {
            Self::Service(_) => IPVSAttr::Service.into(),
            Self::Dest(_) => IPVSAttr::Dest.into(),
        }
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match self {
            Self::Service(nlas) => emit_all(nlas, buffer),
            Self::Dest(nlas) => emit_all(nlas, buffer),
        }
    }

    fn is_nested(&self) -> bool {
        true
    }
}

/// Service-specific netlink attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceNla {
    /// Address family (AF_INET = 2, AF_INET6 = 10)
    AddressFamily(u16),
    /// Protocol (TCP = 6, UDP = 17, SCTP = 132)
    Protocol(u16),
    /// 4 bytes for IPv4, 16 for IPv6
    Address(Vec<u8>),
    /// Port number, sent big-endian
    Port(u16),
    FirewallMark(u32),
    /// Scheduler name, sent NUL-terminated
    Scheduler(String),
    Flags { flags: u32, mask: u32 },
    Timeout(u32),
    /// Compact netmask: 4 mask bytes or a 1-byte IPv6 prefix
    Netmask(Vec<u8>),
    PersistenceEngine(String),
}

impl Nla for ServiceNla {
    fn value_len(&self) -> usize {
        match self {
            Self::AddressFamily(_) | Self::Protocol(_) | Self::Port(_) => 2,
            Self::FirewallMark(_) | Self::Timeout(_) => 4,
            Self::Address(bytes) | Self::Netmask(bytes) => bytes.len(),
            Self::Scheduler(s) | Self::PersistenceEngine(s) => s.len() + 1,
            Self::Flags { .. } => 8,
        }
    }

    fn kind(&self) -> u16 {
        let attr = match self {
            Self::AddressFamily(_) => IPVSServiceAttr::AddressFamily,
            Self::Protocol(_) => IPVSServiceAttr::Protocol,
            Self::Address(_) => IPVSServiceAttr::Address,
            Self::Port(_) => IPVSServiceAttr::Port,
            Self::FirewallMark(_) => IPVSServiceAttr::FirewallMark,
            Self::Scheduler(_) => IPVSServiceAttr::Scheduler,
            Self::Flags { .. } => IPVSServiceAttr::Flags,
            Self::Timeout(_) => IPVSServiceAttr::Timeout,
            Self::Netmask(_) => IPVSServiceAttr::Netmask,
            Self::PersistenceEngine(_) => IPVSServiceAttr::PersistenceEngine,
        };
        attr.into()
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match self {
            Self::AddressFamily(v) | Self::Protocol(v) => buffer.copy_from_slice(&v.to_ne_bytes()),
            Self::Port(v) => buffer.copy_from_slice(&v.to_be_bytes()),
            Self::FirewallMark(v) | Self::Timeout(v) => buffer.copy_from_slice(&v.to_ne_bytes()),
            Self::Address(bytes) | Self::Netmask(bytes) => buffer.copy_from_slice(bytes),
            Self::Scheduler(s) | Self::PersistenceEngine(s) => {
                buffer[..s.len()].copy_from_slice(s.as_bytes());
                buffer[s.len()] = 0;
            }
            Self::Flags { flags, mask } => {
                buffer[..4].copy_from_slice(&flags.to_ne_bytes());
                buffer[4..8].copy_from_slice(&mask.to_ne_bytes());
            }
        }
    }
}

/// Destination-specific netlink attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestNla {
    AddressFamily(u16),
    /// Always the full 16-byte kernel address
    Address(Vec<u8>),
    /// Port number, sent big-endian
    Port(u16),
    ForwardingMethod(u32),
    Weight(u32),
    UpperThreshold(u32),
    LowerThreshold(u32),
    TunnelType(u8),
    /// Tunnel port, sent big-endian
    TunnelPort(u16),
    TunnelFlags(u16),
}

impl Nla for DestNla {
    fn value_len(&self) -> usize {
        match self {
            Self::TunnelType(_) => 1,
            Self::AddressFamily(_) | Self::Port(_) | Self::TunnelPort(_) | Self::TunnelFlags(_) => {
                2
            }
            Self::ForwardingMethod(_)
            | Self::Weight(_)
            | Self::UpperThreshold(_)
            | Self::LowerThreshold(_) => 4,
            Self::Address(bytes) => bytes.len(),
        }
    }

    fn kind(&self) -> u16 {
        let attr = match self {
            Self::AddressFamily(_) => IPVSDestAttr::AddressFamily,
            Self::Address(_) => IPVSDestAttr::Address,
            Self::Port(_) => IPVSDestAttr::Port,
            Self::ForwardingMethod(_) => IPVSDestAttr::ForwardingMethod,
            Self::Weight(_) => IPVSDestAttr::Weight,
            Self::UpperThreshold(_) => IPVSDestAttr::UpperThreshold,
            Self::LowerThreshold(_) => IPVSDestAttr::LowerThreshold,
            Self::TunnelType(_) => IPVSDestAttr::TunnelType,
            Self::TunnelPort(_) => IPVSDestAttr::TunnelPort,
            Self::TunnelFlags(_) => IPVSDestAttr::TunnelFlags,
        };
        attr.into()
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match self {
            Self::AddressFamily(v) | Self::TunnelFlags(v) => {
                buffer.copy_from_slice(&v.to_ne_bytes())
            }
            Self::Port(v) | Self::TunnelPort(v) => buffer.copy_from_slice(&v.to_be_bytes()),
            Self::ForwardingMethod(v)
            | Self::Weight(v)
            | Self::UpperThreshold(v)
            | Self::LowerThreshold(v) => buffer.copy_from_slice(&v.to_ne_bytes()),
            Self::TunnelType(v) => buffer[0] = *v,
            Self::Address(bytes) => buffer.copy_from_slice(bytes),
        }
    }
}

/// One generic netlink message: family id, genl header and attribute body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenlFrame {
    pub family_id: u16,
    pub cmd: u8,
    pub version: u8,
    pub body: Vec<u8>,
}

impl NetlinkSerializable for GenlFrame {
    fn message_type(&self) -> u16 {
        self.family_id
    }

    fn buffer_len(&self) -> usize {
        GENL_HDRLEN + self.body.len()
    }

    fn serialize(&self, buffer: &mut [u8]) {
        let mut genl = GenlBuffer::new(buffer);
        genl.set_cmd(self.cmd);
        genl.set_version(self.version);
        genl.payload_mut()[..self.body.len()].copy_from_slice(&self.body);
    }
}

impl NetlinkDeserializable for GenlFrame {
    type Error = Error;

    fn deserialize(header: &NetlinkHeader, payload: &[u8]) -> Result<Self> {
        let genl = GenlBuffer::new_checked(payload)
            .map_err(|e| Error::decode(format!("generic netlink header: {}", e)))?;
        Ok(Self {
            family_id: header.message_type,
            cmd: genl.cmd(),
            version: genl.version(),
            body: genl.payload().to_vec(),
        })
    }
}

impl From<GenlFrame> for NetlinkPayload<GenlFrame> {
    fn from(frame: GenlFrame) -> Self {
        NetlinkPayload::InnerMessage(frame)
    }
}

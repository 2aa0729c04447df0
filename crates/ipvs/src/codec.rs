//! Conversion between IPVS records and their netlink attribute encoding.
//!
//! Encoders build typed attribute lists; decoders walk raw attribute
//! buffers. Any decode failure rejects the whole message.

use common::{Error, Result};

use crate::addr::{Address, Netmask};
use crate::attr;
use crate::commands::{IPVSAttr, IPVSDestAttr, IPVSInfoAttr, IPVSServiceAttr, IPVSStatsAttr};
use crate::messages::{self, DestNla, ServiceNla};
use crate::types::{
    AddressFamily, Destination, DestinationExtended, ForwardMethod, IPVSVersion, Info, Protocol,
    Scheduler, Service, ServiceExtended, ServiceFlags, ServiceId, Stats, TunnelFlags, TunnelType,
};

/// All flag bits replaced on update.
const FLAGS_MASK: u32 = u32::MAX;

/// Build the nested attributes describing `service`.
pub fn service_nlas(service: &Service) -> Result<Vec<ServiceNla>> {
    let scheduler = service.scheduler.name();
    if scheduler.contains('\0') {
        return Err(Error::encode(format!(
            "scheduler name {:?} contains NUL",
            scheduler
        )));
    }
    match (service.family, service.netmask) {
        (AddressFamily::Inet, Netmask::V6(_)) | (AddressFamily::Inet6, Netmask::V4(_)) => {
            return Err(Error::encode(format!(
                "netmask {} does not match family {}",
                service.netmask, service.family
            )));
        }
        _ => {}
    }

    let mut nlas = vec![
        ServiceNla::AddressFamily(service.family.into()),
        ServiceNla::Scheduler(scheduler.to_string()),
        ServiceNla::Flags {
            flags: service.flags.0,
            mask: FLAGS_MASK,
        },
        ServiceNla::Timeout(service.timeout),
    ];
    if service.netmask.is_valid() {
        nlas.push(ServiceNla::Netmask(service.netmask.to_wire()));
    }
    if let Some(engine) = &service.persistence_engine {
        if engine.contains('\0') {
            return Err(Error::encode(format!(
                "persistence engine {:?} contains NUL",
                engine
            )));
        }
        nlas.push(ServiceNla::PersistenceEngine(engine.clone()));
    }

    if service.id.is_empty() {
        return Err(Error::encode("service has neither a firewall mark nor an address"));
    }
    match service.id {
        ServiceId::ByFwmark(0) => return Err(Error::encode("firewall mark must be non-zero")),
        ServiceId::ByFwmark(mark) => nlas.push(ServiceNla::FirewallMark(mark)),
        ServiceId::ByAddress {
            protocol,
            address,
            port,
        } => {
            nlas.push(ServiceNla::Protocol(protocol.into()));
            nlas.push(ServiceNla::Address(address.to_bytes(service.family).to_vec()));
            nlas.push(ServiceNla::Port(port));
        }
    }
    Ok(nlas)
}

/// Encode `service` as the contents of a service container.
pub fn encode_service(service: &Service) -> Result<Vec<u8>> {
    messages::encode_nlas(&service_nlas(service)?)
}

/// Build the nested attributes describing `dest`.
///
/// Tunnel parameters are always included, zero-valued unless set.
pub fn destination_nlas(dest: &Destination) -> Vec<DestNla> {
    vec![
        DestNla::AddressFamily(dest.family.into()),
        DestNla::Address(dest.address.as_bytes().to_vec()),
        DestNla::Port(dest.port),
        DestNla::ForwardingMethod(dest.forward_method.into()),
        DestNla::Weight(dest.weight),
        DestNla::UpperThreshold(dest.upper_threshold),
        DestNla::LowerThreshold(dest.lower_threshold),
        DestNla::TunnelType(dest.tunnel_type.into()),
        DestNla::TunnelPort(dest.tunnel_port),
        DestNla::TunnelFlags(dest.tunnel_flags.0),
    ]
}

/// Encode `dest` as the contents of a destination container.
pub fn encode_destination(dest: &Destination) -> Result<Vec<u8>> {
    messages::encode_nlas(&destination_nlas(dest))
}

/// Decode the contents of a service container.
pub fn decode_service(buf: &[u8]) -> Result<ServiceExtended> {
    let mut family = AddressFamily::Unspecified;
    let mut protocol = Protocol::Other(0);
    let mut port = 0;
    let mut fwmark = 0;
    let mut scheduler = Scheduler::Other(String::new());
    let mut timeout = 0;
    let mut persistence_engine = None;
    let mut stats = Stats::default();
    let mut stats64 = Stats::default();
    // Finalised once every attribute has been seen.
    let mut address: Option<Vec<u8>> = None;
    let mut flags: Option<Vec<u8>> = None;
    let mut netmask: Option<Vec<u8>> = None;

    attr::for_each(buf, |kind, payload| {
        match kind {
            k if k == u16::from(IPVSServiceAttr::AddressFamily) => {
                family = attr::u16_value(payload, "service family")?.into();
            }
            k if k == u16::from(IPVSServiceAttr::Protocol) => {
                protocol = attr::u16_value(payload, "service protocol")?.into();
            }
            k if k == u16::from(IPVSServiceAttr::Address) => address = Some(payload.to_vec()),
            k if k == u16::from(IPVSServiceAttr::Port) => port = attr::port(payload)?,
            k if k == u16::from(IPVSServiceAttr::FirewallMark) => {
                fwmark = attr::u32_value(payload, "firewall mark")?;
            }
            k if k == u16::from(IPVSServiceAttr::Scheduler) => {
                scheduler = Scheduler::from(attr::c_string(payload, "scheduler")?.as_str());
            }
            k if k == u16::from(IPVSServiceAttr::Flags) => flags = Some(payload.to_vec()),
            k if k == u16::from(IPVSServiceAttr::Timeout) => {
                timeout = attr::u32_value(payload, "timeout")?;
            }
            k if k == u16::from(IPVSServiceAttr::Netmask) => netmask = Some(payload.to_vec()),
            k if k == u16::from(IPVSServiceAttr::PersistenceEngine) => {
                persistence_engine = Some(attr::c_string(payload, "persistence engine")?);
            }
            k if k == u16::from(IPVSServiceAttr::Stats) => stats = decode_stats(payload, false)?,
            k if k == u16::from(IPVSServiceAttr::Stats64) => stats64 = decode_stats(payload, true)?,
            _ => {}
        }
        Ok(())
    })?;

    let flags = match flags.as_deref() {
        Some([a, b, c, d, _, _, _, _]) => ServiceFlags(u32::from_ne_bytes([*a, *b, *c, *d])),
        Some(other) => {
            return Err(Error::decode(format!(
                "service flags must be 8 bytes, got {}",
                other.len()
            )));
        }
        None => return Err(Error::decode("service flags missing")),
    };

    let id = if fwmark != 0 {
        ServiceId::ByFwmark(fwmark)
    } else {
        let address = match address.as_deref() {
            Some(raw) => Address::from_raw(raw).ok_or_else(|| {
                Error::decode(format!("service address too long: {} bytes", raw.len()))
            })?,
            None => Address::default(),
        };
        let address = address.for_family(family);
        ServiceId::ByAddress {
            protocol,
            address,
            port,
        }
    };

    let netmask = match netmask.as_deref() {
        Some(raw) => decode_netmask(raw, family)?,
        None => Netmask::Invalid,
    };

    Ok(ServiceExtended {
        service: Service {
            id,
            family,
            netmask,
            scheduler,
            timeout,
            flags,
            persistence_engine,
        },
        stats,
        stats64,
    })
}

/// Interpret a netmask payload according to the service family.
fn decode_netmask(raw: &[u8], family: AddressFamily) -> Result<Netmask> {
    let invalid = || {
        Error::decode(format!(
            "netmask of {} bytes invalid for {}",
            raw.len(),
            family
        ))
    };
    let prefix = |ones: u32| {
        u8::try_from(ones)
            .ok()
            .and_then(Netmask::from_v6_prefix)
            .ok_or_else(|| Error::decode(format!("IPv6 prefix length {}", ones)))
    };
    let contiguous = |raw: &[u8]| match Netmask::from_bytes(raw) {
        Netmask::V6(ones) => Ok(Netmask::V6(ones)),
        _ => Err(Error::decode("IPv6 netmask is not a contiguous prefix")),
    };

    match (family, raw) {
        (AddressFamily::Inet, [a, b, c, d]) => Ok(Netmask::V4([*a, *b, *c, *d])),
        (AddressFamily::Inet, _) => Err(invalid()),
        (AddressFamily::Inet6, [ones]) => prefix(u32::from(*ones)),
        // The kernel reports IPv6 prefixes as a host-order u32.
        (AddressFamily::Inet6, [a, b, c, d]) => prefix(u32::from_ne_bytes([*a, *b, *c, *d])),
        (AddressFamily::Inet6, raw) if raw.len() == 16 => contiguous(raw),
        (AddressFamily::Inet6, _) => Err(invalid()),
        (_, [a, b, c, d]) => Ok(Netmask::V4([*a, *b, *c, *d])),
        (_, [ones]) => prefix(u32::from(*ones)),
        (_, raw) if raw.len() == 16 => contiguous(raw),
        _ => Err(invalid()),
    }
}

/// Decode the contents of a destination container.
pub fn decode_destination(buf: &[u8]) -> Result<DestinationExtended> {
    let mut out = DestinationExtended::default();
    let dest = &mut out.destination;

    attr::for_each(buf, |kind, payload| {
        match kind {
            k if k == u16::from(IPVSDestAttr::Address) => {
                dest.address = Address::from_raw(payload).ok_or_else(|| {
                    Error::decode(format!(
                        "destination address too long: {} bytes",
                        payload.len()
                    ))
                })?;
            }
            k if k == u16::from(IPVSDestAttr::Port) => dest.port = attr::port(payload)?,
            k if k == u16::from(IPVSDestAttr::ForwardingMethod) => {
                dest.forward_method =
                    ForwardMethod::from(attr::u32_value(payload, "forward method")?);
            }
            k if k == u16::from(IPVSDestAttr::Weight) => {
                dest.weight = attr::u32_value(payload, "weight")?;
            }
            k if k == u16::from(IPVSDestAttr::UpperThreshold) => {
                dest.upper_threshold = attr::u32_value(payload, "upper threshold")?;
            }
            k if k == u16::from(IPVSDestAttr::LowerThreshold) => {
                dest.lower_threshold = attr::u32_value(payload, "lower threshold")?;
            }
            k if k == u16::from(IPVSDestAttr::ActiveConns) => {
                out.active_connections = attr::u32_value(payload, "active connections")?;
            }
            k if k == u16::from(IPVSDestAttr::InactiveConns) => {
                out.inactive_connections = attr::u32_value(payload, "inactive connections")?;
            }
            k if k == u16::from(IPVSDestAttr::PersistConns) => {
                out.persistent_connections = attr::u32_value(payload, "persistent connections")?;
            }
            k if k == u16::from(IPVSDestAttr::Stats) => out.stats = decode_stats(payload, false)?,
            k if k == u16::from(IPVSDestAttr::AddressFamily) => {
                dest.family = attr::u16_value(payload, "destination family")?.into();
            }
            k if k == u16::from(IPVSDestAttr::Stats64) => out.stats64 = decode_stats(payload, true)?,
            k if k == u16::from(IPVSDestAttr::TunnelType) => {
                dest.tunnel_type = TunnelType::from(attr::u8_value(payload, "tunnel type")?);
            }
            k if k == u16::from(IPVSDestAttr::TunnelPort) => {
                dest.tunnel_port = attr::port(payload)?;
            }
            k if k == u16::from(IPVSDestAttr::TunnelFlags) => {
                dest.tunnel_flags = TunnelFlags(attr::u16_value(payload, "tunnel flags")?);
            }
            _ => {}
        }
        Ok(())
    })?;

    let dest = &mut out.destination;
    dest.address = dest.address.for_family(dest.family);
    Ok(out)
}

/// Decode a statistics container.
///
/// In the 32-bit group only the byte counters are 64 bits wide.
pub fn decode_stats(buf: &[u8], wide: bool) -> Result<Stats> {
    let mut stats = Stats::default();
    let counter = |payload: &[u8], what: &str| {
        if wide {
            attr::u64_value(payload, what)
        } else {
            attr::u32_value(payload, what).map(u64::from)
        }
    };

    attr::for_each(buf, |kind, payload| {
        match kind {
            k if k == u16::from(IPVSStatsAttr::Connections) => {
                stats.connections = counter(payload, "connections")?;
            }
            k if k == u16::from(IPVSStatsAttr::PacketsIn) => {
                stats.packets_in = counter(payload, "incoming packets")?;
            }
            k if k == u16::from(IPVSStatsAttr::PacketsOut) => {
                stats.packets_out = counter(payload, "outgoing packets")?;
            }
            k if k == u16::from(IPVSStatsAttr::BytesIn) => {
                stats.bytes_in = attr::u64_value(payload, "incoming bytes")?;
            }
            k if k == u16::from(IPVSStatsAttr::BytesOut) => {
                stats.bytes_out = attr::u64_value(payload, "outgoing bytes")?;
            }
            k if k == u16::from(IPVSStatsAttr::CPS) => stats.cps = counter(payload, "cps")?,
            k if k == u16::from(IPVSStatsAttr::PPSIn) => {
                stats.pps_in = counter(payload, "incoming pps")?;
            }
            k if k == u16::from(IPVSStatsAttr::PPSOut) => {
                stats.pps_out = counter(payload, "outgoing pps")?;
            }
            k if k == u16::from(IPVSStatsAttr::BPSIn) => {
                stats.bps_in = counter(payload, "incoming bps")?;
            }
            k if k == u16::from(IPVSStatsAttr::BPSOut) => {
                stats.bps_out = counter(payload, "outgoing bps")?;
            }
            _ => {}
        }
        Ok(())
    })?;

    Ok(stats)
}

/// Decode a GET_INFO reply body.
pub fn decode_info(body: &[u8]) -> Result<Info> {
    let mut info = Info::default();
    attr::for_each(body, |kind, payload| {
        match kind {
            k if k == u16::from(IPVSInfoAttr::Version) => {
                info.version = IPVSVersion::from_packed(attr::u32_value(payload, "version")?);
            }
            k if k == u16::from(IPVSInfoAttr::ConnTableSize) => {
                info.connection_table_size = attr::u32_value(payload, "connection table size")?;
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok(info)
}

/// Payload of the last top-level attribute of `kind`, if any.
fn last_container(body: &[u8], kind: IPVSAttr) -> Result<Option<Vec<u8>>> {
    let wanted = u16::from(kind);
    let mut found = None;
    attr::for_each(body, |kind, payload| {
        if kind == wanted {
            found = Some(payload.to_vec());
        }
        Ok(())
    })?;
    Ok(found)
}

/// Decode one GET_SERVICE reply body.
pub fn decode_service_message(body: &[u8]) -> Result<ServiceExtended> {
    let container = last_container(body, IPVSAttr::Service)?
        .ok_or_else(|| Error::decode("message carries no service attribute"))?;
    decode_service(&container)
}

/// Decode one GET_DEST reply body.
pub fn decode_destination_message(body: &[u8]) -> Result<DestinationExtended> {
    let container = last_container(body, IPVSAttr::Dest)?
        .ok_or_else(|| Error::decode("message carries no destination attribute"))?;
    decode_destination(&container)
}

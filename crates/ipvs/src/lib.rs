//! Rust implementation of IPVS (IP Virtual Server) management via netlink.
//!
//! This crate talks to the Linux IPVS module through its generic netlink
//! family: it lists, creates, updates and removes virtual services and their
//! destinations, and reads traffic statistics, without shelling out to
//! `ipvsadm`.
//!
//! The attribute codec in [`codec`] is independent of any socket. The
//! [`Transport`] trait is the only seam between [`IPVSManager`] and the
//! kernel; [`NetlinkTransport`] is the production implementation.
//!
//! # Example
//!
//! ```no_run
//! use ipvs::{IPVSManager, Protocol, Scheduler, Service};
//! use std::net::Ipv4Addr;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = IPVSManager::new()?;
//!
//! // Get IPVS version
//! let info = manager.info()?;
//! println!("IPVS version: {}", info.version);
//!
//! let web = Service::new(Protocol::TCP, Ipv4Addr::new(10, 0, 0, 1).into(), 80)
//!     .scheduler(Scheduler::RoundRobin);
//! manager.create_service(&web)?;
//!
//! // List all services
//! for service in manager.services()? {
//!     println!("Service: {}", service.service);
//! }
//! # Ok(())
//! # }
//! ```

mod addr;
mod attr;
mod client;
pub mod codec;
pub mod commands;
mod config;
pub mod messages;
mod netlink;
mod transport;
mod types;

pub use addr::{Address, Netmask, NetmaskError};
pub use client::IPVSManager;
pub use common::{Error, Result};
pub use config::ClientConfig;
pub use netlink::NetlinkTransport;
pub use transport::{Reply, Request, Transport};
pub use types::{
    AddressFamily, Destination, DestinationExtended, ForwardMethod, IPVSVersion, Info, Protocol,
    Scheduler, Service, ServiceExtended, ServiceFlags, ServiceId, Stats, TunnelFlags, TunnelType,
};

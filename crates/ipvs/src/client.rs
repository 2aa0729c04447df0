//! IPVS command client.

use common::{Error, Result};
use tracing::{debug, trace};

use crate::codec;
use crate::commands::IPVSCommand;
use crate::config::ClientConfig;
use crate::messages::{IPVSMessage, IPVSNla};
use crate::netlink::NetlinkTransport;
use crate::transport::{Reply, Request, Transport};
use crate::types::{
    AddressFamily, Destination, DestinationExtended, IPVSVersion, Info, Service, ServiceExtended,
};

/// IPVS Manager - main interface for IPVS operations.
///
/// Every call sends one request and waits for its complete reply. Calls on
/// one manager are serialised by `&mut self`; open several managers for
/// concurrent use.
pub struct IPVSManager<T: Transport = NetlinkTransport> {
    transport: T,
}

impl IPVSManager<NetlinkTransport> {
    /// Create a new IPVS manager instance.
    ///
    /// This opens a netlink socket and resolves the IPVS generic netlink family.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The netlink socket cannot be created
    /// - The IPVS kernel module is not loaded
    /// - Insufficient permissions (requires CAP_NET_ADMIN)
    pub fn new() -> Result<Self> {
        Self::with_config(&ClientConfig::default())
    }

    /// Create a manager using an explicit configuration.
    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(NetlinkTransport::with_config(config)?))
    }

    /// Get the IPVS family ID.
    pub fn family_id(&self) -> u16 {
        self.transport.family_id()
    }
}

impl<T: Transport> IPVSManager<T> {
    /// Wrap an already connected transport.
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the IPVS module version and connection table size.
    pub fn info(&mut self) -> Result<Info> {
        let body = self.one(IPVSMessage::new(IPVSCommand::GetInfo), "IPVS info")?;
        let info = codec::decode_info(&body)?;
        debug!(
            "IPVS version {}, connection table size {}",
            info.version, info.connection_table_size
        );
        Ok(info)
    }

    /// Get the IPVS version from the kernel.
    pub fn version(&mut self) -> Result<IPVSVersion> {
        Ok(self.info()?.version)
    }

    /// Get all services from IPVS.
    pub fn services(&mut self) -> Result<Vec<ServiceExtended>> {
        let bodies = self.dump(IPVSMessage::new(IPVSCommand::GetService), "services")?;
        let services = bodies
            .iter()
            .map(|body| codec::decode_service_message(body))
            .collect::<Result<Vec<_>>>()?;
        debug!("Fetched {} services", services.len());
        Ok(services)
    }

    /// Get a specific service by its identity.
    pub fn service(&mut self, service: &Service) -> Result<ServiceExtended> {
        let msg = service_message(IPVSCommand::GetService, service)?;
        let body = self.one(msg, &format!("service {}", service))?;
        codec::decode_service_message(&body)
    }

    /// Add a new service to IPVS.
    pub fn create_service(&mut self, service: &Service) -> Result<()> {
        self.ack(service_message(IPVSCommand::NewService, service)?)?;
        debug!("Created service {}", service);
        Ok(())
    }

    /// Update an existing service in IPVS.
    pub fn update_service(&mut self, service: &Service) -> Result<()> {
        self.ack(service_message(IPVSCommand::SetService, service)?)?;
        debug!("Updated service {}", service);
        Ok(())
    }

    /// Delete a service and all of its destinations.
    pub fn remove_service(&mut self, service: &Service) -> Result<()> {
        self.ack(service_message(IPVSCommand::DelService, service)?)?;
        debug!("Removed service {}", service);
        Ok(())
    }

    /// Get all destinations of a service.
    ///
    /// Destinations reported without an address family take the service's.
    pub fn destinations(&mut self, service: &Service) -> Result<Vec<DestinationExtended>> {
        let msg = service_message(IPVSCommand::GetDest, service)?;
        let bodies = self.dump(msg, &format!("destinations of {}", service))?;
        let destinations = bodies
            .iter()
            .map(|body| -> Result<DestinationExtended> {
                let mut dest = codec::decode_destination_message(body)?;
                let inner = &mut dest.destination;
                if inner.family == AddressFamily::Unspecified {
                    inner.family = service.family;
                    inner.address = inner.address.for_family(service.family);
                }
                Ok(dest)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Fetched {} destinations for {}", destinations.len(), service);
        Ok(destinations)
    }

    /// Add a destination to a service.
    pub fn create_destination(&mut self, service: &Service, dest: &Destination) -> Result<()> {
        self.ack(destination_message(IPVSCommand::NewDest, service, dest)?)?;
        debug!("Created destination {} for {}", dest, service);
        Ok(())
    }

    /// Update a destination in a service.
    pub fn update_destination(&mut self, service: &Service, dest: &Destination) -> Result<()> {
        self.ack(destination_message(IPVSCommand::SetDest, service, dest)?)?;
        debug!("Updated destination {} for {}", dest, service);
        Ok(())
    }

    /// Delete a destination from a service.
    pub fn remove_destination(&mut self, service: &Service, dest: &Destination) -> Result<()> {
        self.ack(destination_message(IPVSCommand::DelDest, service, dest)?)?;
        debug!("Removed destination {} from {}", dest, service);
        Ok(())
    }

    fn execute(&mut self, msg: IPVSMessage, reply: Reply) -> Result<Vec<Vec<u8>>> {
        let request = Request::new(msg.cmd, reply, msg.to_bytes()?);
        trace!("IPVS request {:?} ({:?}, {} bytes)", request.command, reply, request.payload.len());
        let bodies = self.transport.execute(request)?;
        trace!("IPVS reply: {} messages", bodies.len());
        Ok(bodies)
    }

    fn one(&mut self, msg: IPVSMessage, what: &str) -> Result<Vec<u8>> {
        self.execute(msg, Reply::One)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(what))
    }

    fn dump(&mut self, msg: IPVSMessage, what: &str) -> Result<Vec<Vec<u8>>> {
        let bodies = self.execute(msg, Reply::Dump)?;
        if bodies.is_empty() {
            return Err(Error::not_found(what));
        }
        Ok(bodies)
    }

    fn ack(&mut self, msg: IPVSMessage) -> Result<()> {
        let cmd = msg.cmd;
        if self.execute(msg, Reply::Ack)?.is_empty() {
            return Err(Error::invalid_response(format!("{:?} was not acknowledged", cmd)));
        }
        Ok(())
    }
}

fn service_message(cmd: IPVSCommand, service: &Service) -> Result<IPVSMessage> {
    Ok(IPVSMessage::with_nlas(
        cmd,
        vec![IPVSNla::Service(codec::service_nlas(service)?)],
    ))
}

fn destination_message(cmd: IPVSCommand, service: &Service, dest: &Destination) -> Result<IPVSMessage> {
    Ok(IPVSMessage::with_nlas(
        cmd,
        vec![
            IPVSNla::Service(codec::service_nlas(service)?),
            IPVSNla::Dest(codec::destination_nlas(dest)),
        ],
    ))
}

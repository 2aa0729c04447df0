//! Netlink communication layer for IPVS.
//!
//! [`NetlinkTransport`] speaks generic netlink to the kernel IPVS module over
//! a `NETLINK_GENERIC` socket.

use std::fmt;
use std::io;

use bytes::BytesMut;
use common::{Error, Result};
use netlink_packet_core::{
    NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NetlinkDeserializable, NetlinkMessage, NetlinkPayload,
    NetlinkSerializable,
};
use netlink_packet_generic::{
    GenlMessage,
    ctrl::{GenlCtrl, GenlCtrlCmd, nlas::GenlCtrlAttrs},
};
use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_GENERIC};
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::messages::GenlFrame;
use crate::transport::{Reply, Request, Transport};

/// Netlink socket bound to the IPVS generic netlink family.
pub struct NetlinkTransport {
    socket: Socket,
    family_id: u16,
    version: u8,
    sequence: u32,
}

impl NetlinkTransport {
    /// Open a socket and resolve the default IPVS family.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be created, the IPVS module is not loaded,
    /// or the process lacks CAP_NET_ADMIN.
    pub fn new() -> Result<Self> {
        Self::with_config(&ClientConfig::default())
    }

    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        debug!("Creating netlink socket for {}", config.family_name);

        let mut socket = Socket::new(NETLINK_GENERIC)?;
        socket.bind_auto()?;
        socket.connect(&SocketAddr::new(0, 0))?;

        let mut transport = Self {
            socket,
            family_id: 0,
            version: config.genl_version,
            sequence: 0,
        };
        transport.family_id = transport.resolve_family_id(&config.family_name)?;
        debug!("{} family ID: {}", config.family_name, transport.family_id);

        Ok(transport)
    }

    /// Get the resolved family ID.
    pub fn family_id(&self) -> u16 {
        self.family_id
    }

    fn next_sequence(&mut self) -> u32 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    /// Resolve a generic netlink family name to its ID.
    fn resolve_family_id(&mut self, family_name: &str) -> Result<u16> {
        debug!("Resolving generic netlink family: {}", family_name);

        let mut genlmsg: GenlMessage<GenlCtrl> = GenlMessage::from_payload(GenlCtrl {
            cmd: GenlCtrlCmd::GetFamily,
            nlas: vec![GenlCtrlAttrs::FamilyName(family_name.to_string())],
        });
        genlmsg.set_resolved_family_id(libc::GENL_ID_CTRL as u16);

        let sequence = self.send(NetlinkMessage::from(genlmsg), NLM_F_REQUEST)?;
        loop {
            for payload in self.receive::<GenlMessage<GenlCtrl>>(sequence)? {
                match payload {
                    NetlinkPayload::InnerMessage(genlmsg) => {
                        return genlmsg
                            .payload
                            .nlas
                            .iter()
                            .find_map(|nla| match nla {
                                GenlCtrlAttrs::FamilyId(id) => Some(*id),
                                _ => None,
                            })
                            .ok_or_else(|| {
                                Error::netlink(format!(
                                    "Family ID not found in response for {}",
                                    family_name
                                ))
                            });
                    }
                    NetlinkPayload::Error(err) => {
                        if let Some(code) = err.code {
                            return Err(errno(code.get()));
                        }
                    }
                    other => trace!("Ignoring netlink payload: {:?}", other),
                }
            }
        }
    }

    /// Frame and send a message, returning its sequence number.
    fn send<T>(&mut self, mut message: NetlinkMessage<T>, flags: u16) -> Result<u32>
    where
        T: NetlinkSerializable + fmt::Debug,
    {
        let sequence = self.next_sequence();
        message.header.flags = flags;
        message.header.sequence_number = sequence;
        message.finalize();

        let mut buf = BytesMut::zeroed(message.buffer_len());
        message.serialize(&mut buf[..]);
        trace!("Sending netlink message: {:?}", message);

        self.socket.send(&buf[..], 0)?;
        Ok(sequence)
    }

    /// Read one datagram and return the payloads answering `sequence`.
    fn receive<T>(&self, sequence: u32) -> Result<Vec<NetlinkPayload<T>>>
    where
        T: NetlinkDeserializable + fmt::Debug,
    {
        let (buf, _) = self.socket.recv_from_full()?;

        let mut payloads = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            let message = NetlinkMessage::<T>::deserialize(&buf[offset..])
                .map_err(|e| Error::netlink(format!("Failed to parse netlink message: {}", e)))?;
            let len = message.header.length as usize;
            if len == 0 {
                return Err(Error::netlink("Zero-length netlink message"));
            }
            offset += (len + 3) & !3;

            if message.header.sequence_number != sequence {
                trace!(
                    "Skipping netlink message with sequence {} (want {})",
                    message.header.sequence_number, sequence
                );
                continue;
            }
            trace!("Received netlink message: {:?}", message);
            payloads.push(message.payload);
        }
        Ok(payloads)
    }
}

impl Transport for NetlinkTransport {
    fn execute(&mut self, request: Request) -> Result<Vec<Vec<u8>>> {
        let reply = request.reply;
        let frame = GenlFrame {
            family_id: self.family_id,
            cmd: request.command.into(),
            version: self.version,
            body: request.payload,
        };
        let sequence = self.send(NetlinkMessage::from(frame), request_flags(reply))?;

        let mut bodies = Vec::new();
        loop {
            for payload in self.receive::<GenlFrame>(sequence)? {
                match payload {
                    NetlinkPayload::InnerMessage(frame) => {
                        bodies.push(frame.body);
                        if reply == Reply::One {
                            return Ok(bodies);
                        }
                    }
                    NetlinkPayload::Done(_) => return Ok(bodies),
                    NetlinkPayload::Error(err) => match err.code {
                        Some(code) => return Err(errno(code.get())),
                        None if reply == Reply::Ack => return Ok(vec![Vec::new()]),
                        None => return Ok(bodies),
                    },
                    NetlinkPayload::Overrun(_) => {
                        return Err(Error::netlink("Netlink receive buffer overrun"));
                    }
                    other => trace!("Ignoring netlink payload: {:?}", other),
                }
            }
        }
    }
}

impl Drop for NetlinkTransport {
    fn drop(&mut self) {
        // Socket will be closed automatically
        trace!("Closing netlink socket");
    }
}

/// Netlink flags for a request expecting `reply`.
fn request_flags(reply: Reply) -> u16 {
    match reply {
        Reply::One => NLM_F_REQUEST,
        Reply::Dump => NLM_F_REQUEST | NLM_F_DUMP,
        Reply::Ack => NLM_F_REQUEST | NLM_F_ACK,
    }
}

/// Kernel error codes arrive negated.
fn errno(code: i32) -> Error {
    Error::Io(io::Error::from_raw_os_error(code.saturating_abs()))
}

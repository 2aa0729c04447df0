//! Request/response seam between the command client and the kernel.

use common::Result;

use crate::commands::IPVSCommand;

/// How many messages a request expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Exactly one message.
    One,
    /// Zero or more messages, terminated by the transport.
    Dump,
    /// An acknowledgement with no payload.
    Ack,
}

/// A single IPVS request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: IPVSCommand,
    pub reply: Reply,
    /// Encoded attributes following the generic netlink header.
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new(command: IPVSCommand, reply: Reply, payload: Vec<u8>) -> Self {
        Self {
            command,
            reply,
            payload,
        }
    }
}

/// Carries encoded IPVS requests to the kernel.
///
/// Each returned element is one message body with the generic netlink
/// header stripped. An acknowledgement comes back as a single empty body;
/// kernel errors surface as [`common::Error::Io`].
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn execute(&mut self, request: Request) -> Result<Vec<Vec<u8>>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&mut self, request: Request) -> Result<Vec<Vec<u8>>> {
        (**self).execute(request)
    }
}

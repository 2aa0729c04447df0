//! Client behaviour against a scripted in-memory transport.
//!
//! The fake answers each request from a queue of canned replies and keeps
//! every request it saw, so these tests run without privileges.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipvs::codec;
use ipvs::commands::IPVSCommand;
use ipvs::messages::{IPVSMessage, IPVSNla};
use ipvs::{
    AddressFamily, Destination, Error, ForwardMethod, IPVSManager, Netmask, Protocol, Reply,
    Request, Result, Scheduler, Service, ServiceFlags, ServiceId, Transport,
};

#[derive(Default)]
struct ScriptedTransport {
    replies: VecDeque<Result<Vec<Vec<u8>>>>,
    requests: Vec<Request>,
}

impl ScriptedTransport {
    fn reply(mut self, bodies: Vec<Vec<u8>>) -> Self {
        self.replies.push_back(Ok(bodies));
        self
    }

    fn ack(self) -> Self {
        self.reply(vec![Vec::new()])
    }

    fn fail(mut self, errno: i32) -> Self {
        self.replies
            .push_back(Err(Error::Io(std::io::Error::from_raw_os_error(errno))));
        self
    }

    fn commands(&self) -> Vec<IPVSCommand> {
        self.requests.iter().map(|r| r.command).collect()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&mut self, request: Request) -> Result<Vec<Vec<u8>>> {
        self.requests.push(request);
        self.replies
            .pop_front()
            .unwrap_or_else(|| Err(Error::netlink("no scripted reply left")))
    }
}

fn service_body(service: &Service) -> Vec<u8> {
    IPVSMessage::with_nlas(
        IPVSCommand::NewService,
        vec![IPVSNla::Service(codec::service_nlas(service).unwrap())],
    )
    .to_bytes()
    .unwrap()
}

fn dest_body(dest: &Destination) -> Vec<u8> {
    IPVSMessage::with_nlas(
        IPVSCommand::NewDest,
        vec![IPVSNla::Dest(codec::destination_nlas(dest))],
    )
    .to_bytes()
    .unwrap()
}

fn web() -> Service {
    Service::new(Protocol::TCP, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 80)
        .scheduler(Scheduler::RoundRobin)
}

#[test]
fn test_empty_service_dump_is_not_found() {
    let mut manager = IPVSManager::with_transport(ScriptedTransport::default().reply(vec![]));
    let err = manager.services().unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert_eq!(manager.transport().requests[0].reply, Reply::Dump);
}

#[test]
fn test_services_decoded_in_order() {
    let dns = Service::new(Protocol::UDP, IpAddr::V6(Ipv6Addr::LOCALHOST), 53)
        .scheduler(Scheduler::SourceHashing);
    let marked = Service::with_fwmark(7, AddressFamily::Inet);

    let transport = ScriptedTransport::default().reply(vec![
        service_body(&web()),
        service_body(&dns),
        service_body(&marked),
    ]);
    let mut manager = IPVSManager::with_transport(transport);
    let services = manager.services().unwrap();

    assert_eq!(services.len(), 3);
    assert_eq!(services[0].service.id, web().id);
    assert_eq!(services[0].service.scheduler, Scheduler::RoundRobin);
    assert_eq!(services[1].service.ip(), Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    assert_eq!(services[1].service.family, AddressFamily::Inet6);
    assert_eq!(services[2].service.id, ServiceId::ByFwmark(7));
    assert_eq!(services[2].service.ip(), None);
}

#[test]
fn test_service_lookup_sends_identity() {
    let transport = ScriptedTransport::default().reply(vec![service_body(&web())]);
    let mut manager = IPVSManager::with_transport(transport);
    let found = manager.service(&web()).unwrap();
    assert_eq!(found.service.id, web().id);

    let request = &manager.transport().requests[0];
    assert_eq!(request.command, IPVSCommand::GetService);
    assert_eq!(request.reply, Reply::One);
    assert_eq!(request.payload, service_body(&web()));
}

#[test]
fn test_service_lifecycle() {
    let backend = Destination {
        forward_method: ForwardMethod::Tunnel,
        weight: 5,
        ..Destination::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), 8080)
    };
    let mut updated = web();
    updated.scheduler = Scheduler::WeightedRoundRobin;
    updated.flags = ServiceFlags(ServiceFlags::PERSISTENT);
    updated.timeout = 300;
    updated.netmask = Netmask::from_v4([255, 255, 255, 0]);

    let transport = ScriptedTransport::default()
        .ack()
        .ack()
        .ack()
        .reply(vec![dest_body(&backend)])
        .ack()
        .ack();
    let mut manager = IPVSManager::with_transport(transport);

    manager.create_service(&web()).unwrap();
    manager.update_service(&updated).unwrap();
    manager.create_destination(&updated, &backend).unwrap();
    let dests = manager.destinations(&updated).unwrap();
    manager.remove_destination(&updated, &backend).unwrap();
    manager.remove_service(&updated).unwrap();

    assert_eq!(dests.len(), 1);
    assert_eq!(dests[0].destination, backend);
    assert_eq!(
        manager.transport().commands(),
        vec![
            IPVSCommand::NewService,
            IPVSCommand::SetService,
            IPVSCommand::NewDest,
            IPVSCommand::GetDest,
            IPVSCommand::DelDest,
            IPVSCommand::DelService,
        ]
    );
    assert!(manager
        .transport()
        .requests
        .iter()
        .filter(|r| r.command != IPVSCommand::GetDest)
        .all(|r| r.reply == Reply::Ack));
}

#[test]
fn test_kernel_error_surfaces_as_io() {
    let transport = ScriptedTransport::default().fail(libc_esrch());
    let mut manager = IPVSManager::with_transport(transport);
    match manager.remove_service(&web()).unwrap_err() {
        Error::Io(err) => assert_eq!(err.raw_os_error(), Some(libc_esrch())),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_corrupt_reply_is_decode_error() {
    let mut body = service_body(&web());
    body.truncate(body.len() - 3);
    let transport = ScriptedTransport::default().reply(vec![body]);
    let mut manager = IPVSManager::with_transport(transport);
    let err = manager.services().unwrap_err();
    assert!(err.is_decode(), "{err}");
}

#[test]
fn test_invalid_service_never_reaches_transport() {
    let bad = web().scheduler(Scheduler::Other("r\0r".into()));
    let mut manager = IPVSManager::with_transport(ScriptedTransport::default());
    let err = manager.create_service(&bad).unwrap_err();
    assert!(matches!(err, Error::Encode(_)), "{err}");
    assert!(manager.transport().requests.is_empty());
}

#[test]
fn test_boxed_transport() {
    let transport: Box<dyn Transport> = Box::new(ScriptedTransport::default().ack());
    let mut manager = IPVSManager::with_transport(transport);
    manager.create_service(&web()).unwrap();
}

// ESRCH, the kernel's answer for an unknown service.
fn libc_esrch() -> i32 {
    3
}

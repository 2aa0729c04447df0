//! Integration tests for IPVS operations.
//!
//! These tests require:
//! - Root privileges (CAP_NET_ADMIN)
//! - IPVS kernel module loaded (modprobe ip_vs)
//! - Set IPVS_TEST_ENABLED=1 environment variable to run
//! - Optionally IPVS_LOG_FORMAT=json and RUST_LOG=ipvs=trace for wire traces
//!
//! Run with: sudo -E cargo test --test integration_test -- --nocapture --test-threads=1

use ipvs::{
    AddressFamily, Destination, ForwardMethod, IPVSManager, Netmask, Protocol, Scheduler, Service,
    ServiceFlags, ServiceId, TunnelFlags, TunnelType,
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Helper to check if tests should run
fn should_run_tests() -> bool {
    std::env::var("IPVS_TEST_ENABLED").is_ok()
}

/// Helper to skip test if not enabled
macro_rules! skip_unless_enabled {
    () => {
        if !should_run_tests() {
            eprintln!("Skipping test (set IPVS_TEST_ENABLED=1 to enable)");
            return;
        }
        common::logging::try_init(common::logging::LogFormat::from_env());
    };
}

fn manager() -> IPVSManager {
    IPVSManager::new().expect("Failed to create manager")
}

/// Remove a service left behind by an earlier failed run.
fn remove_if_present(manager: &mut IPVSManager, service: &Service) {
    if manager.service(service).is_ok() {
        manager
            .remove_service(service)
            .expect("Failed to remove stale service");
    }
}

#[test]
fn test_ipvs_manager_creation() {
    skip_unless_enabled!();

    let manager = manager();
    println!("✓ IPVSManager created successfully");
    println!("  Family ID: {}", manager.family_id());
    assert!(manager.family_id() > 0);
}

#[test]
fn test_ipvs_info() {
    skip_unless_enabled!();

    let info = manager().info().expect("Failed to get IPVS info");
    println!("✓ IPVS version: {}", info.version);
    println!("  Connection table size: {}", info.connection_table_size);
    assert!(info.version.major > 0, "Version major should be > 0");
    assert!(info.connection_table_size > 0);
}

#[test]
fn test_service_lifecycle() {
    skip_unless_enabled!();

    let mut manager = manager();
    let service = Service::new(Protocol::TCP, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 80)
        .scheduler(Scheduler::RoundRobin);
    remove_if_present(&mut manager, &service);

    println!("Adding service: {}", service);
    manager
        .create_service(&service)
        .expect("Failed to add service");

    let found = manager.service(&service).expect("Failed to get service");
    assert_eq!(found.service.id, service.id);
    assert_eq!(found.service.scheduler, Scheduler::RoundRobin);
    assert!(
        manager
            .services()
            .expect("Failed to list services")
            .iter()
            .any(|s| s.service.id == service.id)
    );
    println!("✓ Service added and listed");

    let mut updated = service.clone();
    updated.scheduler = Scheduler::WeightedRoundRobin;
    updated.flags = ServiceFlags(ServiceFlags::PERSISTENT);
    updated.timeout = 300;
    updated.netmask = Netmask::from_v4([255, 255, 255, 255]);
    manager
        .update_service(&updated)
        .expect("Failed to update service");

    let found = manager.service(&updated).expect("Failed to get service");
    assert_eq!(found.service.scheduler, Scheduler::WeightedRoundRobin);
    assert!(found.service.flags.contains(ServiceFlags::PERSISTENT));
    assert_eq!(found.service.timeout, 300);
    println!("✓ Service updated to {}", found.service);

    let dest = Destination {
        forward_method: ForwardMethod::DirectRoute,
        weight: 100,
        ..Destination::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), 80)
    };
    manager
        .create_destination(&updated, &dest)
        .expect("Failed to add destination");

    let mut changed = dest.clone();
    changed.weight = 200;
    manager
        .update_destination(&updated, &changed)
        .expect("Failed to update destination");

    let dests = manager
        .destinations(&updated)
        .expect("Failed to list destinations");
    assert_eq!(dests.len(), 1);
    assert_eq!(dests[0].destination.ip(), dest.ip());
    assert_eq!(dests[0].destination.weight, 200);
    assert_eq!(dests[0].destination.family, AddressFamily::Inet);
    println!("✓ Destination {} has weight 200", dests[0].destination);

    manager
        .remove_destination(&updated, &changed)
        .expect("Failed to delete destination");
    assert!(
        manager
            .destinations(&updated)
            .unwrap_err()
            .is_not_found()
    );

    manager
        .remove_service(&updated)
        .expect("Failed to delete service");
    assert!(manager.service(&updated).is_err());
    println!("✓ Full service lifecycle test passed!");
}

#[test]
fn test_firewall_mark_service() {
    skip_unless_enabled!();

    let mut manager = manager();
    let service =
        Service::with_fwmark(100, AddressFamily::Inet).scheduler(Scheduler::LeastConnection);
    remove_if_present(&mut manager, &service);

    manager
        .create_service(&service)
        .expect("Failed to add fwmark service");
    let found = manager.service(&service).expect("Failed to get service");
    assert_eq!(found.service.id, ServiceId::ByFwmark(100));
    println!("✓ Firewall mark service added: {}", found.service);

    manager
        .remove_service(&service)
        .expect("Failed to delete service");
}

#[test]
fn test_ipv6_service_with_tunnel_destinations() {
    skip_unless_enabled!();

    let mut manager = manager();
    let mut service = Service::new(
        Protocol::UDP,
        IpAddr::V6("2001:db8::1".parse().unwrap()),
        53,
    )
    .scheduler(Scheduler::SourceHashing);
    service.netmask = Netmask::from_v6_prefix(128).unwrap();
    remove_if_present(&mut manager, &service);

    manager
        .create_service(&service)
        .expect("Failed to add IPv6 service");

    for i in 1..=3u16 {
        let dest = Destination {
            forward_method: ForwardMethod::Tunnel,
            weight: 100 * u32::from(i),
            tunnel_type: TunnelType::Gue,
            tunnel_port: 5580,
            tunnel_flags: TunnelFlags(TunnelFlags::CSUM),
            ..Destination::new(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 1, i)), 53)
        };
        println!("Adding destination {} (weight={})", dest, dest.weight);
        manager
            .create_destination(&service, &dest)
            .unwrap_or_else(|e| panic!("Failed to add destination {}: {}", i, e));
    }

    let dests = manager
        .destinations(&service)
        .expect("Failed to list destinations");
    assert_eq!(dests.len(), 3);
    assert!(dests.iter().all(|d| d.destination.family == AddressFamily::Inet6));
    println!("✓ All 3 destinations added");

    manager
        .remove_service(&service)
        .expect("Failed to delete service");
    println!("✓ Service and all destinations deleted");
}

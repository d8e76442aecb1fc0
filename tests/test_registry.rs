use std::cell::RefCell;
use std::rc::Rc;
use dslab_core::Simulation;
use sugars::{rc, refcell};
use greendc_sim::container::{Container, ContainerState, ResourceReservation, SlaTier};
use greendc_sim::host::{Host, HostMetrics, HostState};
use greendc_sim::load_profile::ConstantLoad;
use greendc_sim::registry::{ContainerRegistry, HostRegistry, RegistryError};
use greendc_sim::simulation_config::SimulationConfig;

fn make_host(sim: &mut Simulation, name: &str, cpu: u32, memory: f64,
             power_idle: f64, power_max: f64) -> Rc<RefCell<Host>> {
    let sim_config = rc!(SimulationConfig::default());
    rc!(refcell!(Host::new(cpu, memory, power_idle, power_max, false, 0,
                           sim.create_context(name), sim_config)))
}

fn make_container(id: u64, cpu: f32, memory: f64, sla: SlaTier) -> Container {
    Container::new(id, format!("container-{}", id), ResourceReservation::new(cpu, memory), sla,
                   Box::new(ConstantLoad::new(cpu as f64)),
                   Box::new(ConstantLoad::new(memory)))
}

#[test]
fn test_bind_and_release() {
    let mut sim = Simulation::new(123);
    let mut hosts = HostRegistry::default();
    let host = make_host(&mut sim, "host-1", 8, 16.0, 50.0, 200.0);
    let host_id = host.borrow().id;
    hosts.add_host(host.clone());

    let reservation = ResourceReservation::new(2.0, 4.0);
    hosts.bind(host_id, 1, &reservation).unwrap();
    assert_eq!(host.borrow().cpu_reserved, 2.0);
    assert_eq!(host.borrow().memory_reserved, 4.0);
    assert_eq!(host.borrow().container_count(), 1);

    hosts.release(host_id, 1, &reservation).unwrap();
    assert_eq!(host.borrow().cpu_reserved, 0.0);
    assert_eq!(host.borrow().memory_reserved, 0.0);
    assert!(host.borrow().is_empty());
}

#[test]
fn test_bind_over_capacity_leaves_registry_unchanged() {
    let mut sim = Simulation::new(123);
    let mut hosts = HostRegistry::default();
    let host = make_host(&mut sim, "host-1", 4, 8.0, 50.0, 200.0);
    let host_id = host.borrow().id;
    hosts.add_host(host.clone());

    hosts.bind(host_id, 1, &ResourceReservation::new(3.0, 6.0)).unwrap();
    let err = hosts.bind(host_id, 2, &ResourceReservation::new(2.0, 1.0)).unwrap_err();
    assert_eq!(err, RegistryError::CapacityExceeded { host: host_id, container: 2 });
    // The failed bind must not leak a partial booking.
    assert_eq!(host.borrow().cpu_reserved, 3.0);
    assert_eq!(host.borrow().memory_reserved, 6.0);
    assert_eq!(host.borrow().container_count(), 1);
}

#[test]
fn test_bind_to_powered_off_host() {
    let mut sim = Simulation::new(123);
    let mut hosts = HostRegistry::default();
    let host = make_host(&mut sim, "host-1", 4, 8.0, 50.0, 200.0);
    let host_id = host.borrow().id;
    hosts.add_host(host);

    hosts.set_state(host_id, HostState::Shutdown).unwrap();
    let err = hosts.bind(host_id, 1, &ResourceReservation::new(1.0, 1.0)).unwrap_err();
    assert_eq!(err, RegistryError::HostUnavailable { host: host_id });
}

#[test]
fn test_occupied_host_refuses_shutdown() {
    let mut sim = Simulation::new(123);
    let mut hosts = HostRegistry::default();
    let host = make_host(&mut sim, "host-1", 4, 8.0, 50.0, 200.0);
    let host_id = host.borrow().id;
    hosts.add_host(host.clone());

    hosts.bind(host_id, 1, &ResourceReservation::new(1.0, 1.0)).unwrap();
    let err = hosts.set_state(host_id, HostState::Shutdown).unwrap_err();
    assert_eq!(err, RegistryError::NonEmptyShutdown { host: host_id, containers: 1 });
    assert_eq!(host.borrow().state, HostState::Active);

    hosts.release(host_id, 1, &ResourceReservation::new(1.0, 1.0)).unwrap();
    hosts.set_state(host_id, HostState::Shutdown).unwrap();
    assert_eq!(host.borrow().state, HostState::Shutdown);
    assert_eq!(host.borrow().metrics.power_watts, 0.0);
}

#[test]
fn test_unknown_entities() {
    let mut sim = Simulation::new(123);
    let mut hosts = HostRegistry::default();
    let host = make_host(&mut sim, "host-1", 4, 8.0, 50.0, 200.0);
    let host_id = host.borrow().id;
    hosts.add_host(host);

    assert_eq!(hosts.set_state(42, HostState::Active).unwrap_err(),
               RegistryError::UnknownHost { host: 42 });
    assert_eq!(hosts.release(host_id, 7, &ResourceReservation::new(1.0, 1.0)).unwrap_err(),
               RegistryError::UnknownContainer { container: 7 });

    let mut containers = ContainerRegistry::default();
    assert_eq!(containers.assign(7, host_id).unwrap_err(),
               RegistryError::UnknownContainer { container: 7 });
}

#[test]
fn test_container_registry_lifecycle() {
    let mut containers = ContainerRegistry::default();
    containers.insert(make_container(1, 1.0, 2.0, SlaTier::Gold));
    containers.insert(make_container(2, 0.5, 1.0, SlaTier::Bronze));

    assert_eq!(containers.count_in_state(ContainerState::Pending), 2);
    containers.assign(1, 10).unwrap();
    containers.set_state(1, ContainerState::Running).unwrap();
    assert_eq!(containers.get(1).unwrap().host, Some(10));
    assert_eq!(containers.count_in_state(ContainerState::Pending), 1);
    assert_eq!(containers.count_in_state(ContainerState::Running), 1);

    let removed = containers.remove(1).unwrap();
    assert_eq!(removed.sla, SlaTier::Gold);
    assert_eq!(containers.len(), 1);
}

#[test]
fn test_fleet_queries() {
    let mut sim = Simulation::new(123);
    let mut hosts = HostRegistry::default();
    let host_1 = make_host(&mut sim, "host-1", 4, 8.0, 50.0, 200.0);
    let host_2 = make_host(&mut sim, "host-2", 8, 16.0, 80.0, 300.0);
    let host_3 = make_host(&mut sim, "host-3", 4, 8.0, 45.0, 180.0);
    let ids: Vec<u32> = [&host_1, &host_2, &host_3].iter().map(|h| h.borrow().id).collect();
    hosts.add_host(host_1);
    hosts.add_host(host_2);
    hosts.add_host(host_3);

    for (i, host_id) in ids.iter().enumerate() {
        let mut metrics = HostMetrics::baseline(50.0);
        metrics.power_watts = 100.0;
        metrics.latency_ms = 10.0 * (i + 1) as f64;
        hosts.upsert_metrics(*host_id, metrics).unwrap();
    }
    assert_eq!(hosts.total_power(), 300.0);
    assert_eq!(hosts.max_power_rating(), 300.0);
    assert_eq!(hosts.median_active_latency(), Some(20.0));

    hosts.set_state(ids[2], HostState::Shutdown).unwrap();
    assert_eq!(hosts.count_in_state(HostState::Active), 2);
    assert_eq!(hosts.total_power(), 200.0);
    assert_eq!(hosts.median_active_latency(), Some(10.0));
}

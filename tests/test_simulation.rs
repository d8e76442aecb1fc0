use dslab_core::Simulation;
use greendc_sim::container::{ContainerState, SlaTier};
use greendc_sim::host::HostState;
use greendc_sim::load_profile::ConstantLoad;
use greendc_sim::logger::SilentLogger;
use greendc_sim::simulation::DcSimulation;
use greendc_sim::simulation_config::SimulationConfig;
use greendc_sim::simulation_metrics::EmptyMetricsLogger;

fn make_simulation(config: &str) -> DcSimulation {
    DcSimulation::new(Simulation::new(123),
                      Box::new(EmptyMetricsLogger {}),
                      Box::new(SilentLogger::new()),
                      SimulationConfig::from_str(config),
                      None, None)
}

#[test]
fn test_container_lands_on_the_frugal_host() {
    let mut sim = make_simulation("{}");
    let frugal = sim.add_host(8, 16.0, 50.0, 200.0, false);
    let hungry = sim.add_host(8, 16.0, 80.0, 300.0, false);

    let container = sim.submit_container("web-1", 1.0, 2.0, SlaTier::Gold,
                                         Box::new(ConstantLoad::new(0.5)),
                                         Box::new(ConstantLoad::new(1.0)), 0.0);
    sim.step_for_duration(10.0);

    assert_eq!(sim.container_state(container), Some(ContainerState::Running));
    assert_eq!(sim.container_host(container), Some(frugal));
    assert_eq!(sim.host(frugal).borrow().cpu_reserved, 1.0);
    assert!(sim.host(hungry).borrow().is_empty());
    assert_eq!(sim.containers_in_state(ContainerState::Running), 1);
}

#[test]
fn test_fleet_bootstrapped_from_config() {
    let config = r#"
    hosts:
      - cpu: 8
        memory: 16.0
        power_idle: 50.0
        power_max: 200.0
        count: 2
    containers:
      - cpu: 1.0
        memory: 2.0
        sla: silver
        submit_time: 1.0
        count: 3
    "#;
    let mut sim = make_simulation(config);
    sim.step_for_duration(30.0);

    assert_eq!(sim.hosts_in_state(HostState::Active), 2);
    assert_eq!(sim.containers_in_state(ContainerState::Running), 3);
    assert!(sim.total_power_watts() > 0.0);
}

#[test]
fn test_backlogged_container_waits_for_capacity() {
    let mut sim = make_simulation("{}");
    sim.add_host(2, 4.0, 40.0, 120.0, false);

    // Too big for the only host, lands in the backlog.
    let container = sim.submit_container("db-1", 4.0, 2.0, SlaTier::Bronze,
                                         Box::new(ConstantLoad::new(3.0)),
                                         Box::new(ConstantLoad::new(1.5)), 0.0);
    sim.step_for_duration(20.0);
    assert_eq!(sim.container_state(container), Some(ContainerState::Pending));
    assert_eq!(sim.containers_in_state(ContainerState::Running), 0);

    // Capacity arrives, the backlog is flushed without waiting for backoff.
    let big = sim.add_host(8, 16.0, 80.0, 300.0, false);
    sim.step_for_duration(30.0);
    assert_eq!(sim.container_state(container), Some(ContainerState::Running));
    assert_eq!(sim.container_host(container), Some(big));
}

#[test]
fn test_consolidation_drains_and_powers_off() {
    let mut sim = make_simulation("{}");
    let small = sim.add_host(2, 4.0, 40.0, 120.0, false);
    let big = sim.add_host(4, 8.0, 80.0, 300.0, false);

    // The straggler picks the frugal host, the heavy one only fits the big host.
    let straggler = sim.submit_container("worker-1", 0.5, 1.0, SlaTier::Silver,
                                         Box::new(ConstantLoad::new(0.1)),
                                         Box::new(ConstantLoad::new(0.5)), 0.0);
    let heavy = sim.submit_container("db-1", 2.0, 2.0, SlaTier::Silver,
                                     Box::new(ConstantLoad::new(1.6)),
                                     Box::new(ConstantLoad::new(1.5)), 1.0);
    sim.step_for_duration(10.0);
    assert_eq!(sim.container_host(straggler), Some(small));
    assert_eq!(sim.container_host(heavy), Some(big));

    // Consolidation drains the underutilized host and powers it off.
    sim.step_for_duration(190.0);
    assert_eq!(sim.container_host(straggler), Some(big));
    assert_eq!(sim.container_state(straggler), Some(ContainerState::Running));
    assert_eq!(sim.migrations_applied(), 1);
    assert_eq!(sim.shutdowns_applied(), 1);
    assert_eq!(sim.hosts_in_state(HostState::Shutdown), 1);
    assert_eq!(sim.hosts_in_state(HostState::Active), 1);
    assert_eq!(sim.host(big).borrow().cpu_reserved, 2.5);
    assert_eq!(sim.host(small).borrow().state, HostState::Shutdown);

    let kpis = sim.kpis();
    assert!(kpis.total_energy_wh > 0.0);
    assert!(kpis.estimated_savings_wh > 0.0);
    assert_eq!(kpis.total_migrations, 1);
    assert_eq!(kpis.total_shutdowns, 1);
}

#[test]
fn test_empty_hosts_power_off_and_wake_on_demand() {
    let mut sim = make_simulation("{}");
    let heavy = sim.add_host(4, 8.0, 80.0, 300.0, false);
    let light = sim.add_host(4, 8.0, 45.0, 180.0, false);

    // Nothing runs, the whole fleet goes dark.
    sim.step_for_duration(120.0);
    assert_eq!(sim.hosts_in_state(HostState::Shutdown), 2);
    assert_eq!(sim.shutdowns_applied(), 2);
    assert_eq!(sim.total_power_watts(), 0.0);

    // A submission wakes the host with the lowest idle draw.
    let container = sim.submit_container("api-1", 1.0, 2.0, SlaTier::Gold,
                                         Box::new(ConstantLoad::new(1.4)),
                                         Box::new(ConstantLoad::new(1.5)), 0.0);
    sim.step_for_duration(200.0);
    assert_eq!(sim.container_state(container), Some(ContainerState::Running));
    assert_eq!(sim.container_host(container), Some(light));
    assert_eq!(sim.hosts_in_state(HostState::Active), 1);
    assert_eq!(sim.host(heavy).borrow().state, HostState::Shutdown);
}

#[test]
fn test_termination_frees_capacity() {
    let mut sim = make_simulation("{}");
    let host = sim.add_host(4, 8.0, 50.0, 200.0, false);

    let container = sim.submit_container("cache-1", 2.0, 4.0, SlaTier::Silver,
                                         Box::new(ConstantLoad::new(1.5)),
                                         Box::new(ConstantLoad::new(3.0)), 0.0);
    sim.step_for_duration(20.0);
    assert_eq!(sim.container_state(container), Some(ContainerState::Running));
    assert_eq!(sim.host(host).borrow().cpu_reserved, 2.0);

    sim.terminate_container(container, 0.0);
    sim.step_for_duration(20.0);
    assert_eq!(sim.container_state(container), None);
    assert_eq!(sim.containers_in_state(ContainerState::Running), 0);
    assert_eq!(sim.host(host).borrow().cpu_reserved, 0.0);
    assert!(sim.host(host).borrow().is_empty());
}

#[test]
fn test_reserved_host_survives_consolidation() {
    let mut sim = make_simulation("{}");
    let pinned = sim.add_host(4, 8.0, 50.0, 200.0, true);
    let expendable = sim.add_host(4, 8.0, 45.0, 180.0, false);

    sim.step_for_duration(120.0);
    assert_eq!(sim.host(pinned).borrow().state, HostState::Active);
    assert_eq!(sim.host(expendable).borrow().state, HostState::Shutdown);
    assert_eq!(sim.shutdowns_applied(), 1);
}

use std::rc::Rc;
use dslab_core::Simulation;
use sugars::{rc, refcell};
use greendc_sim::consolidation_strategy::{run_consolidation_cycle, MigrationPlan};
use greendc_sim::container::{Container, ResourceReservation, SlaTier};
use greendc_sim::host::{Host, HostMetrics, HostState};
use greendc_sim::load_profile::ConstantLoad;
use greendc_sim::placement_strategy::place_container;
use greendc_sim::registry::{ContainerRegistry, HostRegistry, PlacementError};
use greendc_sim::simulation_config::{EnergyPolicy, SimulationConfig};

/// Hand-built fleet snapshot for driving the pure strategy functions.
struct Fleet {
    sim: Simulation,
    sim_config: Rc<SimulationConfig>,
    hosts: HostRegistry,
    containers: ContainerRegistry,
    next_host_no: u32,
    next_container_id: u64,
}

impl Fleet {
    fn new() -> Self {
        Self {
            sim: Simulation::new(123),
            sim_config: rc!(SimulationConfig::default()),
            hosts: HostRegistry::default(),
            containers: ContainerRegistry::default(),
            next_host_no: 0,
            next_container_id: 0,
        }
    }

    /// Adds an active host with a synthetic reading at the given
    /// utilization and latency.
    fn add_host(&mut self, cpu: u32, memory: f64, power_idle: f64, power_max: f64,
                cpu_utilization: f64, latency_ms: f64) -> u32 {
        self.next_host_no += 1;
        let ctx = self.sim.create_context(format!("host-{}", self.next_host_no));
        let host = rc!(refcell!(Host::new(cpu, memory, power_idle, power_max, false, 0,
                                          ctx, self.sim_config.clone())));
        let host_id = host.borrow().id;
        self.hosts.add_host(host);
        self.hosts.upsert_metrics(host_id, HostMetrics {
            timestamp: 0.0,
            cpu_utilization,
            memory_utilization: cpu_utilization,
            power_watts: power_idle + (power_max - power_idle) * cpu_utilization,
            temperature_c: 35.0,
            latency_ms,
            throughput_mbps: 100.0,
        }).unwrap();
        host_id
    }

    /// Binds a running container onto a host.
    fn run_container(&mut self, host_id: u32, cpu: f32, memory: f64, sla: SlaTier) -> u64 {
        self.next_container_id += 1;
        let id = self.next_container_id;
        let mut container = Container::new(id, format!("container-{}", id),
                                           ResourceReservation::new(cpu, memory), sla,
                                           Box::new(ConstantLoad::new(cpu as f64)),
                                           Box::new(ConstantLoad::new(memory)));
        container.host = Some(host_id);
        container.state = greendc_sim::container::ContainerState::Running;
        self.hosts.bind(host_id, id, &container.reservation).unwrap();
        self.containers.insert(container);
        id
    }

    fn pending_container(&mut self, cpu: f32, memory: f64, sla: SlaTier) -> Container {
        self.next_container_id += 1;
        let id = self.next_container_id;
        Container::new(id, format!("container-{}", id),
                       ResourceReservation::new(cpu, memory), sla,
                       Box::new(ConstantLoad::new(cpu as f64)),
                       Box::new(ConstantLoad::new(memory)))
    }

    /// Applies a plan the way the control loop would. Every bind must
    /// succeed, so a plan overbooking a destination fails the test here.
    fn apply(&mut self, plan: &MigrationPlan) {
        for step in &plan.moves {
            let reservation = self.containers.get(step.container_id).unwrap().reservation;
            self.hosts.release(step.source, step.container_id, &reservation).unwrap();
            self.hosts.bind(step.destination, step.container_id, &reservation).unwrap();
            self.containers.assign(step.container_id, step.destination).unwrap();
        }
        for host_id in &plan.shutdowns {
            self.hosts.set_state(*host_id, HostState::Shutdown).unwrap();
        }
    }
}

#[test]
fn test_underutilized_host_drained_and_powered_off() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let busy = fleet.add_host(8, 16.0, 80.0, 300.0, 0.5, 20.0);
    let quiet = fleet.add_host(4, 8.0, 50.0, 200.0, 0.1, 20.0);
    let empty = fleet.add_host(4, 8.0, 45.0, 180.0, 0.0, 20.0);
    fleet.run_container(busy, 3.0, 6.0, SlaTier::Silver);
    let straggler = fleet.run_container(quiet, 0.5, 1.0, SlaTier::Silver);

    let plan = run_consolidation_cycle(&fleet.hosts, &fleet.containers, &policy);
    assert_eq!(plan.moves.len(), 1);
    assert_eq!(plan.moves[0].container_id, straggler);
    assert_eq!(plan.moves[0].source, quiet);
    assert_eq!(plan.moves[0].destination, busy);
    assert_eq!(plan.shutdowns, vec![quiet, empty]);
}

#[test]
fn test_consolidation_is_idempotent() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let busy = fleet.add_host(8, 16.0, 80.0, 300.0, 0.5, 20.0);
    let quiet = fleet.add_host(4, 8.0, 50.0, 200.0, 0.1, 20.0);
    fleet.add_host(4, 8.0, 45.0, 180.0, 0.0, 20.0);
    fleet.run_container(busy, 3.0, 6.0, SlaTier::Silver);
    fleet.run_container(quiet, 0.5, 1.0, SlaTier::Bronze);

    let plan = run_consolidation_cycle(&fleet.hosts, &fleet.containers, &policy);
    assert!(!plan.is_empty());
    fleet.apply(&plan);

    // Metrics are unchanged, yet the second pass finds nothing to do.
    let second = run_consolidation_cycle(&fleet.hosts, &fleet.containers, &policy);
    assert!(second.is_empty());
}

#[test]
fn test_destination_never_pushed_over_high_threshold() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let busy = fleet.add_host(4, 16.0, 80.0, 300.0, 0.5, 20.0);
    let quiet = fleet.add_host(4, 8.0, 50.0, 200.0, 0.1, 20.0);
    fleet.run_container(busy, 3.0, 4.0, SlaTier::Silver);
    // 3.5 of 4 cores after the move would exceed the 0.8 cap.
    fleet.run_container(quiet, 0.5, 1.0, SlaTier::Silver);

    let plan = run_consolidation_cycle(&fleet.hosts, &fleet.containers, &policy);
    assert!(plan.moves.is_empty());
    // The host keeps its container, so it must stay powered.
    assert!(!plan.shutdowns.contains(&quiet));
}

#[test]
fn test_gold_containers_refuse_slow_destinations() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let busy = fleet.add_host(8, 16.0, 80.0, 300.0, 0.5, 50.0);
    let quiet = fleet.add_host(4, 8.0, 50.0, 200.0, 0.1, 10.0);
    fleet.run_container(busy, 3.0, 6.0, SlaTier::Silver);
    let gold = fleet.run_container(quiet, 0.5, 1.0, SlaTier::Gold);
    let bronze = fleet.run_container(quiet, 0.5, 1.0, SlaTier::Bronze);

    let plan = run_consolidation_cycle(&fleet.hosts, &fleet.containers, &policy);
    // Moving to the 50 ms destination would degrade the gold container,
    // the bronze one is free to go.
    assert_eq!(plan.moves.len(), 1);
    assert_eq!(plan.moves[0].container_id, bronze);
    assert!(fleet.containers.get(gold).unwrap().host == Some(quiet));
    // Partially drained hosts stay powered.
    assert!(plan.shutdowns.is_empty());
}

#[test]
fn test_reserved_hosts_stay_powered() {
    let mut fleet = Fleet::new();
    let mut policy = EnergyPolicy::default();
    let busy = fleet.add_host(8, 16.0, 80.0, 300.0, 0.5, 20.0);
    let pinned_in_config = fleet.add_host(4, 8.0, 50.0, 200.0, 0.0, 20.0);
    let pinned_in_policy = fleet.add_host(4, 8.0, 50.0, 200.0, 0.0, 20.0);
    let expendable = fleet.add_host(4, 8.0, 45.0, 180.0, 0.0, 20.0);
    fleet.run_container(busy, 3.0, 6.0, SlaTier::Silver);

    fleet.hosts.host(pinned_in_config).unwrap().borrow_mut().reserved = true;
    policy.reserved_hosts.insert(pinned_in_policy);

    let plan = run_consolidation_cycle(&fleet.hosts, &fleet.containers, &policy);
    assert_eq!(plan.shutdowns, vec![expendable]);
}

#[test]
fn test_placement_prefers_low_power_host() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let frugal = fleet.add_host(8, 16.0, 50.0, 200.0, 0.25, 20.0);
    let hungry = fleet.add_host(8, 16.0, 100.0, 300.0, 0.25, 20.0);

    let container = fleet.pending_container(1.0, 2.0, SlaTier::Silver);
    let decision = place_container(&container, &fleet.hosts, &policy).unwrap();
    assert_eq!(decision.host, frugal);
    assert_ne!(decision.host, hungry);
    assert!(!decision.requires_activation);
    assert!(decision.sla_honored);
}

#[test]
fn test_placement_tie_broken_by_container_count() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let occupied = fleet.add_host(8, 16.0, 50.0, 200.0, 0.25, 20.0);
    let vacant = fleet.add_host(8, 16.0, 50.0, 200.0, 0.25, 20.0);
    fleet.run_container(occupied, 1.0, 2.0, SlaTier::Silver);

    let container = fleet.pending_container(1.0, 2.0, SlaTier::Silver);
    let decision = place_container(&container, &fleet.hosts, &policy).unwrap();
    assert_eq!(decision.host, vacant);
}

#[test]
fn test_gold_steers_to_low_latency_host() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    // The fast host draws slightly more power than the slow one.
    let fast = fleet.add_host(8, 16.0, 55.0, 200.0, 0.25, 10.0);
    let slow = fleet.add_host(8, 16.0, 50.0, 200.0, 0.25, 80.0);

    let gold = fleet.pending_container(1.0, 2.0, SlaTier::Gold);
    let decision = place_container(&gold, &fleet.hosts, &policy).unwrap();
    assert_eq!(decision.host, fast);
    assert!(decision.sla_honored);

    let bronze = fleet.pending_container(1.0, 2.0, SlaTier::Bronze);
    let decision = place_container(&bronze, &fleet.hosts, &policy).unwrap();
    assert_eq!(decision.host, slow);
}

#[test]
fn test_bronze_takes_the_only_feasible_host() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let cramped = fleet.add_host(4, 8.0, 50.0, 200.0, 0.95, 20.0);
    let strained = fleet.add_host(8, 16.0, 120.0, 400.0, 0.95, 20.0);
    fleet.run_container(cramped, 3.5, 4.0, SlaTier::Silver);
    fleet.run_container(strained, 7.0, 8.0, SlaTier::Silver);

    // Only the power-hungry host has a core left.
    let container = fleet.pending_container(1.0, 2.0, SlaTier::Bronze);
    let decision = place_container(&container, &fleet.hosts, &policy).unwrap();
    assert_eq!(decision.host, strained);
    // Placing bronze above the high utilization threshold is flagged.
    assert!(!decision.sla_honored);
}

#[test]
fn test_wake_picks_the_most_efficient_standby() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let heavy = fleet.add_host(8, 16.0, 80.0, 300.0, 0.0, 20.0);
    let light = fleet.add_host(8, 16.0, 45.0, 180.0, 0.0, 20.0);
    let medium = fleet.add_host(8, 16.0, 60.0, 250.0, 0.0, 20.0);
    for host_id in [heavy, light, medium] {
        fleet.hosts.set_state(host_id, HostState::Shutdown).unwrap();
    }

    let container = fleet.pending_container(1.0, 2.0, SlaTier::Silver);
    let decision = place_container(&container, &fleet.hosts, &policy).unwrap();
    assert!(decision.requires_activation);
    assert_eq!(decision.host, light);

    // An idle host beats any powered-off one, waking it costs nothing.
    fleet.hosts.set_state(heavy, HostState::Idle).unwrap();
    let decision = place_container(&container, &fleet.hosts, &policy).unwrap();
    assert!(decision.requires_activation);
    assert_eq!(decision.host, heavy);
}

#[test]
fn test_empty_fleet_has_no_capacity() {
    let mut fleet = Fleet::new();
    let policy = EnergyPolicy::default();
    let container = fleet.pending_container(1.0, 2.0, SlaTier::Gold);
    let err = place_container(&container, &fleet.hosts, &policy).unwrap_err();
    assert_eq!(err, PlacementError::NoCapacityAvailable);
}

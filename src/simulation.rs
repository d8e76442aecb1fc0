use std::cell::RefCell;
use std::rc::Rc;
use dslab_core::context::SimulationContext;
use dslab_core::simulation::Simulation;
use sugars::{rc, refcell};
use crate::consolidation::ConsolidationEngine;
use crate::consolidation_strategy::ConsolidationStrategy;
use crate::container::{Container, ContainerState, ResourceReservation, SlaTier};
use crate::control::ControlLoop;
use crate::default_consolidation_strategies::threshold_strategy::ThresholdConsolidation;
use crate::default_placement_strategies::energy_aware_strategy::EnergyAwareStrategy;
use crate::energy_meter::EnergyKpis;
use crate::events::lifecycle::TerminationRequest;
use crate::events::placement::ContainerSubmitted;
use crate::host::{Host, HostState};
use crate::load_profile::{ConstantLoad, LoadProfile};
use crate::logger::EventLogger;
use crate::monitor::FleetMonitor;
use crate::placement_strategy::PlacementStrategy;
use crate::scheduler::EnergyScheduler;
use crate::simulation_config::SimulationConfig;
use crate::simulation_metrics::MetricsLogger;
use crate::workload::WorkloadSpec;

/// Facade wiring the fleet components onto a dslab simulation.
pub struct DcSimulation {
    control: Rc<RefCell<ControlLoop>>,
    scheduler: Rc<RefCell<EnergyScheduler>>,
    consolidation: Rc<RefCell<ConsolidationEngine>>,
    monitor: Rc<RefCell<FleetMonitor>>,

    sim: Simulation,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,

    last_host_no: u64,
    last_container_id: u64,
}

impl DcSimulation {
    /// Creates a simulation with the specified config. `None` strategies
    /// fall back to the energy-aware placement and threshold
    /// consolidation defaults.
    pub fn new(mut sim: Simulation,
               metrics_logger: Box<dyn MetricsLogger>,
               event_logger: Box<dyn EventLogger>,
               sim_config: SimulationConfig,
               placement_strategy: Option<Box<dyn PlacementStrategy>>,
               consolidation_strategy: Option<Box<dyn ConsolidationStrategy>>) -> Self {
        let sim_config = rc!(sim_config);

        let control = rc!(refcell!(ControlLoop::new(
            sim.create_context("control"), sim_config.clone(), metrics_logger, event_logger
        )));
        sim.add_handler("control", control.clone());

        let placement_strategy = placement_strategy
            .unwrap_or_else(|| Box::new(EnergyAwareStrategy::new()));
        let scheduler = rc!(refcell!(EnergyScheduler::new(
            control.clone(), placement_strategy, sim.create_context("scheduler"), sim_config.clone()
        )));
        sim.add_handler("scheduler", scheduler.clone());
        control.borrow_mut().set_scheduler(scheduler.clone());

        let consolidation_strategy = consolidation_strategy
            .unwrap_or_else(|| Box::new(ThresholdConsolidation::new()));
        let consolidation = rc!(refcell!(ConsolidationEngine::new(
            control.clone(), consolidation_strategy, sim.create_context("consolidation"),
            sim_config.clone()
        )));
        sim.add_handler("consolidation", consolidation.clone());

        let monitor = rc!(refcell!(FleetMonitor::new(
            control.clone(), sim.create_context("monitor"), sim_config.clone()
        )));
        sim.add_handler("monitor", monitor.clone());

        let ctx = sim.create_context("simulation");
        let mut dc_sim = Self {
            control,
            scheduler,
            consolidation,
            monitor,
            sim,
            ctx,
            sim_config,
            last_host_no: 0,
            last_container_id: 0,
        };

        for host_config in dc_sim.sim_config.hosts.clone() {
            for _ in 0..host_config.count {
                dc_sim.add_host(host_config.cpu, host_config.memory,
                                host_config.power_idle, host_config.power_max,
                                host_config.reserved);
            }
        }

        for container_config in dc_sim.sim_config.containers.clone() {
            for _ in 0..container_config.count {
                let name = format!("container-{}", dc_sim.last_container_id + 1);
                dc_sim.submit_container(
                    &name, container_config.cpu, container_config.memory, container_config.sla,
                    Box::new(ConstantLoad::new(container_config.cpu as f64)),
                    Box::new(ConstantLoad::new(container_config.memory)),
                    container_config.submit_time,
                );
            }
        }

        dc_sim
    }

    /// Add a new host to the fleet, return its id.
    pub fn add_host(&mut self, cpu_total: u32, memory_total: f64,
                    power_idle: f64, power_max: f64, reserved: bool) -> u32 {
        self.last_host_no += 1;
        let name = format!("host-{}", self.last_host_no);
        let host_ctx = self.sim.create_context(&name);
        let host = rc!(refcell!(Host::new(cpu_total, memory_total, power_idle, power_max,
            reserved, self.control.borrow().id, host_ctx, self.sim_config.clone())));
        let host_id = host.borrow().id;
        self.sim.add_handler(name, host.clone());
        self.control.borrow_mut().add_host(host);
        host_id
    }

    /// Pin a host as burst headroom so consolidation never powers it off.
    pub fn mark_host_reserved(&mut self, host_id: u32) {
        self.control.borrow_mut().mark_host_reserved(host_id);
    }

    /// Submit a container for placement, return its id.
    pub fn submit_container(&mut self, name: &str, cpu: f32, memory: f64, sla: SlaTier,
                            cpu_profile: Box<dyn LoadProfile>,
                            memory_profile: Box<dyn LoadProfile>, delay: f64) -> u64 {
        self.last_container_id += 1;
        let container = Container::new(self.last_container_id, name.to_string(),
                                       ResourceReservation::new(cpu, memory), sla,
                                       cpu_profile, memory_profile);
        self.ctx.emit(ContainerSubmitted { container }, self.control.borrow().id,
                      self.sim_config.control_plane_message_delay + delay);
        self.last_container_id
    }

    /// Submit a generated workload with constant steady-state usage.
    pub fn submit_workload(&mut self, spec: &WorkloadSpec, delay: f64) -> u64 {
        self.submit_container(&spec.name, spec.reservation.cpu, spec.reservation.memory,
                              spec.sla,
                              Box::new(ConstantLoad::new(spec.cpu_level)),
                              Box::new(ConstantLoad::new(spec.memory_level)),
                              delay)
    }

    pub fn terminate_container(&mut self, container_id: u64, delay: f64) {
        self.ctx.emit(TerminationRequest { container_id }, self.control.borrow().id,
                      self.sim_config.control_plane_message_delay + delay);
    }

    pub fn host(&self, host_id: u32) -> Rc<RefCell<Host>> {
        self.control.borrow().host(host_id).unwrap()
    }

    pub fn container(&self, container_id: u64) -> Option<Container> {
        self.control.borrow().container_registry().get(container_id).cloned()
    }

    pub fn container_state(&self, container_id: u64) -> Option<ContainerState> {
        self.control.borrow().container_registry().get(container_id).map(|c| c.state)
    }

    pub fn container_host(&self, container_id: u64) -> Option<u32> {
        self.control.borrow().container_registry().get(container_id).and_then(|c| c.host)
    }

    pub fn hosts_in_state(&self, state: HostState) -> usize {
        self.control.borrow().host_registry().count_in_state(state)
    }

    pub fn containers_in_state(&self, state: ContainerState) -> usize {
        self.control.borrow().container_registry().count_in_state(state)
    }

    pub fn active_host_count(&self) -> usize {
        self.hosts_in_state(HostState::Active)
    }

    /// Total observed power draw of the fleet in watts.
    pub fn total_power_watts(&self) -> f64 {
        self.control.borrow().host_registry().total_power()
    }

    pub fn migrations_applied(&self) -> u64 {
        self.control.borrow().migrations_applied()
    }

    pub fn shutdowns_applied(&self) -> u64 {
        self.control.borrow().shutdowns_applied()
    }

    pub fn kpis(&self) -> EnergyKpis {
        self.control.borrow().kpis()
    }

    /// Performs the specified number of steps through the simulation (see dslab-core docs).
    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    /// Steps through the simulation until there are no pending events left.
    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events();
    }

    /// Steps through the simulation with duration limit (see dslab-core docs).
    pub fn step_for_duration(&mut self, time: f64) {
        self.sim.step_for_duration(time);
    }

    /// Steps through the simulation until the specified time (see dslab-core docs).
    pub fn step_until_time(&mut self, time: f64) {
        self.sim.step_until_time(time);
    }

    /// Returns the total number of created events.
    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    /// Record a final metrics row and save the metrics history.
    pub fn finish_simulation(&mut self, path: &str) -> Result<(), std::io::Error> {
        self.control.borrow_mut().finish_and_save_log_metrics(path)
    }

    pub fn save_kpis(&self, path: &str) -> Result<(), std::io::Error> {
        self.control.borrow().save_kpis(path)
    }

    pub fn save_energy_log(&self, path: &str) -> Result<(), csv::Error> {
        self.control.borrow().save_energy_log(path)
    }
}

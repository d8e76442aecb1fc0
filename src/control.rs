//! Central control loop of the fleet.
//!
//! Owns both registries and is the only place where decisions become
//! state: it applies migration plans, carries placement decisions into
//! reservations and runtime commands, and routes the acknowledgments
//! coming back from host agents. Everything it applies is all-or-nothing
//! per container move.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use dslab_core::{cast, Event, EventHandler, SimulationContext};
use log::{debug, error, warn};
use crate::consolidation_strategy::MigrationPlan;
use crate::container::{ContainerState, SlaTier};
use crate::energy_log::{EnergyLogRow, EnergyLogWriter};
use crate::energy_meter::{EnergyKpis, EnergyMeter};
use crate::events::consolidation::ApplyMigrationPlan;
use crate::events::lifecycle::TerminationRequest;
use crate::events::monitoring::HostMetricsReport;
use crate::events::placement::{ContainerSubmitted, PlacementDecided, PlacementFailed};
use crate::events::power::{PowerOffFailed, PowerOffRequest, PowerOnRequest, PowerStateChanged};
use crate::events::reporting::MetricsSnapshot;
use crate::events::runtime::{ContainerStartFailed, ContainerStartRequest, ContainerStarted,
                             ContainerStopRequest, ContainerStopped};
use crate::events::scheduling::MoveRequest;
use crate::host::{Host, HostMetrics, HostState};
use crate::logger::EventLogger;
use crate::placement_strategy::PlacementDecision;
use crate::registry::{ContainerRegistry, HostRegistry};
use crate::scheduler::EnergyScheduler;
use crate::simulation_config::SimulationConfig;
use crate::simulation_metrics::{FleetMetrics, MetricsLogger};

pub struct ControlLoop {
    pub id: u32,
    hosts: HostRegistry,
    containers: ContainerRegistry,

    scheduler: Option<Rc<RefCell<EnergyScheduler>>>,

    /// In-flight migrations: container id -> (source, destination).
    /// The container stays assigned to the source until the destination
    /// acknowledges the start.
    migrating: HashMap<u64, (u32, u32)>,
    /// Containers whose chosen host is still booting, keyed by host id.
    waiting_for_power: HashMap<u32, Vec<u64>>,

    migrations_applied: u64,
    shutdowns_applied: u64,

    energy_meter: EnergyMeter,
    energy_log: EnergyLogWriter,
    metrics_logger: Box<dyn MetricsLogger>,
    event_logger: Box<dyn EventLogger>,

    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl ControlLoop {
    pub fn new(ctx: SimulationContext, sim_config: Rc<SimulationConfig>,
               metrics_logger: Box<dyn MetricsLogger>,
               event_logger: Box<dyn EventLogger>) -> Self {
        if metrics_logger.snapshot_period() > 0.0 {
            ctx.emit(MetricsSnapshot {}, ctx.id(), metrics_logger.snapshot_period());
        }

        Self {
            id: ctx.id(),
            hosts: HostRegistry::default(),
            containers: ContainerRegistry::default(),
            scheduler: None,
            migrating: HashMap::default(),
            waiting_for_power: HashMap::default(),
            migrations_applied: 0,
            shutdowns_applied: 0,
            energy_meter: EnergyMeter::new(),
            energy_log: EnergyLogWriter::new(),
            metrics_logger,
            event_logger,
            ctx,
            sim_config,
        }
    }

    pub fn set_scheduler(&mut self, scheduler: Rc<RefCell<EnergyScheduler>>) {
        self.scheduler = Some(scheduler);
    }

    pub fn host_registry(&self) -> &HostRegistry {
        &self.hosts
    }

    pub fn container_registry(&self) -> &ContainerRegistry {
        &self.containers
    }

    /// Split borrow for the monitor: host inventory plus mutable
    /// containers (sampling a load profile advances its state).
    pub fn registries_mut(&mut self) -> (&HostRegistry, &mut ContainerRegistry) {
        (&self.hosts, &mut self.containers)
    }

    pub fn host(&self, host_id: u32) -> Option<Rc<RefCell<Host>>> {
        self.hosts.host(host_id)
    }

    pub fn add_host(&mut self, host: Rc<RefCell<Host>>) {
        self.hosts.add_host(host);
        self.notify_topology_change();
    }

    pub fn mark_host_reserved(&mut self, host_id: u32) {
        if let Some(host) = self.hosts.host(host_id) {
            host.borrow_mut().reserved = true;
        }
    }

    pub fn migrations_applied(&self) -> u64 {
        self.migrations_applied
    }

    pub fn shutdowns_applied(&self) -> u64 {
        self.shutdowns_applied
    }

    pub fn kpis(&self) -> EnergyKpis {
        self.energy_meter.kpis(self.containers.count_in_state(ContainerState::Running),
                               self.migrations_applied, self.shutdowns_applied)
    }

    pub fn save_kpis(&self, path: &str) -> Result<(), std::io::Error> {
        self.energy_meter.save_kpis(path,
                                    self.containers.count_in_state(ContainerState::Running),
                                    self.migrations_applied, self.shutdowns_applied)
    }

    pub fn save_energy_log(&self, path: &str) -> Result<(), csv::Error> {
        self.energy_log.save(path)
    }

    /// Wake the backlog: the set of feasible hosts just changed.
    fn notify_topology_change(&self) {
        if let Some(scheduler) = &self.scheduler {
            self.ctx.emit(MoveRequest {}, scheduler.borrow().id,
                          self.sim_config.control_plane_message_delay);
        }
    }

    /// Hand a container back to the scheduler after a failed bind or start.
    fn requeue(&mut self, container_id: u64) {
        if let Some(container) = self.containers.get(container_id).cloned() {
            self.scheduler.as_ref().unwrap().borrow_mut().enqueue(container);
        }
    }

    /// Book the reservation and ask the host agent to start the container.
    fn apply_binding(&mut self, container_id: u64, host_id: u32) {
        let reservation = match self.containers.get(container_id) {
            Some(container) => container.reservation,
            // Terminated while the decision was in flight.
            None => return,
        };
        match self.hosts.bind(host_id, container_id, &reservation) {
            Ok(()) => {
                self.containers.assign(container_id, host_id).unwrap();
                self.ctx.emit(ContainerStartRequest { container_id }, host_id,
                              self.sim_config.message_delay);
            }
            Err(err) => {
                warn!("control: binding container {} to host {} failed: {}",
                      container_id, host_id, err);
                self.requeue(container_id);
            }
        }
    }

    fn on_placement_decided(&mut self, decision: PlacementDecision) {
        let container_id = decision.container_id;
        let host_id = decision.host;
        let state = match self.hosts.host(host_id) {
            Some(host) => host.borrow().state,
            None => return,
        };
        self.event_logger.log(self.ctx.time(), "scheduler",
                              format!("container {} -> host {} (score {:.3}, sla honored: {}{})",
                                      container_id, host_id, decision.score, decision.sla_honored,
                                      if decision.requires_activation { ", waking host" } else { "" }));
        if decision.requires_activation && state == HostState::Shutdown {
            let waiting = self.waiting_for_power.entry(host_id).or_default();
            waiting.push(container_id);
            if waiting.len() == 1 {
                self.ctx.emit(PowerOnRequest {}, host_id, self.sim_config.message_delay);
            }
            return;
        }
        if state == HostState::Idle {
            // Cancel the pending power-off and keep serving.
            self.hosts.set_state(host_id, HostState::Active).unwrap();
        }
        self.apply_binding(container_id, host_id);
    }

    fn apply_migration_plan(&mut self, plan: MigrationPlan) {
        for step in plan.moves {
            let valid = self.containers.get(step.container_id)
                .map_or(false, |c| c.is_running() && c.host == Some(step.source));
            if !valid {
                debug!("control: skipping stale migration of container {}", step.container_id);
                continue;
            }
            let reservation = self.containers.get(step.container_id).unwrap().reservation;
            match self.hosts.bind(step.destination, step.container_id, &reservation) {
                Ok(()) => {
                    self.containers.set_state(step.container_id, ContainerState::Migrating).unwrap();
                    self.migrating.insert(step.container_id, (step.source, step.destination));
                    self.ctx.emit(ContainerStartRequest { container_id: step.container_id },
                                  step.destination, self.sim_config.message_delay);
                    self.event_logger.log(self.ctx.time(), "consolidation",
                                          format!("migrate container {} from host {} to host {} ({})",
                                                  step.container_id, step.source, step.destination,
                                                  step.reason));
                }
                Err(err) => {
                    warn!("control: migration of container {} to host {} rejected: {}",
                          step.container_id, step.destination, err);
                }
            }
        }

        for host_id in plan.shutdowns {
            let occupied = match self.hosts.host(host_id) {
                Some(host) => {
                    let host = host.borrow();
                    host.state != HostState::Active || !host.is_empty() || host.reserved
                }
                None => continue,
            };
            if occupied {
                debug!("control: host {} no longer eligible for shutdown", host_id);
                continue;
            }
            self.hosts.set_state(host_id, HostState::Idle).unwrap();
            self.ctx.emit(PowerOffRequest {}, host_id, self.sim_config.message_delay);
            self.event_logger.log(self.ctx.time(), "consolidation",
                                  format!("powering off host {}", host_id));
        }
    }

    fn on_container_started(&mut self, container_id: u64, host_id: u32) {
        if let Some((source, destination)) = self.migrating.remove(&container_id) {
            let reservation = self.containers.get(container_id).unwrap().reservation;
            if let Err(err) = self.hosts.release(source, container_id, &reservation) {
                warn!("control: releasing container {} from host {} failed: {}",
                      container_id, source, err);
            }
            let container = self.containers.get_mut(container_id).unwrap();
            container.host = Some(destination);
            container.state = ContainerState::Running;
            container.start_time = self.ctx.time();
            container.migrations += 1;
            self.migrations_applied += 1;
            // Tear down the source replica; its stop ack is a no-op.
            self.ctx.emit(ContainerStopRequest { container_id }, source,
                          self.sim_config.message_delay);
            self.notify_topology_change();
            return;
        }
        if let Some(container) = self.containers.get_mut(container_id) {
            if container.state == ContainerState::Pending && container.host == Some(host_id) {
                container.state = ContainerState::Running;
                container.start_time = self.ctx.time();
            }
        }
    }

    fn on_container_start_failed(&mut self, container_id: u64, host_id: u32) {
        if let Some((_, destination)) = self.migrating.remove(&container_id) {
            // Revert the move, the container keeps running on the source.
            let reservation = self.containers.get(container_id).unwrap().reservation;
            let _ = self.hosts.release(destination, container_id, &reservation);
            self.containers.set_state(container_id, ContainerState::Running).unwrap();
            warn!("control: migration of container {} failed to start on host {}, reverted",
                  container_id, destination);
            return;
        }
        if let Some(container) = self.containers.get(container_id) {
            let reservation = container.reservation;
            let _ = self.hosts.release(host_id, container_id, &reservation);
            let container = self.containers.get_mut(container_id).unwrap();
            container.host = None;
            warn!("control: container {} failed to start on host {}, requeueing",
                  container_id, host_id);
            self.requeue(container_id);
        }
    }

    fn on_container_stopped(&mut self, container_id: u64, host_id: u32) {
        let finished = self.containers.get(container_id)
            .map_or(false, |c| c.state == ContainerState::Terminated && c.host == Some(host_id));
        if !finished {
            // Stop ack for a migrated-away source replica.
            return;
        }
        let reservation = self.containers.get(container_id).unwrap().reservation;
        let _ = self.hosts.release(host_id, container_id, &reservation);
        self.containers.remove(container_id);
        self.event_logger.log(self.ctx.time(), "control",
                              format!("container {} terminated on host {}", container_id, host_id));
        self.notify_topology_change();
    }

    fn on_termination_request(&mut self, container_id: u64) {
        let (state, host) = match self.containers.get(container_id) {
            Some(container) => (container.state, container.host),
            None => return,
        };
        match state {
            ContainerState::Pending => {
                // Never bound anywhere; stale queue entries clean themselves up.
                self.containers.remove(container_id);
            }
            ContainerState::Running => {
                self.containers.set_state(container_id, ContainerState::Terminated).unwrap();
                self.ctx.emit(ContainerStopRequest { container_id }, host.unwrap(),
                              self.sim_config.message_delay);
            }
            ContainerState::Migrating => {
                // The destination replica never went live; drop its booking.
                if let Some((_, destination)) = self.migrating.remove(&container_id) {
                    let reservation = self.containers.get(container_id).unwrap().reservation;
                    let _ = self.hosts.release(destination, container_id, &reservation);
                }
                self.containers.set_state(container_id, ContainerState::Terminated).unwrap();
                self.ctx.emit(ContainerStopRequest { container_id }, host.unwrap(),
                              self.sim_config.message_delay);
            }
            ContainerState::Terminated => {}
        }
    }

    fn on_power_state_changed(&mut self, host_id: u32, state: HostState) {
        match state {
            HostState::Active => {
                let _ = self.hosts.set_state(host_id, HostState::Active);
                self.event_logger.log(self.ctx.time(), "control",
                                      format!("host {} powered on", host_id));
                if let Some(waiting) = self.waiting_for_power.remove(&host_id) {
                    for container_id in waiting {
                        self.apply_binding(container_id, host_id);
                    }
                }
                self.notify_topology_change();
            }
            HostState::Shutdown => match self.hosts.set_state(host_id, HostState::Shutdown) {
                Ok(()) => {
                    self.shutdowns_applied += 1;
                    self.event_logger.log(self.ctx.time(), "control",
                                          format!("host {} powered off", host_id));
                }
                Err(err) => {
                    // A placement won the race; the host keeps serving.
                    warn!("control: power-off of host {} aborted: {}", host_id, err);
                    let _ = self.hosts.set_state(host_id, HostState::Active);
                }
            },
            HostState::Idle => {}
        }
    }

    fn on_metrics_report(&mut self, host_id: u32, metrics: HostMetrics) {
        let (powered, power_idle, container_count, state) = match self.hosts.host(host_id) {
            Some(host) => {
                let host = host.borrow();
                (host.is_powered(), host.power_idle, host.container_count(), host.state)
            }
            None => return,
        };
        self.energy_meter.record(host_id, metrics.timestamp, metrics.power_watts,
                                 metrics.cpu_utilization, powered, power_idle);
        self.energy_log.push(EnergyLogRow {
            timestamp: metrics.timestamp,
            host_id,
            cpu_utilization: metrics.cpu_utilization,
            memory_utilization: metrics.memory_utilization,
            power_watts: metrics.power_watts,
            temperature_c: metrics.temperature_c,
            containers: container_count,
            state: state.to_string(),
            latency_ms: metrics.latency_ms,
            throughput_mbps: metrics.throughput_mbps,
        });
        let _ = self.hosts.upsert_metrics(host_id, metrics);
    }

    fn on_placement_failed(&mut self, container_id: u64, attempts: u64) {
        let sla = self.containers.get(container_id).map(|c| c.sla);
        if sla == Some(SlaTier::Gold) && attempts > 1 {
            // A gold container missing more than one full pass signals SLA risk.
            error!("gold container {} still unplaced after {} attempts", container_id, attempts);
            self.event_logger.log(self.ctx.time(), "control",
                                  format!("SLA ESCALATION: gold container {} unplaced after {} attempts",
                                          container_id, attempts));
        } else {
            self.event_logger.log(self.ctx.time(), "control",
                                  format!("no capacity for container {}, backlogged (attempt {})",
                                          container_id, attempts));
        }
    }

    pub fn fleet_metrics(&self) -> FleetMetrics {
        FleetMetrics {
            timestamp: self.ctx.time(),
            hosts_active: self.hosts.count_in_state(HostState::Active),
            hosts_idle: self.hosts.count_in_state(HostState::Idle),
            hosts_shutdown: self.hosts.count_in_state(HostState::Shutdown),
            containers_running: self.containers.count_in_state(ContainerState::Running),
            containers_pending: self.containers.count_in_state(ContainerState::Pending),
            containers_migrating: self.containers.count_in_state(ContainerState::Migrating),
            total_power_watts: self.hosts.total_power(),
            mean_cpu_utilization: self.hosts.mean_cpu_utilization(),
            mean_memory_utilization: self.hosts.mean_memory_utilization(),
            total_energy_wh: self.energy_meter.total_energy_wh(),
            migrations: self.migrations_applied,
            shutdowns: self.shutdowns_applied,
        }
    }

    pub fn log_metrics(&mut self) {
        let metrics = self.fleet_metrics();
        self.metrics_logger.log_metrics(metrics);
    }

    pub fn finish_and_save_log_metrics(&mut self, path: &str) -> Result<(), std::io::Error> {
        self.log_metrics();
        self.metrics_logger.save_log(path)
    }
}

impl EventHandler for ControlLoop {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ContainerSubmitted { container } => {
                self.containers.insert(container.clone());
                self.event_logger.log(self.ctx.time(), "control",
                                      format!("container {} ({}, {} tier) submitted",
                                              container.id, container.name, container.sla));
                self.scheduler.clone().unwrap().borrow_mut().enqueue(container);
            }
            PlacementDecided { decision } => {
                self.on_placement_decided(decision);
            }
            PlacementFailed { container_id, attempts } => {
                self.on_placement_failed(container_id, attempts);
            }
            ApplyMigrationPlan { plan } => {
                self.apply_migration_plan(plan);
            }
            ContainerStarted { container_id, host_id } => {
                self.on_container_started(container_id, host_id);
            }
            ContainerStartFailed { container_id, host_id } => {
                self.on_container_start_failed(container_id, host_id);
            }
            ContainerStopped { container_id, host_id } => {
                self.on_container_stopped(container_id, host_id);
            }
            TerminationRequest { container_id } => {
                self.on_termination_request(container_id);
            }
            PowerStateChanged { host_id, state } => {
                self.on_power_state_changed(host_id, state);
            }
            PowerOffFailed { host_id, busy_containers } => {
                warn!("control: host {} refused power-off, {} container(s) on board",
                      host_id, busy_containers);
                if self.hosts.host(host_id).map_or(false, |h| h.borrow().state == HostState::Idle) {
                    let _ = self.hosts.set_state(host_id, HostState::Active);
                }
            }
            HostMetricsReport { host_id, metrics } => {
                self.on_metrics_report(host_id, metrics);
            }
            MetricsSnapshot {} => {
                self.log_metrics();

                if self.metrics_logger.snapshot_period() > 0.0 {
                    self.ctx.emit(MetricsSnapshot {}, self.id, self.metrics_logger.snapshot_period());
                }
            }
        })
    }
}

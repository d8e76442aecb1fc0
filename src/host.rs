//! Representation of a physical host and its runtime agent.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use cast::{f32, f64};
use dslab_core::context::SimulationContext;
use dslab_core::{cast, Event, EventHandler};
use serde::Serialize;
use crate::container::ResourceReservation;
use crate::events::power::{PowerOffFailed, PowerOffRequest, PowerOnRequest, PowerStateChanged};
use crate::events::runtime::{ContainerStartFailed, ContainerStartRequest, ContainerStarted,
                             ContainerStopRequest, ContainerStopped};
use crate::simulation_config::SimulationConfig;

/// Host power state. Transitions are decided by the control plane,
/// the host itself only acknowledges them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum HostState {
    /// Powered and serving containers.
    Active,
    /// Powered, empty, marked for power-off.
    Idle,
    /// Powered off, draws no power.
    Shutdown,
}

impl Display for HostState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            HostState::Active => write!(f, "active"),
            HostState::Idle => write!(f, "idle"),
            HostState::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Latest observed host reading.
#[derive(Clone, Debug, Serialize)]
pub struct HostMetrics {
    pub timestamp: f64,
    pub cpu_utilization: f64,
    pub memory_utilization: f64,
    pub power_watts: f64,
    pub temperature_c: f64,
    pub latency_ms: f64,
    pub throughput_mbps: f64,
}

impl HostMetrics {
    /// Reading assumed for a powered host before the first monitoring pass.
    pub fn baseline(power_idle: f64) -> Self {
        Self {
            timestamp: 0.0,
            cpu_utilization: 0.0,
            memory_utilization: 0.0,
            power_watts: power_idle,
            temperature_c: 35.0,
            latency_ms: 10.0,
            throughput_mbps: 100.0,
        }
    }
}

pub struct Host {
    pub id: u32,
    /// CPU capacity in cores.
    pub cpu_total: u32,
    /// Memory capacity in GB.
    pub memory_total: f64,
    /// Power draw at zero CPU utilization, in watts.
    pub power_idle: f64,
    /// Power draw at full CPU utilization, in watts.
    pub power_max: f64,
    pub cpu_reserved: f32,
    pub memory_reserved: f64,
    pub state: HostState,
    /// Kept powered for burst headroom, never shut down.
    pub reserved: bool,
    pub metrics: HostMetrics,
    pub containers: HashSet<u64>,

    control_id: u32,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl Host {
    pub fn new(
        cpu_total: u32,
        memory_total: f64,
        power_idle: f64,
        power_max: f64,
        reserved: bool,
        control_id: u32,
        ctx: SimulationContext,
        sim_config: Rc<SimulationConfig>,
    ) -> Self {
        Self {
            id: ctx.id(),
            cpu_total,
            memory_total,
            power_idle,
            power_max,
            cpu_reserved: 0.0,
            memory_reserved: 0.0,
            state: HostState::Active,
            reserved,
            metrics: HostMetrics::baseline(power_idle),
            containers: HashSet::new(),
            control_id,
            ctx,
            sim_config,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.state != HostState::Shutdown
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn cpu_free(&self) -> f32 {
        f32(self.cpu_total) - self.cpu_reserved
    }

    pub fn memory_free(&self) -> f64 {
        self.memory_total - self.memory_reserved
    }

    /// Whether the host is powered and has spare reservation capacity
    /// for the given booking.
    pub fn fits(&self, reservation: &ResourceReservation) -> bool {
        self.is_powered()
            && self.cpu_free() >= reservation.cpu
            && self.memory_free() >= reservation.memory
    }

    /// Share of CPU capacity currently booked.
    pub fn cpu_reserved_share(&self) -> f64 {
        f64(self.cpu_reserved) / f64(self.cpu_total)
    }

    /// Share of memory capacity currently booked.
    pub fn memory_reserved_share(&self) -> f64 {
        self.memory_reserved / self.memory_total
    }

    /// Linear power model between the idle and full-load ratings.
    pub fn power_at(&self, cpu_utilization: f64) -> f64 {
        self.power_idle + (self.power_max - self.power_idle) * cpu_utilization
    }
}

impl EventHandler for Host {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ContainerStartRequest { container_id } => {
                if self.is_powered() {
                    self.ctx.emit(ContainerStarted { container_id, host_id: self.id },
                                  self.control_id,
                                  self.sim_config.container_start_duration + self.sim_config.message_delay);
                } else {
                    self.ctx.emit(ContainerStartFailed { container_id, host_id: self.id },
                                  self.control_id, self.sim_config.message_delay);
                }
            }
            ContainerStopRequest { container_id } => {
                self.ctx.emit(ContainerStopped { container_id, host_id: self.id },
                              self.control_id,
                              self.sim_config.container_stop_duration + self.sim_config.message_delay);
            }
            PowerOnRequest {} => {
                let boot_time = if self.state == HostState::Shutdown {
                    self.sim_config.host_power_on_duration
                } else {
                    0.0
                };
                self.ctx.emit(PowerStateChanged { host_id: self.id, state: HostState::Active },
                              self.control_id, boot_time + self.sim_config.message_delay);
            }
            PowerOffRequest {} => {
                if self.containers.is_empty() {
                    self.ctx.emit(PowerStateChanged { host_id: self.id, state: HostState::Shutdown },
                                  self.control_id,
                                  self.sim_config.host_power_off_duration + self.sim_config.message_delay);
                } else {
                    self.ctx.emit(PowerOffFailed { host_id: self.id, busy_containers: self.containers.len() },
                                  self.control_id, self.sim_config.message_delay);
                }
            }
        })
    }
}

//! Representation of a containerized workload.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use crate::load_profile::LoadProfile;


/// Service tier of a workload. Gold is the strictest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaTier {
    Gold,
    Silver,
    Bronze,
}

impl SlaTier {
    /// Weight used for ordering the scheduling queue.
    pub fn priority(&self) -> u64 {
        match self {
            SlaTier::Gold => 100,
            SlaTier::Silver => 50,
            SlaTier::Bronze => 10,
        }
    }
}

impl Display for SlaTier {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SlaTier::Gold => write!(f, "gold"),
            SlaTier::Silver => write!(f, "silver"),
            SlaTier::Bronze => write!(f, "bronze"),
        }
    }
}

/// Container lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum ContainerState {
    Pending,
    Running,
    Migrating,
    Terminated,
}

impl Display for ContainerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ContainerState::Pending => write!(f, "pending"),
            ContainerState::Running => write!(f, "running"),
            ContainerState::Migrating => write!(f, "migrating"),
            ContainerState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Resources booked for a container on its host.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceReservation {
    /// CPU cores.
    pub cpu: f32,
    /// Memory in GB.
    pub memory: f64,
}

impl ResourceReservation {
    pub fn new(cpu: f32, memory: f64) -> Self {
        Self { cpu, memory }
    }
}

#[derive(Clone, Serialize)]
pub struct Container {
    pub id: u64,
    pub name: String,
    pub reservation: ResourceReservation,
    pub sla: SlaTier,

    pub cpu_profile: Box<dyn LoadProfile>,
    pub memory_profile: Box<dyn LoadProfile>,

    pub state: ContainerState,
    /// Host currently holding the reservation, if any.
    pub host: Option<u32>,
    pub start_time: f64,
    pub migrations: u32,
}

impl Container {
    pub fn new(
        id: u64,
        name: String,
        reservation: ResourceReservation,
        sla: SlaTier,
        cpu_profile: Box<dyn LoadProfile>,
        memory_profile: Box<dyn LoadProfile>,
    ) -> Self {
        Self {
            id,
            name,
            reservation,
            sla,
            cpu_profile,
            memory_profile,
            state: ContainerState::Pending,
            host: None,
            start_time: 0.0,
            migrations: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    pub fn cpu_usage(&mut self, time: f64) -> f64 {
        let time_from_start = time - self.start_time;
        self.cpu_profile.usage(time, time_from_start)
    }

    pub fn memory_usage(&mut self, time: f64) -> f64 {
        let time_from_start = time - self.start_time;
        self.memory_profile.usage(time, time_from_start)
    }
}


/// Comparison operators for prioritizing containers: higher tier first,
/// older submissions first within a tier.
impl Eq for Container {}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.sla.priority() == other.sla.priority() && self.id == other.id
    }
}

impl Ord for Container {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sla.priority().cmp(&other.sla.priority())
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Container {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

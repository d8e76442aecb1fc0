//! Simulation configuration.

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::container::SlaTier;

/// Holds configuration of a single host or a set of identical hosts.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host CPU capacity in cores.
    pub cpu: u32,
    /// Host memory capacity in GB.
    pub memory: f64,
    /// Power draw at zero CPU utilization in watts.
    pub power_idle: f64,
    /// Power draw at full CPU utilization in watts.
    pub power_max: f64,
    /// Keep powered for burst headroom, never shut down.
    #[serde(default)]
    pub reserved: bool,
    /// Number of such hosts.
    pub count: u32,
}

impl HostConfig {
    pub fn new(cpu: u32, memory: f64, power_idle: f64, power_max: f64, count: u32) -> Self {
        Self {
            cpu,
            memory,
            power_idle,
            power_max,
            reserved: false,
            count,
        }
    }
}

/// Holds configuration of a single container or a set of identical containers.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Reserved CPU cores.
    pub cpu: f32,
    /// Reserved memory in GB.
    pub memory: f64,
    /// Service tier.
    pub sla: SlaTier,
    /// Submit time (in simulation time, seconds from start of simulation).
    pub submit_time: f64,
    /// Number of such containers.
    pub count: u32,
}

/// Weights of the placement score terms.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PlacementWeights {
    /// Weight of the spare capacity term.
    pub utilization: f64,
    /// Weight of the inverse power draw term.
    pub power: f64,
    /// Weight of the tier fit bonus.
    pub sla: f64,
}

impl Default for PlacementWeights {
    fn default() -> Self {
        Self {
            utilization: 1.0,
            power: 1.0,
            sla: 1.0,
        }
    }
}

/// Knobs of the consolidation and placement algorithms.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EnergyPolicy {
    /// Hosts with observed CPU utilization below this share are drained.
    pub low_utilization_threshold: f64,
    /// Planned moves never push a destination's CPU reservation share above this.
    pub high_utilization_threshold: f64,
    /// Weights of the placement score terms.
    pub weights: PlacementWeights,
    /// Hosts pinned as burst headroom, never shut down.
    pub reserved_hosts: HashSet<u32>,
    /// Allowed relative latency growth for gold-tier migrations.
    pub latency_tolerance: f64,
}

impl Default for EnergyPolicy {
    fn default() -> Self {
        Self {
            low_utilization_threshold: 0.3,
            high_utilization_threshold: 0.8,
            weights: PlacementWeights::default(),
            reserved_hosts: HashSet::default(),
            latency_tolerance: 0.0,
        }
    }
}

/// Holds raw energy policy parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawEnergyPolicy {
    pub low_utilization_threshold: Option<f64>,
    pub high_utilization_threshold: Option<f64>,
    pub weights: Option<PlacementWeights>,
    pub reserved_hosts: Option<HashSet<u32>>,
    pub latency_tolerance: Option<f64>,
}

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawSimulationConfig {
    pub message_delay: Option<f64>,
    pub control_plane_message_delay: Option<f64>,
    pub container_start_duration: Option<f64>,
    pub container_stop_duration: Option<f64>,
    pub host_power_on_duration: Option<f64>,
    pub host_power_off_duration: Option<f64>,
    pub metrics_interval: Option<f64>,
    pub consolidation_interval: Option<f64>,
    pub backoff_initial: Option<f64>,
    pub backoff_max: Option<f64>,
    pub simulation_duration: Option<f64>,
    pub policy: Option<RawEnergyPolicy>,
    pub hosts: Option<Vec<HostConfig>>,
    pub containers: Option<Vec<ContainerConfig>>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Message delay in seconds for communications via network.
    pub message_delay: f64,
    /// Control plane's message delay in seconds.
    pub control_plane_message_delay: f64,
    /// Container start duration in seconds.
    pub container_start_duration: f64,
    /// Container stop duration in seconds.
    pub container_stop_duration: f64,
    /// Host boot duration in seconds.
    pub host_power_on_duration: f64,
    /// Host power-off duration in seconds.
    pub host_power_off_duration: f64,
    /// Interval between monitoring passes in seconds.
    pub metrics_interval: f64,
    /// Interval between consolidation passes in seconds.
    pub consolidation_interval: f64,
    /// Initial backoff duration for the scheduler backlog.
    pub backoff_initial: f64,
    /// Max backoff duration for the scheduler backlog.
    pub backoff_max: f64,
    /// Horizon of a demo run in seconds.
    pub simulation_duration: f64,
    /// Knobs of the consolidation and placement algorithms.
    pub policy: EnergyPolicy,
    /// Configurations of hosts.
    pub hosts: Vec<HostConfig>,
    /// Configurations of containers.
    pub containers: Vec<ContainerConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            message_delay: 0.2,
            control_plane_message_delay: 0.0,
            container_start_duration: 5.0,
            container_stop_duration: 5.0,
            host_power_on_duration: 120.0,
            host_power_off_duration: 30.0,
            metrics_interval: 15.0,
            consolidation_interval: 45.0,
            backoff_initial: 1.0,
            backoff_max: 10.0,
            simulation_duration: 3600.0,
            policy: EnergyPolicy::default(),
            hosts: Vec::default(),
            containers: Vec::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_file(file_name: &str) -> Self {
        Self::from_str(
            &std::fs::read_to_string(file_name)
                .unwrap_or_else(|_| panic!("Can't read file {}", file_name)),
        )
    }

    pub fn from_str(content: &str) -> Self {
        let raw: RawSimulationConfig = serde_yaml::from_str(content)
            .unwrap_or_else(|err| panic!("Can't parse YAML config: {}", err));
        let defaults = SimulationConfig::default();

        let policy = match raw.policy {
            None => EnergyPolicy::default(),
            Some(raw_policy) => EnergyPolicy {
                low_utilization_threshold: raw_policy.low_utilization_threshold.unwrap_or(0.3),
                high_utilization_threshold: raw_policy.high_utilization_threshold.unwrap_or(0.8),
                weights: raw_policy.weights.unwrap_or_default(),
                reserved_hosts: raw_policy.reserved_hosts.unwrap_or_default(),
                latency_tolerance: raw_policy.latency_tolerance.unwrap_or(0.0),
            },
        };

        Self {
            message_delay: raw.message_delay.unwrap_or(defaults.message_delay),
            control_plane_message_delay: raw
                .control_plane_message_delay
                .unwrap_or(defaults.control_plane_message_delay),
            container_start_duration: raw
                .container_start_duration
                .unwrap_or(defaults.container_start_duration),
            container_stop_duration: raw
                .container_stop_duration
                .unwrap_or(defaults.container_stop_duration),
            host_power_on_duration: raw
                .host_power_on_duration
                .unwrap_or(defaults.host_power_on_duration),
            host_power_off_duration: raw
                .host_power_off_duration
                .unwrap_or(defaults.host_power_off_duration),
            metrics_interval: raw.metrics_interval.unwrap_or(defaults.metrics_interval),
            consolidation_interval: raw
                .consolidation_interval
                .unwrap_or(defaults.consolidation_interval),
            backoff_initial: raw.backoff_initial.unwrap_or(defaults.backoff_initial),
            backoff_max: raw.backoff_max.unwrap_or(defaults.backoff_max),
            simulation_duration: raw
                .simulation_duration
                .unwrap_or(defaults.simulation_duration),
            policy,
            hosts: raw.hosts.unwrap_or_default(),
            containers: raw.containers.unwrap_or_default(),
        }
    }
}

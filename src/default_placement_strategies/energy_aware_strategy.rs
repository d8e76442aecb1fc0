use crate::container::{Container, SlaTier};
use crate::host::{Host, HostState};
use crate::placement_strategy::PlacementStrategy;
use crate::registry::HostRegistry;
use crate::simulation_config::EnergyPolicy;

/// Floor for the normalized power term, guards the reciprocal when a
/// host reports a near-zero reading right after waking up.
const MIN_NORMALIZED_POWER: f64 = 0.001;

/// Scores hosts by spare capacity, inverse normalized power draw and a
/// tier fit bonus. Weights come from the energy policy.
#[derive(Default)]
pub struct EnergyAwareStrategy;

impl EnergyAwareStrategy {
    pub fn new() -> Self {
        Default::default()
    }

    fn sla_fit_bonus(&self, container: &Container, host: &Host,
                     median_latency: Option<f64>, policy: &EnergyPolicy) -> f64 {
        match container.sla {
            SlaTier::Gold => match median_latency {
                Some(median) if host.metrics.latency_ms <= median => 1.0,
                _ => 0.0,
            },
            SlaTier::Silver => 0.5,
            SlaTier::Bronze => {
                if host.metrics.cpu_utilization > policy.high_utilization_threshold {
                    -0.5
                } else {
                    0.5
                }
            }
        }
    }
}

impl PlacementStrategy for EnergyAwareStrategy {
    fn filter(&self, container: &Container, hosts: &HostRegistry) -> Vec<u32> {
        let mut filtered = Vec::<u32>::default();
        for (host_id, host) in hosts.hosts() {
            let host = host.borrow();
            if host.state == HostState::Active && host.fits(&container.reservation) {
                filtered.push(*host_id);
            }
        }
        filtered
    }

    fn score(&self, container: &Container, hosts: &HostRegistry,
             candidate_ids: &[u32], policy: &EnergyPolicy) -> Vec<f64> {
        let max_rating = hosts.max_power_rating();
        let median_latency = hosts.median_active_latency();
        let mut scores = Vec::<f64>::default();
        for host_id in candidate_ids {
            let host = hosts.hosts().get(host_id).unwrap().borrow();
            let spare_capacity = 1.0 - host.metrics.cpu_utilization;
            let normalized_power = if max_rating > 0.0 {
                (host.metrics.power_watts / max_rating).max(MIN_NORMALIZED_POWER)
            } else {
                MIN_NORMALIZED_POWER
            };
            let bonus = self.sla_fit_bonus(container, &host, median_latency, policy);
            let weights = &policy.weights;
            scores.push(weights.utilization * spare_capacity
                + weights.power * (1.0 / normalized_power)
                + weights.sla * bonus);
        }
        scores
    }

    fn sla_honored(&self, container: &Container, hosts: &HostRegistry,
                   host_id: u32, policy: &EnergyPolicy) -> bool {
        let host = hosts.hosts().get(&host_id).unwrap().borrow();
        match container.sla {
            SlaTier::Gold => hosts.median_active_latency()
                .map_or(true, |median| host.metrics.latency_ms <= median),
            SlaTier::Silver => true,
            SlaTier::Bronze => host.metrics.cpu_utilization <= policy.high_utilization_threshold,
        }
    }
}

//! Placement strategy contract and the standalone placement entry point.

use serde::Serialize;
use crate::container::Container;
use crate::default_placement_strategies::energy_aware_strategy::EnergyAwareStrategy;
use crate::host::HostState;
use crate::registry::{HostRegistry, PlacementError};
use crate::simulation_config::EnergyPolicy;

/// Outcome of a single placement query.
#[derive(Clone, Debug, Serialize)]
pub struct PlacementDecision {
    pub container_id: u64,
    pub host: u32,
    pub score: f64,
    pub sla_honored: bool,
    /// The chosen host is on standby and must be woken before the
    /// container can start.
    pub requires_activation: bool,
}

pub trait PlacementStrategy {
    /// Hosts able to take the container right now, in ascending id order.
    fn filter(&self, container: &Container, hosts: &HostRegistry) -> Vec<u32>;

    /// Scores for the hosts from `candidate_ids`, higher is better.
    fn score(&self, container: &Container, hosts: &HostRegistry,
             candidate_ids: &[u32], policy: &EnergyPolicy) -> Vec<f64>;

    /// Standby host to wake when no powered host passed the filter.
    fn select_standby(&self, container: &Container, hosts: &HostRegistry) -> Option<u32> {
        most_efficient_standby(container, hosts)
    }

    /// Whether placing on the given host honors the container's tier.
    fn sla_honored(&self, _container: &Container, _hosts: &HostRegistry,
                   _host_id: u32, _policy: &EnergyPolicy) -> bool {
        true
    }
}

/// Standby host with enough capacity and the lowest idle draw.
/// Idle hosts win over powered-off ones since waking them is free.
pub fn most_efficient_standby(container: &Container, hosts: &HostRegistry) -> Option<u32> {
    let mut best: Option<(u32, u8, f64)> = None;
    for (host_id, host) in hosts.hosts() {
        let host = host.borrow();
        if host.state == HostState::Active {
            continue;
        }
        if host.cpu_free() < container.reservation.cpu
            || host.memory_free() < container.reservation.memory {
            continue;
        }
        let rank = if host.state == HostState::Idle { 0 } else { 1 };
        let replace = match best {
            None => true,
            Some((_, best_rank, best_idle)) => {
                rank < best_rank || (rank == best_rank && host.power_idle < best_idle)
            }
        };
        if replace {
            best = Some((*host_id, rank, host.power_idle));
        }
    }
    best.map(|(host_id, _, _)| host_id)
}

/// Run the filter/score pipeline of the given strategy and pick the
/// winner: highest score, ties broken by fewest containers, then by
/// lowest host id.
pub fn schedule_with(strategy: &dyn PlacementStrategy, container: &Container,
                     hosts: &HostRegistry, policy: &EnergyPolicy)
                     -> Result<PlacementDecision, PlacementError> {
    let candidates = strategy.filter(container, hosts);
    if candidates.is_empty() {
        if let Some(host_id) = strategy.select_standby(container, hosts) {
            return Ok(PlacementDecision {
                container_id: container.id,
                host: host_id,
                score: 0.0,
                sla_honored: strategy.sla_honored(container, hosts, host_id, policy),
                requires_activation: true,
            });
        }
        return Err(PlacementError::NoCapacityAvailable);
    }

    let scores = strategy.score(container, hosts, &candidates, policy);
    let mut best = 0;
    for i in 1..candidates.len() {
        if scores[i] > scores[best] {
            best = i;
        } else if scores[i] == scores[best] {
            let count_i = hosts.hosts().get(&candidates[i]).unwrap().borrow().container_count();
            let count_best = hosts.hosts().get(&candidates[best]).unwrap().borrow().container_count();
            if count_i < count_best {
                best = i;
            }
        }
    }

    let host_id = candidates[best];
    Ok(PlacementDecision {
        container_id: container.id,
        host: host_id,
        score: scores[best],
        sla_honored: strategy.sla_honored(container, hosts, host_id, policy),
        requires_activation: false,
    })
}

/// Place a single container with the default energy-aware strategy.
pub fn place_container(container: &Container, hosts: &HostRegistry, policy: &EnergyPolicy)
                       -> Result<PlacementDecision, PlacementError> {
    schedule_with(&EnergyAwareStrategy::new(), container, hosts, policy)
}

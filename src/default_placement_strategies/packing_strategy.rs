use cast::f64;
use crate::container::Container;
use crate::host::HostState;
use crate::placement_strategy::PlacementStrategy;
use crate::registry::HostRegistry;
use crate::simulation_config::EnergyPolicy;

/// Bin-packing baseline: prefers the host that would end up with the
/// highest reservation share after the placement.
#[derive(Default)]
pub struct PackingStrategy;

impl PackingStrategy {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PlacementStrategy for PackingStrategy {
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
             candidate_ids: &[u32], _policy: &EnergyPolicy) -> Vec<f64> {
        let mut scores = Vec::<f64>::default();
        for host_id in candidate_ids {
            let host = hosts.hosts().get(host_id).unwrap().borrow();
            let cpu_share = f64(host.cpu_reserved + container.reservation.cpu) / f64(host.cpu_total);
            let memory_share = (host.memory_reserved + container.reservation.memory) / host.memory_total;
            scores.push(10.0 * (cpu_share + memory_share) / 2.0);
        }
        scores
    }
}

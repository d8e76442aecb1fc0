use std::collections::BTreeMap;
use cast::f64;
use log::debug;
use crate::consolidation_strategy::{ConsolidationStrategy, MigrationPlan, MigrationStep};
use crate::container::{Container, SlaTier};
use crate::host::HostState;
use crate::registry::{ContainerRegistry, HostRegistry};
use crate::simulation_config::EnergyPolicy;

/// How an active host is treated by the current pass.
#[derive(Clone, Copy, PartialEq)]
enum HostClass {
    /// Empty, goes straight to the shutdown list.
    IdleCandidate,
    /// Occupied but below the low utilization threshold, gets drained.
    Underutilized,
    /// Serves as a migration destination.
    Normal,
}

/// Reservation ledger of a destination host projected over the moves
/// already planned in this pass.
struct ProjectedHost {
    cpu_total: f64,
    memory_total: f64,
    cpu_reserved: f64,
    memory_reserved: f64,
    latency_ms: f64,
}

impl ProjectedHost {
    fn fits(&self, container: &Container) -> bool {
        self.cpu_reserved + f64(container.reservation.cpu) <= self.cpu_total
            && self.memory_reserved + container.reservation.memory <= self.memory_total
    }

    /// Mean reservation share the host would end up with after the move.
    fn share_after(&self, container: &Container) -> f64 {
        let cpu_share = (self.cpu_reserved + f64(container.reservation.cpu)) / self.cpu_total;
        let memory_share = (self.memory_reserved + container.reservation.memory) / self.memory_total;
        (cpu_share + memory_share) / 2.0
    }

    fn cpu_share_after(&self, container: &Container) -> f64 {
        (self.cpu_reserved + f64(container.reservation.cpu)) / self.cpu_total
    }

    /// Latency estimate after taking the container, scaled by the added
    /// CPU share.
    fn latency_after(&self, container: &Container) -> f64 {
        self.latency_ms * (1.0 + f64(container.reservation.cpu) / self.cpu_total)
    }

    fn book(&mut self, container: &Container) {
        self.cpu_reserved += f64(container.reservation.cpu);
        self.memory_reserved += container.reservation.memory;
    }
}

/// Drains hosts whose observed CPU utilization stays below the low
/// threshold and powers off the hosts left empty. Destinations are
/// normally loaded hosts only, so a pass never undoes its own work.
#[derive(Default)]
pub struct ThresholdConsolidation;

impl ThresholdConsolidation {
    pub fn new() -> Self {
        Default::default()
    }

    fn classify(hosts: &HostRegistry, policy: &EnergyPolicy) -> BTreeMap<u32, HostClass> {
        let mut classes = BTreeMap::default();
        for (host_id, host) in hosts.hosts() {
            let host = host.borrow();
            if host.state != HostState::Active {
                continue;
            }
            let class = if host.is_empty() {
                HostClass::IdleCandidate
            } else if host.metrics.cpu_utilization < policy.low_utilization_threshold {
                HostClass::Underutilized
            } else {
                HostClass::Normal
            };
            classes.insert(*host_id, class);
        }
        classes
    }

    /// Destination with the smallest resulting reservation share, ties
    /// broken by lowest host id. `None` when nothing feasible exists.
    fn pick_destination(
        container: &Container,
        source: u32,
        source_latency: f64,
        classes: &BTreeMap<u32, HostClass>,
        projected: &BTreeMap<u32, ProjectedHost>,
        policy: &EnergyPolicy,
    ) -> Option<u32> {
        let mut best: Option<(u32, f64)> = None;
        for (host_id, class) in classes {
            if *host_id == source || *class != HostClass::Normal {
                continue;
            }
            let dest = &projected[host_id];
            if !dest.fits(container) {
                continue;
            }
            if dest.cpu_share_after(container) > policy.high_utilization_threshold {
                continue;
            }
            if container.sla == SlaTier::Gold
                && dest.latency_after(container)
                    > source_latency * (1.0 + policy.latency_tolerance)
            {
                continue;
            }
            let share = dest.share_after(container);
            if best.map_or(true, |(_, best_share)| share < best_share) {
                best = Some((*host_id, share));
            }
        }
        best.map(|(host_id, _)| host_id)
    }
}

impl ConsolidationStrategy for ThresholdConsolidation {
    fn plan(&mut self, hosts: &HostRegistry, containers: &ContainerRegistry,
            policy: &EnergyPolicy) -> MigrationPlan {
        let classes = Self::classify(hosts, policy);

        let mut projected: BTreeMap<u32, ProjectedHost> = BTreeMap::default();
        for host_id in classes.keys() {
            let host = hosts.host(*host_id).unwrap();
            let host = host.borrow();
            projected.insert(*host_id, ProjectedHost {
                cpu_total: f64(host.cpu_total),
                memory_total: host.memory_total,
                cpu_reserved: f64(host.cpu_reserved),
                memory_reserved: host.memory_reserved,
                latency_ms: host.metrics.latency_ms,
            });
        }

        let mut plan = MigrationPlan::default();
        for (host_id, class) in &classes {
            if *class != HostClass::Underutilized {
                continue;
            }
            let host = hosts.host(*host_id).unwrap();
            let host = host.borrow();
            let source_latency = host.metrics.latency_ms;
            let cpu_percent = host.metrics.cpu_utilization * 100.0;

            let mut resident: Vec<u64> = host.containers.iter().copied().collect();
            resident.sort_unstable();
            let mut moved_out = 0;
            for container_id in resident {
                let container = match containers.get(container_id) {
                    Some(container) if container.is_running() => container,
                    _ => continue,
                };
                let destination = Self::pick_destination(
                    container, *host_id, source_latency, &classes, &projected, policy);
                match destination {
                    Some(destination) => {
                        projected.get_mut(&destination).unwrap().book(container);
                        plan.moves.push(MigrationStep {
                            container_id,
                            source: *host_id,
                            destination,
                            reason: format!("drain host {} at {:.0}% cpu", host_id, cpu_percent),
                        });
                        moved_out += 1;
                    }
                    // No feasible destination, the container stays put.
                    None => debug!(
                        "consolidation: container {} stays on host {}, no feasible destination",
                        container_id, host_id
                    ),
                }
            }

            if moved_out == host.container_count() && !host.reserved
                && !policy.reserved_hosts.contains(host_id) {
                plan.shutdowns.push(*host_id);
            }
        }

        for (host_id, class) in &classes {
            if *class != HostClass::IdleCandidate {
                continue;
            }
            let host = hosts.host(*host_id).unwrap();
            let reserved = host.borrow().reserved || policy.reserved_hosts.contains(host_id);
            if !reserved {
                plan.shutdowns.push(*host_id);
            }
        }
        plan.shutdowns.sort_unstable();

        plan
    }
}

//! Consolidation strategy contract and the standalone planning entry point.

use serde::Serialize;
use crate::default_consolidation_strategies::threshold_strategy::ThresholdConsolidation;
use crate::registry::{ContainerRegistry, HostRegistry};
use crate::simulation_config::EnergyPolicy;

/// One planned container relocation.
#[derive(Clone, Debug, Serialize)]
pub struct MigrationStep {
    pub container_id: u64,
    pub source: u32,
    pub destination: u32,
    pub reason: String,
}

/// Outcome of one consolidation pass. Applied once and discarded.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MigrationPlan {
    pub moves: Vec<MigrationStep>,
    pub shutdowns: Vec<u32>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.shutdowns.is_empty()
    }
}

pub trait ConsolidationStrategy {
    /// Produce a migration plan from the current fleet snapshot.
    /// Reads the registries, never mutates them.
    fn plan(&mut self, hosts: &HostRegistry, containers: &ContainerRegistry,
            policy: &EnergyPolicy) -> MigrationPlan;
}

/// Run a single consolidation pass with the default threshold strategy.
pub fn run_consolidation_cycle(hosts: &HostRegistry, containers: &ContainerRegistry,
                               policy: &EnergyPolicy) -> MigrationPlan {
    ThresholdConsolidation::new().plan(hosts, containers, policy)
}

//! Demo workload generation.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::container::{ResourceReservation, SlaTier};

/// Shape of one workload kind: reservation ranges and its service tier.
struct WorkloadTemplate {
    prefix: &'static str,
    cpu: (f32, f32),
    memory: (f64, f64),
    sla: SlaTier,
    weight: f64,
}

const TEMPLATES: [WorkloadTemplate; 5] = [
    WorkloadTemplate { prefix: "web", cpu: (0.5, 1.5), memory: (0.5, 2.0), sla: SlaTier::Gold, weight: 3.0 },
    WorkloadTemplate { prefix: "db", cpu: (1.0, 2.0), memory: (2.0, 4.0), sla: SlaTier::Gold, weight: 1.0 },
    WorkloadTemplate { prefix: "api", cpu: (0.5, 1.0), memory: (1.0, 2.0), sla: SlaTier::Silver, weight: 2.0 },
    WorkloadTemplate { prefix: "worker", cpu: (0.25, 0.75), memory: (0.5, 1.5), sla: SlaTier::Bronze, weight: 2.0 },
    WorkloadTemplate { prefix: "cache", cpu: (0.5, 1.0), memory: (1.0, 2.0), sla: SlaTier::Silver, weight: 1.0 },
];

/// One generated workload request.
pub struct WorkloadSpec {
    pub name: String,
    pub reservation: ResourceReservation,
    pub sla: SlaTier,
    /// Steady-state CPU usage in cores, below the reservation.
    pub cpu_level: f64,
    /// Steady-state memory usage in GB, below the reservation.
    pub memory_level: f64,
}

/// Seeded generator producing a mix of web, database, API, background
/// worker and cache workloads.
pub struct WorkloadGenerator {
    rng: StdRng,
    template_index: WeightedIndex<f64>,
    sequence: u64,
}

impl WorkloadGenerator {
    pub fn new(seed: u64) -> Self {
        let weights: Vec<f64> = TEMPLATES.iter().map(|t| t.weight).collect();
        Self {
            rng: StdRng::seed_from_u64(seed),
            template_index: WeightedIndex::new(weights).unwrap(),
            sequence: 0,
        }
    }

    pub fn next_workload(&mut self) -> WorkloadSpec {
        let template = &TEMPLATES[self.template_index.sample(&mut self.rng)];
        self.sequence += 1;
        let cpu = self.rng.gen_range(template.cpu.0..=template.cpu.1);
        let memory = self.rng.gen_range(template.memory.0..=template.memory.1);
        let usage_share = self.rng.gen_range(0.5..0.95);
        WorkloadSpec {
            name: format!("{}-{:02}", template.prefix, self.sequence),
            reservation: ResourceReservation::new(cpu, memory),
            sla: template.sla,
            cpu_level: cpu as f64 * usage_share,
            memory_level: memory * usage_share,
        }
    }
}

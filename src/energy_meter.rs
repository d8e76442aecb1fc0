//! Fleet energy accounting.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use serde::Serialize;

/// Sustainability KPIs derived from the accumulated readings.
#[derive(Clone, Debug, Serialize)]
pub struct EnergyKpis {
    pub total_energy_wh: f64,
    pub average_power_watts: f64,
    pub average_cpu_utilization: f64,
    pub average_power_per_container: f64,
    /// Energy not burned by hosts while they were powered off, priced
    /// at their idle draw.
    pub estimated_savings_wh: f64,
    pub total_migrations: u64,
    pub total_shutdowns: u64,
}

/// Integrates host power readings over time. One reading per host per
/// monitoring pass is expected; the meter keeps per-host timestamps so
/// irregular cadences still integrate correctly.
#[derive(Default)]
pub struct EnergyMeter {
    last_seen: HashMap<u32, f64>,
    total_energy_wh: f64,
    savings_wh: f64,
    power_sum: f64,
    cpu_sum: f64,
    samples: u64,
}

impl EnergyMeter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Account one host reading. `idle_rating` is the host's idle draw,
    /// used to price the energy a powered-off host would have burned.
    pub fn record(&mut self, host_id: u32, timestamp: f64, power_watts: f64,
                  cpu_utilization: f64, powered: bool, idle_rating: f64) {
        let elapsed = match self.last_seen.insert(host_id, timestamp) {
            Some(last) if timestamp > last => timestamp - last,
            _ => return,
        };
        if powered {
            self.total_energy_wh += power_watts * elapsed / 3600.0;
            self.power_sum += power_watts;
            self.cpu_sum += cpu_utilization;
            self.samples += 1;
        } else {
            self.savings_wh += idle_rating * elapsed / 3600.0;
        }
    }

    pub fn total_energy_wh(&self) -> f64 {
        self.total_energy_wh
    }

    pub fn estimated_savings_wh(&self) -> f64 {
        self.savings_wh
    }

    pub fn kpis(&self, running_containers: usize, migrations: u64, shutdowns: u64) -> EnergyKpis {
        let average_power = if self.samples > 0 {
            self.power_sum / self.samples as f64
        } else {
            0.0
        };
        EnergyKpis {
            total_energy_wh: self.total_energy_wh,
            average_power_watts: average_power,
            average_cpu_utilization: if self.samples > 0 {
                self.cpu_sum / self.samples as f64
            } else {
                0.0
            },
            average_power_per_container: if running_containers > 0 {
                average_power / running_containers as f64
            } else {
                0.0
            },
            estimated_savings_wh: self.savings_wh,
            total_migrations: migrations,
            total_shutdowns: shutdowns,
        }
    }

    pub fn save_kpis(&self, path: &str, running_containers: usize, migrations: u64,
                     shutdowns: u64) -> Result<(), std::io::Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.kpis(running_containers, migrations, shutdowns))?;
        writer.flush()
    }
}

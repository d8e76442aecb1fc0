//! Per-host energy log exported as CSV.

use serde::Serialize;

/// One host reading as written to the energy log.
#[derive(Clone, Debug, Serialize)]
pub struct EnergyLogRow {
    pub timestamp: f64,
    pub host_id: u32,
    pub cpu_utilization: f64,
    pub memory_utilization: f64,
    pub power_watts: f64,
    pub temperature_c: f64,
    pub containers: usize,
    pub state: String,
    pub latency_ms: f64,
    pub throughput_mbps: f64,
}

/// Buffers host readings and writes them out as a single CSV file.
#[derive(Default)]
pub struct EnergyLogWriter {
    rows: Vec<EnergyLogRow>,
}

impl EnergyLogWriter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, row: EnergyLogRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn save(&self, path: &str) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

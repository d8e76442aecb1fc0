use std::fs::File;
use std::io::{BufWriter, Error, Write};
use serde::Serialize;

/// One fleet-wide metrics row.
#[derive(Serialize)]
pub struct FleetMetrics {
    pub timestamp: f64,
    pub hosts_active: usize,
    pub hosts_idle: usize,
    pub hosts_shutdown: usize,
    pub containers_running: usize,
    pub containers_pending: usize,
    pub containers_migrating: usize,
    pub total_power_watts: f64,
    pub mean_cpu_utilization: f64,
    pub mean_memory_utilization: f64,
    pub total_energy_wh: f64,
    pub migrations: u64,
    pub shutdowns: u64,
}

pub trait MetricsLogger {
    fn snapshot_period(&self) -> f64;
    fn log_metrics(&mut self, metrics: FleetMetrics);
    fn save_log(&mut self, path: &str) -> Result<(), std::io::Error>;
}

pub struct EmptyMetricsLogger {}

impl MetricsLogger for EmptyMetricsLogger {
    fn snapshot_period(&self) -> f64 {
        return -1.0;
    }

    fn log_metrics(&mut self, _metrics: FleetMetrics) {}

    fn save_log(&mut self, _path: &str) -> Result<(), Error> {
        Ok(())
    }
}

pub struct StdoutMetricsLogger {
    snapshot_period: f64,
}

impl StdoutMetricsLogger {
    pub fn new(snapshot_period: f64) -> Self {
        Self {
            snapshot_period
        }
    }
}

impl MetricsLogger for StdoutMetricsLogger {
    fn snapshot_period(&self) -> f64 {
        self.snapshot_period
    }

    fn log_metrics(&mut self, metrics: FleetMetrics) {
        println!("Time: {:.1}, hosts active/idle/off: {}/{}/{}, containers run/pend/migr: {}/{}/{}, \
                  power: {:.1} W, energy: {:.1} Wh",
                 metrics.timestamp, metrics.hosts_active, metrics.hosts_idle, metrics.hosts_shutdown,
                 metrics.containers_running, metrics.containers_pending, metrics.containers_migrating,
                 metrics.total_power_watts, metrics.total_energy_wh)
    }

    fn save_log(&mut self, _path: &str) -> Result<(), Error> {
        Ok(())
    }
}

pub struct FileMetricsLogger {
    snapshot_period: f64,
    metrics_history: Vec<FleetMetrics>,
}

impl FileMetricsLogger {
    pub fn new(snapshot_period: f64) -> Self {
        Self {
            snapshot_period,
            metrics_history: Vec::default(),
        }
    }
}

impl MetricsLogger for FileMetricsLogger {
    fn snapshot_period(&self) -> f64 {
        self.snapshot_period
    }

    fn log_metrics(&mut self, metrics: FleetMetrics) {
        self.metrics_history.push(metrics);
    }

    fn save_log(&mut self, path: &str) -> Result<(), Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &self.metrics_history)?;
        writer.flush()
    }
}

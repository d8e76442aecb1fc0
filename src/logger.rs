//! Decision event logging.

/// Sink for human-readable decision events: placements, migration plans,
/// power transitions, SLA escalations.
pub trait EventLogger {
    fn log(&mut self, time: f64, source: &str, message: String);
}

pub struct StdoutLogger {}

impl StdoutLogger {
    pub fn new() -> Self {
        Self {}
    }
}

impl EventLogger for StdoutLogger {
    fn log(&mut self, time: f64, source: &str, message: String) {
        println!("[{:>10.2}] [{}] {}", time, source, message);
    }
}

pub struct SilentLogger {}

impl SilentLogger {
    pub fn new() -> Self {
        Self {}
    }
}

impl EventLogger for SilentLogger {
    fn log(&mut self, _time: f64, _source: &str, _message: String) {}
}

//! Resource usage profiles.

use dyn_clone::{clone_trait_object, DynClone};
use erased_serde::serialize_trait_object;
use serde::Serialize;


/// A load profile is a function returning the absolute resource usage of a
/// container at the given moment. time - current simulation time,
/// time_from_start - time since the container was last (re)started, which
/// allows to model warm-up behavior. This time is dropped to zero when the
/// container is migrated.
pub trait LoadProfile: DynClone + erased_serde::Serialize {
    fn usage(&mut self, time: f64, time_from_start: f64) -> f64;
}

clone_trait_object!(LoadProfile);
serialize_trait_object!(LoadProfile);

#[derive(Clone, Serialize)]
pub struct ConstantLoad {
    level: f64,
}

impl ConstantLoad {
    pub fn new(level: f64) -> Self {
        Self { level }
    }
}

impl LoadProfile for ConstantLoad {
    fn usage(&mut self, _time: f64, _time_from_start: f64) -> f64 {
        self.level
    }
}

#[derive(Clone, Serialize)]
pub struct RampUpLoad {
    ramp_time: f64,
    start_level: f64,
    end_level: f64,
}

impl RampUpLoad {
    pub fn new(ramp_time: f64, start_level: f64, end_level: f64) -> Self {
        assert!(0.0 <= start_level && start_level <= end_level);
        assert!(ramp_time > 0.0);
        Self { ramp_time, start_level, end_level }
    }
}

impl LoadProfile for RampUpLoad {
    fn usage(&mut self, _time: f64, time_from_start: f64) -> f64 {
        self.start_level + (time_from_start / self.ramp_time).min(1.0) *
            (self.end_level - self.start_level)
    }
}

#[derive(Clone, Serialize)]
pub struct RampDownLoad {
    ramp_time: f64,
    start_level: f64,
    end_level: f64,
}

impl RampDownLoad {
    pub fn new(ramp_time: f64, start_level: f64, end_level: f64) -> Self {
        assert!(0.0 <= end_level && end_level <= start_level);
        assert!(ramp_time > 0.0);
        Self { ramp_time, start_level, end_level }
    }
}

impl LoadProfile for RampDownLoad {
    fn usage(&mut self, _time: f64, time_from_start: f64) -> f64 {
        self.start_level - (time_from_start / self.ramp_time).min(1.0) *
            (self.start_level - self.end_level)
    }
}

#[derive(Clone, Serialize)]
pub struct UsageSample {
    pub timestamp: f64,
    pub level: f64,
}

/// Piecewise-constant profile replayed from timestamped samples.
/// Timestamps are relative to the container start.
#[derive(Clone, Default, Serialize)]
pub struct TraceLoad {
    samples: Vec<UsageSample>,
    cursor: usize,
}

impl TraceLoad {
    pub fn new(samples: Vec<UsageSample>) -> Self {
        Self { samples, cursor: 0 }
    }
}

impl LoadProfile for TraceLoad {
    fn usage(&mut self, _time: f64, time_from_start: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        if self.samples[self.cursor].timestamp > time_from_start {
            self.cursor = 0;
        }
        while self.cursor + 1 < self.samples.len()
            && self.samples[self.cursor + 1].timestamp <= time_from_start {
            self.cursor += 1;
        }
        self.samples[self.cursor].level
    }
}

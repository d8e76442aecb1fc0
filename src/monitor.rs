//! Simulated monitoring source.
//!
//! Derives per-host readings from the load profiles of the containers
//! running on each host, with a little jitter from the simulation RNG,
//! and pushes them to the control loop on a fixed interval. The decision
//! core never depends on this cadence; it only reads the latest snapshot.

use std::cell::RefCell;
use std::rc::Rc;
use cast::f64;
use dslab_core::{cast, Event, EventHandler, SimulationContext};
use crate::container::ContainerState;
use crate::control::ControlLoop;
use crate::events::monitoring::{HostMetricsReport, MonitoringCycle};
use crate::host::HostMetrics;
use crate::simulation_config::SimulationConfig;

pub struct FleetMonitor {
    pub id: u32,
    control: Rc<RefCell<ControlLoop>>,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl FleetMonitor {
    pub fn new(control: Rc<RefCell<ControlLoop>>, ctx: SimulationContext,
               sim_config: Rc<SimulationConfig>) -> Self {
        ctx.emit(MonitoringCycle {}, ctx.id(), sim_config.metrics_interval);
        Self {
            id: ctx.id(),
            control,
            ctx,
            sim_config,
        }
    }

    fn collect_readings(&mut self) {
        let time = self.ctx.time();
        let mut readings = Vec::default();
        let mut control = self.control.borrow_mut();
        let control_id = control.id;
        let (hosts, containers) = control.registries_mut();
        for (host_id, host) in hosts.hosts() {
            let host = host.borrow();
            if !host.is_powered() {
                readings.push((*host_id, HostMetrics {
                    timestamp: time,
                    cpu_utilization: 0.0,
                    memory_utilization: 0.0,
                    power_watts: 0.0,
                    temperature_c: 22.0,
                    latency_ms: 0.0,
                    throughput_mbps: 0.0,
                }));
                continue;
            }

            let mut cpu_used = 0.0;
            let mut memory_used = 0.0;
            let mut running = 0;
            for container_id in &host.containers {
                if let Some(container) = containers.get_mut(*container_id) {
                    if container.state == ContainerState::Running {
                        cpu_used += container.cpu_usage(time);
                        memory_used += container.memory_usage(time);
                        running += 1;
                    }
                }
            }

            let cpu_utilization = (cpu_used / f64(host.cpu_total)
                + self.ctx.gen_range(-0.02..0.02)).clamp(0.0, 1.0);
            let memory_utilization = (memory_used / host.memory_total
                + self.ctx.gen_range(-0.02..0.02)).clamp(0.0, 1.0);
            let power_watts = host.power_at(cpu_utilization);
            let temperature_c = 35.0 + 25.0 * cpu_utilization + self.ctx.gen_range(-2.0..2.0);
            let latency_ms = (10.0 + 50.0 * cpu_utilization
                + self.ctx.gen_range(-5.0..5.0)).clamp(5.0, 100.0);
            let throughput_factor = (0.7 * cpu_utilization + 0.3 * memory_utilization)
                * running as f64;
            let throughput_mbps = (100.0 + 50.0 * throughput_factor
                + self.ctx.gen_range(-10.0..10.0)).clamp(50.0, 1000.0);

            readings.push((*host_id, HostMetrics {
                timestamp: time,
                cpu_utilization,
                memory_utilization,
                power_watts,
                temperature_c,
                latency_ms,
                throughput_mbps,
            }));
        }
        drop(control);

        for (host_id, metrics) in readings {
            self.ctx.emit(HostMetricsReport { host_id, metrics },
                          control_id, self.sim_config.message_delay);
        }
    }
}

impl EventHandler for FleetMonitor {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            MonitoringCycle {} => {
                self.collect_readings();
                self.ctx.emit(MonitoringCycle {}, self.id, self.sim_config.metrics_interval);
            }
        })
    }
}

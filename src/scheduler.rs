//! Energy-aware container scheduler.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::rc::Rc;
use std::time::Instant;
use dslab_core::{cast, Event, EventHandler, SimulationContext};
use log::{debug, warn};
use crate::container::{Container, ContainerState};
use crate::control::ControlLoop;
use crate::events::placement::{PlacementDecided, PlacementFailed};
use crate::events::scheduling::{BacklogRetry, MoveRequest, SchedulingCycle};
use crate::placement_strategy::{schedule_with, PlacementStrategy};
use crate::registry::PlacementError;
use crate::simulation_config::SimulationConfig;

/// Picks destination hosts for pending containers, one per scheduling
/// cycle, highest tier first. Containers with no feasible host go to the
/// backlog and are retried with exponential backoff, or immediately once
/// the fleet topology changes.
pub struct EnergyScheduler {
    pub id: u32,
    control: Rc<RefCell<ControlLoop>>,
    strategy: Box<dyn PlacementStrategy>,

    queue: BinaryHeap<Container>,
    /// Containers awaiting a backoff retry.
    unschedulable_queue: BTreeSet<u64>,
    /// Consecutive failed attempts per container, cleared on success.
    attempts: BTreeMap<u64, u32>,

    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl EnergyScheduler {
    pub fn new(control: Rc<RefCell<ControlLoop>>, strategy: Box<dyn PlacementStrategy>,
               ctx: SimulationContext, sim_config: Rc<SimulationConfig>) -> Self {
        Self {
            id: ctx.id(),
            control,
            strategy,
            queue: BinaryHeap::default(),
            unschedulable_queue: BTreeSet::default(),
            attempts: BTreeMap::default(),
            ctx,
            sim_config,
        }
    }

    /// Queue a container for placement. Every enqueue arms exactly one
    /// scheduling cycle, so each cycle pops at most one entry.
    pub fn enqueue(&mut self, container: Container) {
        self.queue.push(container);
        self.ctx.emit(SchedulingCycle {}, self.id,
                      self.sim_config.control_plane_message_delay);
    }

    fn backoff_duration(&self, attempts: u32) -> f64 {
        let backoff = self.sim_config.backoff_initial * 2f64.powi(attempts.saturating_sub(1) as i32);
        backoff.min(self.sim_config.backoff_max)
    }

    fn schedule_next_container(&mut self) {
        let container = match self.queue.pop() {
            Some(container) => container,
            None => return,
        };
        // The entry may be stale: terminated while queued, or already
        // placed after a topology-change requeue.
        {
            let control = self.control.borrow();
            match control.container_registry().get(container.id) {
                Some(current) if current.state == ContainerState::Pending => {}
                _ => {
                    self.attempts.remove(&container.id);
                    return;
                }
            }
        }

        let mut elapsed_time = self.sim_config.control_plane_message_delay;
        let start_of_algorithm_work = Instant::now();
        let result = {
            let control = self.control.borrow();
            schedule_with(self.strategy.as_ref(), &container, control.host_registry(),
                          &self.sim_config.policy)
        };
        elapsed_time += start_of_algorithm_work.elapsed().as_secs_f64();
        let control_id = self.control.borrow().id;

        match result {
            Ok(decision) => {
                debug!("scheduler: container {} -> host {} (score {:.3})",
                       decision.container_id, decision.host, decision.score);
                self.attempts.remove(&container.id);
                self.ctx.emit(PlacementDecided { decision }, control_id, elapsed_time);
            }
            Err(PlacementError::NoCapacityAvailable) => {
                let attempts = self.attempts.get(&container.id).copied().unwrap_or(0) + 1;
                self.attempts.insert(container.id, attempts);
                self.unschedulable_queue.insert(container.id);
                let backoff = self.backoff_duration(attempts);
                warn!("scheduler: no capacity for container {} (attempt {}), retry in {:.1}s",
                      container.id, attempts, backoff);
                self.ctx.emit(BacklogRetry { container_id: container.id }, self.id,
                              elapsed_time + backoff);
                self.ctx.emit(PlacementFailed { container_id: container.id, attempts: attempts as u64 },
                              control_id, elapsed_time);
            }
        }
    }

    /// Move a backlog entry back into the scheduling queue.
    fn requeue_from_backlog(&mut self, container_id: u64) {
        if !self.unschedulable_queue.remove(&container_id) {
            return;
        }
        let container = self.control.borrow().container_registry().get(container_id).cloned();
        match container {
            Some(container) if container.state == ContainerState::Pending => self.enqueue(container),
            _ => {
                self.attempts.remove(&container_id);
            }
        }
    }

    fn flush_backlog(&mut self) {
        let backlogged: Vec<u64> = self.unschedulable_queue.iter().copied().collect();
        for container_id in backlogged {
            self.requeue_from_backlog(container_id);
        }
    }
}

impl EventHandler for EnergyScheduler {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            SchedulingCycle {} => {
                self.schedule_next_container();
            }
            BacklogRetry { container_id } => {
                self.requeue_from_backlog(container_id);
            }
            MoveRequest {} => {
                self.flush_backlog();
            }
        })
    }
}

//! Periodic consolidation pass over the fleet.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use dslab_core::{cast, Event, EventHandler, SimulationContext};
use log::debug;
use crate::consolidation_strategy::ConsolidationStrategy;
use crate::control::ControlLoop;
use crate::events::consolidation::{ApplyMigrationPlan, ConsolidationCycle};
use crate::simulation_config::SimulationConfig;

/// Runs the consolidation strategy on its own interval and hands the
/// resulting plan to the control loop. Holds no fleet state itself.
pub struct ConsolidationEngine {
    pub id: u32,
    control: Rc<RefCell<ControlLoop>>,
    strategy: Box<dyn ConsolidationStrategy>,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl ConsolidationEngine {
    pub fn new(control: Rc<RefCell<ControlLoop>>, strategy: Box<dyn ConsolidationStrategy>,
               ctx: SimulationContext, sim_config: Rc<SimulationConfig>) -> Self {
        ctx.emit(ConsolidationCycle {}, ctx.id(), sim_config.consolidation_interval);
        Self {
            id: ctx.id(),
            control,
            strategy,
            ctx,
            sim_config,
        }
    }

    fn run_cycle(&mut self) {
        let start_of_algorithm_work = Instant::now();
        let plan = {
            let control = self.control.borrow();
            self.strategy.plan(control.host_registry(), control.container_registry(),
                               &self.sim_config.policy)
        };
        let mut elapsed_time = self.sim_config.control_plane_message_delay;
        elapsed_time += start_of_algorithm_work.elapsed().as_secs_f64();

        if !plan.is_empty() {
            debug!("consolidation pass at {:.1}: {} move(s), {} shutdown(s)",
                   self.ctx.time(), plan.moves.len(), plan.shutdowns.len());
            self.ctx.emit(ApplyMigrationPlan { plan }, self.control.borrow().id, elapsed_time);
        }
    }
}

impl EventHandler for ConsolidationEngine {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ConsolidationCycle {} => {
                self.run_cycle();
                self.ctx.emit(ConsolidationCycle {}, self.id,
                              self.sim_config.consolidation_interval);
            }
        })
    }
}

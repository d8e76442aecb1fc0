pub mod consolidation;
pub mod consolidation_strategy;
pub mod container;
pub mod control;
pub mod default_consolidation_strategies;
pub mod default_placement_strategies;
pub mod energy_log;
pub mod energy_meter;
pub mod events;
pub mod host;
pub mod load_profile;
pub mod logger;
pub mod monitor;
pub mod placement_strategy;
pub mod registry;
pub mod scheduler;
pub mod simulation;
pub mod simulation_config;
pub mod simulation_metrics;
pub mod workload;

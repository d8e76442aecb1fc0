pub mod energy_aware_strategy;
pub mod packing_strategy;

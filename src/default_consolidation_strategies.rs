pub mod threshold_strategy;

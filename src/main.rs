use dslab_core::Simulation;
use greendc_sim::logger::StdoutLogger;
use greendc_sim::simulation::DcSimulation;
use greendc_sim::simulation_config::SimulationConfig;
use greendc_sim::simulation_metrics::FileMetricsLogger;
use greendc_sim::workload::WorkloadGenerator;

fn main() {
    let config_path = std::env::args().nth(1)
        .unwrap_or_else(|| "configs/default.yaml".to_string());
    let sim_config = SimulationConfig::from_file(&config_path);
    let duration = sim_config.simulation_duration;

    let sim = Simulation::new(42);
    let mut dc_sim = DcSimulation::new(sim,
                                       Box::new(FileMetricsLogger::new(60.)),
                                       Box::new(StdoutLogger::new()),
                                       sim_config,
                                       None, None);

    // Stagger a demo workload mix on top of whatever the config defines.
    let mut generator = WorkloadGenerator::new(42);
    for i in 0..12 {
        let spec = generator.next_workload();
        dc_sim.submit_workload(&spec, 10.0 + 5.0 * i as f64);
    }

    dc_sim.step_for_duration(duration);

    let kpis = dc_sim.kpis();
    println!("--------------------------------------------------");
    println!("Simulated {:.0} s of fleet operation", dc_sim.current_time());
    println!("Active hosts:        {}", dc_sim.active_host_count());
    println!("Total energy:        {:.1} Wh", kpis.total_energy_wh);
    println!("Estimated savings:   {:.1} Wh", kpis.estimated_savings_wh);
    println!("Average fleet power: {:.1} W", kpis.average_power_watts);
    println!("Migrations applied:  {}", kpis.total_migrations);
    println!("Hosts powered off:   {}", kpis.total_shutdowns);

    dc_sim.finish_simulation("./results.json").unwrap();
    dc_sim.save_kpis("./kpis.json").unwrap();
    dc_sim.save_energy_log("./energy_log.csv").unwrap();
}

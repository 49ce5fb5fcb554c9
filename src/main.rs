use noc_sim::traffic::{SyncGenerator, SyncParams, TrafficSource};
use noc_sim::{
    ActivityCounter, NodeId, SimConfig, Simulation, SwitchingKind, TrafficPattern,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // An optional TOML config path; defaults otherwise.
    let config = match std::env::args().nth(1) {
        Some(path) => match SimConfig::from_toml_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("cannot load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SimConfig::default(),
    };

    println!("=== NoC Discrete-Event Simulator ===\n");

    run_uniform_random(&config);
    run_bit_complement();
    run_deterministic_replay();
    run_single_packet_demo();

    println!("=== All scenarios completed ===");
}

/// The configured (or default) mesh under uniform-random traffic.
fn run_uniform_random(config: &SimConfig) {
    println!("--- Scenario 1: uniform random traffic ---");
    let report = run(config.clone());
    println!("{}", report);
}

/// Every node sends to its bitwise-complemented coordinates.
fn run_bit_complement() {
    println!("--- Scenario 2: bit-complement pattern on a 4x4 mesh ---");
    let config = SimConfig {
        traffic_pattern: TrafficPattern::BitComplement,
        warmup_cycles: 100,
        simulation_cycles: 1_100,
        ..SimConfig::default()
    };
    let report = run(config);
    println!("{}", report);
}

/// Two runs with one seed must agree bit for bit.
fn run_deterministic_replay() {
    println!("--- Scenario 3: deterministic replay ---");
    let config = SimConfig {
        seed: 12345,
        warmup_cycles: 50,
        simulation_cycles: 550,
        ..SimConfig::default()
    };
    let a = run(config.clone());
    let b = run(config);
    assert_eq!(a.injected_flits, b.injected_flits);
    assert_eq!(a.ejected_flits, b.ejected_flits);
    assert_eq!(a.average_latency_cycles, b.average_latency_cycles);
    println!(
        "two runs with seed 12345 both moved {} flits at {:?} cycles average\n",
        a.ejected_flits, a.average_latency_cycles
    );
}

/// One 3-flit packet across opposite corners of the mesh, with the
/// per-router activity recorder attached.
fn run_single_packet_demo() {
    println!("--- Scenario 4: single packet, corner to corner ---");
    let config = SimConfig {
        switching: SwitchingKind::Wormhole,
        warmup_cycles: 0,
        simulation_cycles: 100,
        ..SimConfig::default()
    };
    let mut sim = match Simulation::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("build failed: {}", e);
            std::process::exit(1);
        }
    };
    sim.set_power_hook(Box::new(ActivityCounter::new(sim.network().node_count())));

    let params = SyncParams {
        injection_probability: 1.0,
        flits_per_packet: 3,
        pattern: TrafficPattern::DestinationSpecified,
        destination: Some(NodeId(15)),
        max_flits: 3,
        max_bytes: 0,
    };
    let source = TrafficSource::Sync(SyncGenerator::new(NodeId(0), params));
    if let Err(e) = sim.attach_source(NodeId(0), source) {
        eprintln!("attach failed: {}", e);
        std::process::exit(1);
    }

    match sim.run() {
        Ok(report) => println!("{}", report),
        Err(e) => {
            eprintln!("simulation failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(config: SimConfig) -> noc_sim::SimReport {
    let mut sim = match Simulation::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("build failed: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = sim.attach_sync_sources() {
        eprintln!("attach failed: {}", e);
        std::process::exit(1);
    }
    match sim.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("simulation failed: {}", e);
            std::process::exit(1);
        }
    }
}

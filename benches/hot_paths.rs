use criterion::{black_box, criterion_group, criterion_main, Criterion};

use noc_sim::{SimConfig, Simulation, TrafficPattern};

fn bench_uniform_random_mesh(c: &mut Criterion) {
    c.bench_function("mesh_4x4_uniform_200_cycles", |b| {
        b.iter(|| {
            let config = SimConfig {
                traffic_pattern: TrafficPattern::UniformRandom,
                flits_per_packet: 3,
                warmup_cycles: 10,
                simulation_cycles: 210,
                ..SimConfig::default()
            };
            let mut sim = Simulation::new(config).expect("config is valid");
            sim.attach_sync_sources().expect("sources attach");
            black_box(sim.run().expect("run completes"))
        })
    });
}

fn bench_network_build(c: &mut Criterion) {
    c.bench_function("build_8x8_mesh", |b| {
        b.iter(|| {
            let config = SimConfig {
                nodes: 64,
                h_size: 8,
                ..SimConfig::default()
            };
            black_box(Simulation::new(config).expect("config is valid"))
        })
    });
}

criterion_group!(benches, bench_uniform_random_mesh, bench_network_build);
criterion_main!(benches);

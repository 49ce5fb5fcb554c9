//! End-to-end latency on uncontended meshes.
//!
//! With one flit per clock and wormhole switching, an uncontended packet
//! pipelines perfectly: the tail ejects `hops + flits - 1` cycles after the
//! head was injected.

use noc_sim::traffic::{SyncGenerator, SyncParams, TrafficSource};
use noc_sim::{NodeId, SimConfig, Simulation, SwitchingKind, TrafficPattern, VirtualTime};

fn single_packet_source(node: NodeId, dst: NodeId, flits: u32) -> TrafficSource {
    TrafficSource::Sync(SyncGenerator::new(
        node,
        SyncParams {
            injection_probability: 1.0,
            flits_per_packet: flits,
            pattern: TrafficPattern::DestinationSpecified,
            destination: Some(dst),
            max_flits: flits as u64,
            max_bytes: 0,
        },
    ))
}

#[test]
fn test_two_node_mesh_single_hop() {
    // INVARIANT: one 3-flit packet over one hop completes at 3 * clock.
    let config = SimConfig {
        nodes: 2,
        h_size: 2,
        flits_per_packet: 3,
        switching: SwitchingKind::Wormhole,
        warmup_cycles: 0,
        simulation_cycles: 50,
        ..SimConfig::default()
    };
    let clock = config.clock();
    let mut sim = Simulation::new(config).unwrap();
    sim.attach_source(NodeId(0), single_packet_source(NodeId(0), NodeId(1), 3))
        .unwrap();

    let report = sim.run().unwrap();

    assert_eq!(report.injected_flits, 3);
    assert_eq!(report.ejected_flits, 3);
    assert_eq!(report.completed_packets, 1);
    assert_eq!(report.unconsumed_flits, 0);
    assert_eq!(report.average_latency_cycles, Some(3.0));

    let packet = &sim.stats().completed_packets()[0];
    assert_eq!(packet.injected_at, VirtualTime::ZERO);
    assert_eq!(packet.completed_at, Some(VirtualTime::ZERO + clock * 3));
    assert_eq!(packet.src, Some(NodeId(0)));
    assert_eq!(packet.dst, NodeId(1));
}

#[test]
fn test_4x4_opposite_corners_cross_traffic() {
    // Two 3-flit packets between opposite corners: 6 hops each, latency
    // 6 + 3 - 1 = 8 cycles, and the XY paths do not contend.
    let config = SimConfig {
        flits_per_packet: 3,
        switching: SwitchingKind::Wormhole,
        warmup_cycles: 0,
        simulation_cycles: 100,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    sim.attach_source(NodeId(0), single_packet_source(NodeId(0), NodeId(15), 3))
        .unwrap();
    sim.attach_source(NodeId(15), single_packet_source(NodeId(15), NodeId(0), 3))
        .unwrap();

    let report = sim.run().unwrap();

    assert_eq!(report.injected_flits, 6);
    assert_eq!(report.ejected_flits, 6);
    assert_eq!(report.completed_packets, 2);
    assert_eq!(report.average_latency_cycles, Some(8.0));

    for packet in sim.stats().completed_packets() {
        let latency = packet.completed_at.unwrap() - packet.injected_at;
        assert_eq!(latency.as_picos(), 8_000);
    }
}

#[test]
fn test_latency_bounded_below_by_hop_count() {
    // receive_time >= inject_time + hops * clock for every completed packet.
    let config = SimConfig {
        flits_per_packet: 4,
        warmup_cycles: 0,
        simulation_cycles: 60,
        ..SimConfig::default()
    };
    let clock = config.clock();
    let mut sim = Simulation::new(config).unwrap();
    // 0 -> 10 is (0,0) -> (2,2): 4 hops.
    sim.attach_source(NodeId(0), single_packet_source(NodeId(0), NodeId(10), 4))
        .unwrap();

    sim.run().unwrap();

    let packets = sim.stats().completed_packets();
    assert_eq!(packets.len(), 1);
    let packet = &packets[0];
    let floor = packet.injected_at + clock * 4;
    assert!(packet.completed_at.unwrap() >= floor);
}

#[test]
fn test_data_flit_speedup_shortens_packets() {
    // speedup 2: body flits injected every clock/2, but forwarding still
    // takes one flit per clock on the wire, so the tail cannot beat the
    // pipeline floor.
    let config = SimConfig {
        nodes: 2,
        h_size: 2,
        flits_per_packet: 3,
        data_flit_speedup: 2,
        warmup_cycles: 0,
        simulation_cycles: 50,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    sim.attach_source(NodeId(0), single_packet_source(NodeId(0), NodeId(1), 3))
        .unwrap();

    let report = sim.run().unwrap();
    assert_eq!(report.completed_packets, 1);
    assert_eq!(report.ejected_flits, 3);
    // Injection at 0, 500, 1000 ps; the wire serializes at 1 flit/clock.
    assert_eq!(report.average_latency_cycles, Some(3.0));
}

#[test]
fn test_torus_wraparound_shortens_route() {
    // On a 4x4 torus, corner to corner is 2 hops (one wrap per dimension)
    // instead of the mesh's 6.
    let config = SimConfig {
        topology: noc_sim::TopologyLayout::Torus2d,
        flits_per_packet: 3,
        warmup_cycles: 0,
        simulation_cycles: 50,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    sim.attach_source(NodeId(0), single_packet_source(NodeId(0), NodeId(15), 3))
        .unwrap();

    let report = sim.run().unwrap();
    assert_eq!(report.completed_packets, 1);
    // 2 hops + 3 flits - 1 = 4 cycles.
    assert_eq!(report.average_latency_cycles, Some(4.0));
}

//! Instantiates and wires the network: one router per node, two link ports
//! per dimension plus injection and ejection, and one full-duplex channel
//! per adjacent port pair. Port creation order is fixed so router port
//! lookup is O(1).

use tracing::{debug, info};

use crate::config::SimConfig;
use crate::error::Result;
use crate::network::channel::{Channel, ChannelId};
use crate::network::device::{DeviceId, NetDevice, PortDirection, PortRole};
use crate::network::node::Node;
use crate::network::router::{Router, RouterKind};
use crate::network::{Network, NodeId};
use crate::routing::DimensionOrderRouting;

pub fn build_network(config: &SimConfig) -> Result<Network> {
    let topology = config.topology_kind()?;
    let dims = topology.dimensions();
    let node_count = topology.node_count() as usize;
    let buffer_capacity = config.buffer_size as usize;

    let mut nodes = Vec::with_capacity(node_count);
    let mut routers = Vec::with_capacity(node_count);
    let mut devices: Vec<NetDevice> = Vec::new();

    // Per node: link ports in (dimension, direction) order, then injection
    // (and the Irvine right-half injection), then ejection.
    let mut link_ports: Vec<Vec<DeviceId>> = Vec::with_capacity(node_count);

    for n in 0..node_count {
        let node_id = NodeId(n);
        let mut local_index = 0u32;
        let mut ports = Vec::with_capacity(dims * 2);

        for dim in 0..dims as u8 {
            for direction in [PortDirection::Forward, PortDirection::Back] {
                let id = DeviceId(devices.len());
                devices.push(NetDevice::new(
                    id,
                    node_id,
                    PortRole::Link { direction, dimension: dim },
                    buffer_capacity,
                    local_index,
                ));
                ports.push(id);
                local_index += 1;
            }
        }

        let injection = DeviceId(devices.len());
        devices.push(NetDevice::new(
            injection,
            node_id,
            PortRole::Injection,
            buffer_capacity,
            local_index,
        ));
        local_index += 1;

        let injection_right = if config.router_kind == RouterKind::Irvine {
            let id = DeviceId(devices.len());
            devices.push(NetDevice::new(
                id,
                node_id,
                PortRole::Injection,
                buffer_capacity,
                local_index,
            ));
            local_index += 1;
            Some(id)
        } else {
            None
        };

        let ejection = DeviceId(devices.len());
        devices.push(NetDevice::new(
            ejection,
            node_id,
            PortRole::Ejection,
            buffer_capacity,
            local_index,
        ));

        let routing = DimensionOrderRouting::from_axis_preference(config.route_x_first, dims);
        routers.push(Router::new(
            node_id,
            config.router_kind,
            ports.clone(),
            injection,
            injection_right,
            ejection,
            Box::new(routing),
            config.switching.instantiate(),
            config.track_load,
        ));
        nodes.push(Node::new(node_id, topology.coordinates_of(node_id)));
        link_ports.push(ports);
    }

    // One channel per adjacent pair: the forward port of each node connects
    // to the back port of its forward neighbor. Tori wrap; mesh edges stay
    // unconnected.
    let mut channels = Vec::new();
    let bandwidth = config.bandwidth_bps();
    let delay = config.channel_delay();
    for dim in 0..dims {
        for n in 0..node_count {
            let Some(neighbor) = topology.neighbor(NodeId(n), dim, true) else {
                continue;
            };
            if neighbor.0 == n {
                // One-wide torus dimension; no link to make.
                continue;
            }
            let out_port = link_ports[n][dim * 2];
            let in_port = link_ports[neighbor.0][dim * 2 + 1];
            let id = ChannelId(channels.len());
            let mut channel = Channel::new(
                id,
                out_port,
                in_port,
                bandwidth,
                delay,
                config.channel_length_um,
            );
            channel.set_full_duplex(config.channel_full_duplex);
            devices[out_port.0].channel = Some(id);
            devices[in_port.0].channel = Some(id);
            debug!(
                channel = id.0,
                from = n,
                to = neighbor.0,
                dimension = dim,
                "wired channel"
            );
            channels.push(channel);
        }
    }

    info!(
        nodes = node_count,
        devices = devices.len(),
        channels = channels.len(),
        topology = ?topology.layout(),
        "network built"
    );

    Ok(Network {
        topology,
        nodes,
        routers,
        devices,
        channels,
    })
}

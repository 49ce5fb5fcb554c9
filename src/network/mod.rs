//! The built network: nodes, routers, ports and channels in flat arenas
//! addressed by typed indices. Back-references (a port's channel, a
//! channel's endpoints) are plain ids, so there is no ownership cycle.

pub mod buffer;
pub mod channel;
pub mod device;
pub mod node;
pub mod router;

pub use buffer::InputBuffer;
pub use channel::{Channel, ChannelEnd, ChannelId, ChannelState};
pub use device::{DeviceId, NetDevice, PortDirection, PortRole};
pub use node::Node;
pub use router::{IrvineHalf, RouteRecord, Router, RouterKind, RouterLoad};

use crate::fault::FaultTarget;
use crate::topology::TopologyKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct Network {
    pub topology: TopologyKind,
    pub nodes: Vec<Node>,
    /// Indexed by node: router i belongs to node i.
    pub routers: Vec<Router>,
    pub devices: Vec<NetDevice>,
    pub channels: Vec<Channel>,
}

impl Network {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Flip the faulty flag of one component. The flag does not propagate:
    /// neighbors of a faulty component stay healthy, they just cannot reach
    /// it.
    pub fn set_faulty(&mut self, target: FaultTarget, faulty: bool) {
        match target {
            FaultTarget::Node(id) => self.nodes[id.0].faulty = faulty,
            FaultTarget::Router(id) => self.routers[id.0].faulty = faulty,
            FaultTarget::Device(id) => self.devices[id.0].faulty = faulty,
            FaultTarget::Channel(id) => self.channels[id.0].set_faulty(faulty),
        }
    }

    pub fn is_router_reachable(&self, node: NodeId) -> bool {
        !self.nodes[node.0].faulty && !self.routers[node.0].faulty
    }

    /// Flits still resident anywhere, for the stop-time watchdog: buffered
    /// flits per device plus flits latched or propagating on channels.
    pub fn buffered_flits(&self) -> Vec<(DeviceId, usize)> {
        self.devices
            .iter()
            .filter(|d| !d.buffer.is_empty())
            .map(|d| (d.id, d.buffer.len()))
            .collect()
    }

    pub fn in_flight_flits(&self) -> usize {
        self.channels.iter().map(|c| c.in_flight()).sum()
    }

    pub fn unconsumed_flits(&self) -> usize {
        self.buffered_flits().iter().map(|(_, n)| n).sum::<usize>() + self.in_flight_flits()
    }
}

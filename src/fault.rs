//! Fault injection: mark a node, router, port or channel faulty at a given
//! simulated time. A faulty component refuses every operation with
//! `ComponentFaulty`; flits already buffered inside it stay strictly in
//! place, and the flag never propagates to neighbors.

use crate::engine::VirtualTime;
use crate::network::channel::ChannelId;
use crate::network::device::DeviceId;
use crate::network::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultTarget {
    Node(NodeId),
    Router(NodeId),
    Device(DeviceId),
    Channel(ChannelId),
}

impl std::fmt::Display for FaultTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultTarget::Node(id) => write!(f, "node {}", id),
            FaultTarget::Router(id) => write!(f, "router {}", id),
            FaultTarget::Device(id) => write!(f, "net device {}", id.0),
            FaultTarget::Channel(id) => write!(f, "{}", id),
        }
    }
}

/// A fault scheduled for a simulated instant. Collected before the run and
/// turned into zero-cost events that flip the target's flag when they fire.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledFault {
    pub target: FaultTarget,
    pub at: VirtualTime,
}

#[derive(Debug, Default)]
pub struct FaultInjector {
    pending: Vec<ScheduledFault>,
}

impl FaultInjector {
    pub fn new() -> Self {
        FaultInjector::default()
    }

    pub fn set_faulty_at(&mut self, target: FaultTarget, at: VirtualTime) {
        self.pending.push(ScheduledFault { target, at });
    }

    pub fn drain(&mut self) -> Vec<ScheduledFault> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(FaultTarget::Router(NodeId(4)).to_string(), "router 4");
        assert_eq!(FaultTarget::Channel(ChannelId(2)).to_string(), "channel 2");
    }

    #[test]
    fn test_drain_empties() {
        let mut inj = FaultInjector::new();
        inj.set_faulty_at(FaultTarget::Node(NodeId(0)), VirtualTime(100));
        assert_eq!(inj.drain().len(), 1);
        assert!(inj.drain().is_empty());
    }
}

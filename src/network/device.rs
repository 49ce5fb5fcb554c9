use super::channel::ChannelId;
use super::buffer::InputBuffer;
use super::NodeId;

/// Arena index of a net device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub usize);

/// Which way along a dimension a link port faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Toward increasing coordinates.
    Forward,
    /// Toward decreasing coordinates.
    Back,
}

impl PortDirection {
    pub fn opposite(self) -> PortDirection {
        match self {
            PortDirection::Forward => PortDirection::Back,
            PortDirection::Back => PortDirection::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// Ordinary port: one per `(direction, dimension)` pair.
    Link {
        direction: PortDirection,
        dimension: u8,
    },
    /// Local-to-network virtual port; has no channel peer.
    Injection,
    /// Network-to-local virtual port; flits are consumed here.
    Ejection,
}

/// A router port. Owns the input buffer of its inbound link and knows which
/// channel (if any) it participates in.
#[derive(Debug)]
pub struct NetDevice {
    pub id: DeviceId,
    pub node: NodeId,
    pub role: PortRole,
    pub buffer: InputBuffer,
    pub channel: Option<ChannelId>,
    pub faulty: bool,
    /// Position in the owning node's device list, for trace paths.
    pub local_index: u32,
}

impl NetDevice {
    pub fn new(id: DeviceId, node: NodeId, role: PortRole, buffer_capacity: usize, local_index: u32) -> Self {
        NetDevice {
            id,
            node,
            role,
            buffer: InputBuffer::new(buffer_capacity),
            channel: None,
            faulty: false,
            local_index,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self.role, PortRole::Link { .. })
    }

    pub fn direction(&self) -> Option<PortDirection> {
        match self.role {
            PortRole::Link { direction, .. } => Some(direction),
            _ => None,
        }
    }

    pub fn dimension(&self) -> Option<u8> {
        match self.role {
            PortRole::Link { dimension, .. } => Some(dimension),
            _ => None,
        }
    }
}

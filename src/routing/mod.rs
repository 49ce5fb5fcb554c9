//! Routing protocols decide, per hop, which outbound port drives a head
//! flit one unit closer to its destination. The only side effect per hop is
//! the header rewrite carried in the returned decision; port resolution and
//! forwarding belong to the router pipeline.

pub mod dor;

pub use dor::DimensionOrderRouting;

use crate::error::Result;
use crate::flit::Header;
use crate::network::device::PortDirection;

#[derive(Debug, Clone)]
pub enum RoutingDecision {
    /// All offsets are zero: hand the flit to the ejection port.
    Eject,
    /// Take the `(direction, dimension)` port; enqueue the rewritten header
    /// downstream.
    Link {
        dimension: u8,
        direction: PortDirection,
        rewritten: Header,
    },
}

pub trait RoutingProtocol: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Pick the next hop for `header`. Deterministic and side-effect free.
    fn decide(&self, header: &Header) -> Result<RoutingDecision>;
}

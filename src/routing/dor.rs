//! Dimension-Order Routing (XY for 2D, XYZ for 3D).
//!
//! Deterministic and oblivious: route the lowest-priority-index dimension
//! whose offset is non-zero, decrement its magnitude by one, and preserve
//! the sign bit on write-back even when the magnitude reaches zero. Tori
//! need no extra logic here because the topology builder already picked the
//! minimum-magnitude offset at injection time.

use tracing::trace;

use crate::error::{NocError, Result};
use crate::flit::{Header, Sign};
use crate::network::device::PortDirection;

use super::{RoutingDecision, RoutingProtocol};

#[derive(Debug, Clone)]
pub struct DimensionOrderRouting {
    /// Dimension priority permutation; index 0 is routed first.
    order: Vec<u8>,
}

impl DimensionOrderRouting {
    /// Canonical ascending order: X before Y (before Z).
    pub fn x_first(dimensions: usize) -> Self {
        DimensionOrderRouting {
            order: (0..dimensions as u8).collect(),
        }
    }

    /// Y (then Z) before X.
    pub fn y_first(dimensions: usize) -> Self {
        let mut order: Vec<u8> = (1..dimensions as u8).collect();
        order.push(0);
        DimensionOrderRouting { order }
    }

    pub fn from_axis_preference(route_x_first: bool, dimensions: usize) -> Self {
        if route_x_first {
            Self::x_first(dimensions)
        } else {
            Self::y_first(dimensions)
        }
    }

    /// Explicit permutation, e.g. `[2, 0, 1]` to route Z first.
    pub fn with_order(order: Vec<u8>) -> Result<Self> {
        let mut seen = vec![false; order.len()];
        for &d in &order {
            if (d as usize) >= order.len() || seen[d as usize] {
                return Err(NocError::config(format!(
                    "dimension order {:?} is not a permutation",
                    order
                )));
            }
            seen[d as usize] = true;
        }
        Ok(DimensionOrderRouting { order })
    }
}

impl RoutingProtocol for DimensionOrderRouting {
    fn name(&self) -> &'static str {
        "dimension-order"
    }

    fn decide(&self, header: &Header) -> Result<RoutingDecision> {
        for &dim in &self.order {
            let dim_idx = dim as usize;
            if dim_idx >= header.dimensions() {
                return Err(NocError::invariant(format!(
                    "routing order names dimension {} but the header has {}",
                    dim,
                    header.dimensions()
                )));
            }
            let magnitude = header.offset(dim_idx);
            if magnitude == 0 {
                continue;
            }
            // The checked_sub can only fail on a corrupted header; a flit
            // that reached magnitude zero is never routed in this dimension
            // again.
            let new_magnitude = magnitude.checked_sub(1).ok_or_else(|| {
                NocError::invariant(format!("offset underflow in dimension {}", dim))
            })?;
            let direction = match header.sign(dim_idx) {
                Sign::Forward => PortDirection::Forward,
                Sign::Back => PortDirection::Back,
            };
            let mut rewritten = header.clone();
            rewritten.set_offset(dim_idx, new_magnitude);
            trace!(
                dimension = dim,
                magnitude,
                new_magnitude,
                "dimension-order hop"
            );
            return Ok(RoutingDecision::Link {
                dimension: dim,
                direction,
                rewritten,
            });
        }
        Ok(RoutingDecision::Eject)
    }
}

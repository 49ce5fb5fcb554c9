//! The router: integrates ports, a routing protocol and a switching
//! protocol. The forwarding pipeline itself is driven by the simulation
//! loop; this type holds the per-router state it needs: the port table,
//! the per-packet route cache, the per-clock arrival tally for the power
//! hook, and the optional load component.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::flit::{FlitSummary, FlitUid, Header};
use crate::routing::RoutingProtocol;
use crate::switching::SwitchingProtocol;

use super::device::{DeviceId, PortDirection};
use super::NodeId;

/// Standard router, or the planar Irvine variant with two half-routers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouterKind {
    FourWay,
    Irvine,
}

/// Irvine half-routers. The right half owns the east-going (forward-X)
/// output and its injection device, the left half the west-going one;
/// ejection is shared. Once a flit's X offset reaches zero it stays in its
/// half, so no W->E or E->W turn can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrvineHalf {
    Left,
    Right,
}

/// Routing decision for one packet at one router, cached by head uid and
/// reused by the body and tail flits.
#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub out_device: DeviceId,
    pub downstream_device: DeviceId,
    /// Header with the decremented offset, applied to the head at departure.
    pub rewritten: Option<Header>,
    pub eject: bool,
}

/// Optional load component: arrivals in the last clock scaled against the
/// number of link ports, as a 0-100 figure.
#[derive(Debug, Default)]
pub struct RouterLoad {
    last_clock_arrivals: u32,
    neighbor_load_sum: u64,
    neighbor_load_samples: u64,
}

impl RouterLoad {
    pub fn on_clock(&mut self, arrivals: u32) {
        self.last_clock_arrivals = arrivals;
    }

    pub fn add_neighbor_load(&mut self, load: u8) {
        self.neighbor_load_sum += load as u64;
        self.neighbor_load_samples += 1;
    }

    pub fn load(&self, link_ports: u32) -> u8 {
        if link_ports == 0 {
            return 0;
        }
        let ratio = self.last_clock_arrivals as f64 / link_ports as f64;
        (ratio.min(1.0) * 100.0) as u8
    }

    pub fn average_neighbor_load(&self) -> f64 {
        if self.neighbor_load_samples == 0 {
            0.0
        } else {
            self.neighbor_load_sum as f64 / self.neighbor_load_samples as f64
        }
    }
}

#[derive(Debug)]
pub struct Router {
    pub node: NodeId,
    pub kind: RouterKind,
    /// Link ports in `(dimension, direction)` order:
    /// `[d0 forward, d0 back, d1 forward, d1 back, ...]`.
    ports: Vec<DeviceId>,
    injection: DeviceId,
    /// Second injection device of the Irvine right half.
    injection_right: Option<DeviceId>,
    ejection: DeviceId,
    pub routing: Box<dyn RoutingProtocol>,
    pub switching: Box<dyn SwitchingProtocol>,
    pub routes: HashMap<FlitUid, RouteRecord>,
    /// Irvine: body and tail flits must enter the same injection buffer as
    /// their head; bound at head injection, dropped at tail injection.
    pub injection_bindings: HashMap<FlitUid, DeviceId>,
    pub load: Option<RouterLoad>,
    pub faulty: bool,
    arrivals_this_clock: Vec<FlitSummary>,
    /// Rotates every tick so same-time arbitration is fair and deterministic.
    rr_offset: usize,
}

impl Router {
    pub fn new(
        node: NodeId,
        kind: RouterKind,
        ports: Vec<DeviceId>,
        injection: DeviceId,
        injection_right: Option<DeviceId>,
        ejection: DeviceId,
        routing: Box<dyn RoutingProtocol>,
        switching: Box<dyn SwitchingProtocol>,
        track_load: bool,
    ) -> Self {
        Router {
            node,
            kind,
            ports,
            injection,
            injection_right,
            ejection,
            routing,
            switching,
            routes: HashMap::new(),
            injection_bindings: HashMap::new(),
            load: track_load.then(RouterLoad::default),
            faulty: false,
            arrivals_this_clock: Vec::new(),
            rr_offset: 0,
        }
    }

    /// O(1) port lookup: the builder added ports in a fixed order.
    pub fn port_for(&self, direction: PortDirection, dimension: u8) -> Option<DeviceId> {
        let idx = dimension as usize * 2
            + match direction {
                PortDirection::Forward => 0,
                PortDirection::Back => 1,
            };
        self.ports.get(idx).copied()
    }

    pub fn link_ports(&self) -> &[DeviceId] {
        &self.ports
    }

    pub fn ejection_device(&self) -> DeviceId {
        self.ejection
    }

    pub fn injection_device(&self) -> DeviceId {
        self.injection
    }

    /// Which half of an Irvine router a packet belongs to, from its initial
    /// X direction. X-settled packets go right; they never turn in X again.
    pub fn half_for(&self, header: &Header) -> IrvineHalf {
        use crate::flit::Sign;
        if header.offset(0) > 0 && header.sign(0) == Sign::Back {
            IrvineHalf::Left
        } else {
            IrvineHalf::Right
        }
    }

    /// Injection device for a new head; Irvine routers pick per half.
    pub fn injection_device_for(&self, header: &Header) -> DeviceId {
        match (self.kind, self.injection_right) {
            (RouterKind::Irvine, Some(right)) => match self.half_for(header) {
                IrvineHalf::Left => self.injection,
                IrvineHalf::Right => right,
            },
            _ => self.injection,
        }
    }

    /// All devices whose buffers the tick loop must service, starting at the
    /// rotating round-robin offset.
    pub fn service_order(&self) -> Vec<DeviceId> {
        let mut order = Vec::with_capacity(self.ports.len() + 2);
        order.push(self.injection);
        if let Some(right) = self.injection_right {
            order.push(right);
        }
        let n = self.ports.len();
        for i in 0..n {
            order.push(self.ports[(self.rr_offset + i) % n]);
        }
        order
    }

    pub fn note_arrival(&mut self, summary: FlitSummary) {
        self.arrivals_this_clock.push(summary);
    }

    /// New clock tick: hand back the previous tick's arrivals (for the power
    /// hook), clear the tally and rotate the arbitration offset.
    pub fn roll_clock(&mut self) -> Vec<FlitSummary> {
        let arrivals = std::mem::take(&mut self.arrivals_this_clock);
        if let Some(load) = self.load.as_mut() {
            load.on_clock(arrivals.len() as u32);
        }
        if !self.ports.is_empty() {
            self.rr_offset = (self.rr_offset + 1) % self.ports.len();
        }
        arrivals
    }
}

//! Simulation-wide configuration.
//!
//! One builder-populated struct threaded through construction behind an
//! `Arc`, replacing the registry-singleton shape of classic NoC simulators:
//! every value is written before the first event fires and read-only
//! afterwards. Loadable from TOML; `validate` enforces the startup
//! invariants before anything is built.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{Duration, VirtualTime};
use crate::error::{NocError, Result};
use crate::network::router::RouterKind;
use crate::switching::SwitchingKind;
use crate::topology::{TopologyKind, TopologyLayout};
use crate::traffic::pattern::TrafficPattern;

const PICOS_PER_SECOND: u64 = 1_000_000_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Global clock frequency; the clock period is `10^12 / frequency_hz`
    /// picoseconds.
    pub frequency_hz: u64,
    pub nodes: u32,
    /// Nodes per row (the X dimension size).
    pub h_size: u32,
    /// Z dimension size for 3D layouts.
    pub v_size: Option<u32>,
    pub topology: TopologyLayout,
    pub router_kind: RouterKind,
    pub switching: SwitchingKind,
    pub flit_size_bytes: u32,
    pub flits_per_packet: u32,
    /// Body flits may be injected this many times faster than heads.
    pub data_flit_speedup: u32,
    /// Unset means one flit per clock.
    pub channel_bandwidth_bps: Option<u64>,
    pub channel_delay_ps: u64,
    pub channel_length_um: u32,
    pub channel_full_duplex: bool,
    /// Flits per input buffer.
    pub buffer_size: u32,
    pub route_x_first: bool,
    pub warmup_cycles: u64,
    pub simulation_cycles: u64,
    pub traffic_pattern: TrafficPattern,
    pub injection_probability: f64,
    /// Target node for the destination-specified pattern.
    pub destination_node: Option<u32>,
    pub ctg_iterations: u32,
    /// Drives the cores-energy line of the report for CTG runs.
    pub core_power_watts: f64,
    /// Enables the per-router load component.
    pub track_load: bool,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            frequency_hz: 1_000_000_000,
            nodes: 16,
            h_size: 4,
            v_size: None,
            topology: TopologyLayout::Mesh2d,
            router_kind: RouterKind::FourWay,
            switching: SwitchingKind::Wormhole,
            flit_size_bytes: 32,
            flits_per_packet: 9,
            data_flit_speedup: 1,
            channel_bandwidth_bps: None,
            channel_delay_ps: 0,
            channel_length_um: 50,
            channel_full_duplex: true,
            buffer_size: 9,
            route_x_first: true,
            warmup_cycles: 1000,
            simulation_cycles: 10000,
            traffic_pattern: TrafficPattern::UniformRandom,
            injection_probability: 1.0,
            destination_node: None,
            ctg_iterations: 1,
            core_power_watts: 0.0,
            track_load: false,
            seed: 42,
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frequency_hz == 0 || self.frequency_hz > PICOS_PER_SECOND {
            return Err(NocError::config(format!(
                "frequency {} Hz leaves no positive integer clock period",
                self.frequency_hz
            )));
        }
        let dims = self.topology.dimensions();
        if !(1..=127).contains(&dims) {
            return Err(NocError::config(format!("{} dimensions unsupported", dims)));
        }
        if self.nodes == 0 || self.h_size == 0 {
            return Err(NocError::config("nodes and h_size must be positive"));
        }
        if self.nodes % self.h_size != 0 {
            return Err(NocError::config(format!(
                "{} nodes do not divide into rows of {}",
                self.nodes, self.h_size
            )));
        }
        // Builds and checks dimension sizes against the 7-bit offset field.
        let topology = self.topology_kind()?;
        for (dim, &size) in topology.sizes().iter().enumerate() {
            let max_offset = if topology.is_torus() { size / 2 } else { size - 1 };
            if max_offset > 127 {
                return Err(NocError::config(format!(
                    "dimension {} size {} overflows the 7-bit offset field",
                    dim, size
                )));
            }
        }
        if self.simulation_cycles <= self.warmup_cycles {
            return Err(NocError::config(format!(
                "simulation_cycles ({}) must exceed warmup_cycles ({})",
                self.simulation_cycles, self.warmup_cycles
            )));
        }
        if !(0.0..=1.0).contains(&self.injection_probability) {
            return Err(NocError::config(format!(
                "injection probability {} outside [0, 1]",
                self.injection_probability
            )));
        }
        if self.flits_per_packet < 2 {
            return Err(NocError::config(format!(
                "flits_per_packet must be at least 2 (head + tail), got {}",
                self.flits_per_packet
            )));
        }
        if self.flit_size_bytes < self.header_size_bytes() {
            return Err(NocError::config(format!(
                "flit size {} cannot carry the {}-byte header",
                self.flit_size_bytes,
                self.header_size_bytes()
            )));
        }
        if self.data_flit_speedup < 1 {
            return Err(NocError::config("data_flit_speedup must be at least 1"));
        }
        if self.buffer_size == 0 {
            return Err(NocError::config("buffer_size must be at least 1 flit"));
        }
        // Store-and-forward deadlocks when a whole packet cannot fit into
        // one buffer; refuse the configuration outright.
        if self.switching == SwitchingKind::StoreAndForward
            && self.buffer_size < self.flits_per_packet
        {
            return Err(NocError::config(format!(
                "store-and-forward needs buffer_size >= flits_per_packet ({} < {})",
                self.buffer_size, self.flits_per_packet
            )));
        }
        if self.traffic_pattern == TrafficPattern::DestinationSpecified {
            match self.destination_node {
                Some(node) if node < self.nodes => {}
                Some(node) => {
                    return Err(NocError::config(format!(
                        "destination node {} outside the {}-node network",
                        node, self.nodes
                    )));
                }
                None => {
                    return Err(NocError::config(
                        "destination-specified pattern needs destination_node",
                    ));
                }
            }
        }
        if self.router_kind == RouterKind::Irvine && dims != 2 {
            return Err(NocError::config("irvine routers are planar (2D only)"));
        }
        Ok(())
    }

    pub fn into_shared(self) -> Result<Arc<SimConfig>> {
        self.validate()?;
        Ok(Arc::new(self))
    }

    /// The global clock period. Positive for every validated configuration.
    pub fn clock(&self) -> Duration {
        Duration::from_picos(PICOS_PER_SECOND / self.frequency_hz)
    }

    pub fn header_size_bytes(&self) -> u32 {
        2 * self.topology.dimensions() as u32
    }

    pub fn flit_bits(&self) -> u64 {
        self.flit_size_bytes as u64 * 8
    }

    /// Configured bandwidth, or the computed default of one flit per clock.
    pub fn bandwidth_bps(&self) -> u64 {
        self.channel_bandwidth_bps
            .unwrap_or(self.flit_bits() * self.frequency_hz)
    }

    pub fn channel_delay(&self) -> Duration {
        Duration::from_picos(self.channel_delay_ps)
    }

    pub fn warmup_deadline(&self) -> VirtualTime {
        VirtualTime::ZERO + self.clock() * self.warmup_cycles
    }

    pub fn stop_time(&self) -> VirtualTime {
        VirtualTime::ZERO + self.clock() * self.simulation_cycles
    }

    /// Dimension sizes from the flat node count: X is `h_size`, Z (3D) is
    /// `v_size`, Y takes the rest.
    pub fn topology_kind(&self) -> Result<TopologyKind> {
        let sizes = match self.topology.dimensions() {
            2 => vec![self.h_size, self.nodes / self.h_size],
            3 => {
                let v = self
                    .v_size
                    .ok_or_else(|| NocError::config("3D layouts need v_size"))?;
                if v == 0 || self.nodes % (self.h_size * v) != 0 {
                    return Err(NocError::config(format!(
                        "{} nodes do not divide into {}x{} planes",
                        self.nodes, self.h_size, v
                    )));
                }
                vec![self.h_size, self.nodes / (self.h_size * v), v]
            }
            d => return Err(NocError::config(format!("{} dimensions unsupported", d))),
        };
        TopologyKind::new(self.topology, sizes)
    }
}

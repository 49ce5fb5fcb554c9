//! Traffic sources: the per-clock Bernoulli generator and the
//! communication-task-graph executor. One source may be attached per node;
//! the simulation drives it through scheduled source ticks and hands it
//! every flit consumed at the node's ejection port.

pub mod ctg;
pub mod pattern;
pub mod sync;

pub use ctg::CtgGenerator;
pub use pattern::TrafficPattern;
pub use sync::{SyncGenerator, SyncParams};

use crate::engine::Duration;
use crate::error::Result;
use crate::flit::Flit;
use crate::sim::Simulation;

pub enum TrafficSource {
    Sync(SyncGenerator),
    Ctg(CtgGenerator),
}

impl TrafficSource {
    /// Schedule the source's first activity. Called once, at attach time.
    pub(crate) fn start(&mut self, sim: &mut Simulation) -> Result<()> {
        match self {
            TrafficSource::Sync(gen) => gen.start(sim),
            TrafficSource::Ctg(gen) => gen.start(sim),
        }
    }

    /// One injection opportunity. Returns the delay until the next one, or
    /// `None` when the source is finished.
    pub(crate) fn on_tick(&mut self, sim: &mut Simulation) -> Result<Option<Duration>> {
        match self {
            TrafficSource::Sync(gen) => gen.on_tick(sim),
            TrafficSource::Ctg(gen) => gen.on_tick(sim),
        }
    }

    /// A CTG iteration became ready to execute on this node's core.
    pub(crate) fn kickoff(&mut self, sim: &mut Simulation, iteration: u32) -> Result<()> {
        match self {
            TrafficSource::Sync(_) => Ok(()),
            TrafficSource::Ctg(gen) => gen.kickoff(sim, iteration),
        }
    }

    /// A flit was consumed at this node's ejection port.
    pub(crate) fn on_flit_received(&mut self, sim: &mut Simulation, flit: &Flit) -> Result<()> {
        match self {
            TrafficSource::Sync(_) => Ok(()),
            TrafficSource::Ctg(gen) => gen.on_flit_received(sim, flit),
        }
    }

    /// Accumulated core execution time, for the cores-energy report line.
    pub fn core_busy(&self) -> Duration {
        match self {
            TrafficSource::Sync(_) => Duration::ZERO,
            TrafficSource::Ctg(gen) => gen.core_busy(),
        }
    }

    pub fn as_ctg(&self) -> Option<&CtgGenerator> {
        match self {
            TrafficSource::Ctg(gen) => Some(gen),
            TrafficSource::Sync(_) => None,
        }
    }
}

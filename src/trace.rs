//! Event observers: the ASCII trace sink and the power hook.
//!
//! The trace observer has one typed method per event kind, so the hot path
//! never concatenates strings for a disabled sink. The ASCII format is one
//! line per event:
//!
//! ```text
//! {t|r|+|-|d} <time-ps> /NodeList/<node>/DeviceList/<device>/<event> <flit>
//! ```

use std::io::Write;

use tracing::warn;

use crate::engine::VirtualTime;
use crate::flit::FlitSummary;
use crate::network::NodeId;

/// Hierarchical selector of the device an event happened at.
#[derive(Debug, Clone, Copy)]
pub struct TracePath {
    pub node: NodeId,
    pub device_index: u32,
}

impl TracePath {
    pub fn render(&self, event: &str) -> String {
        format!("/NodeList/{}/DeviceList/{}/{}", self.node, self.device_index, event)
    }
}

pub trait NocTrace {
    /// Flit committed to a channel.
    fn tx(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary);
    /// Flit delivered to a device (or consumed at ejection).
    fn rx(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary);
    /// Flit entered an input buffer.
    fn enqueue(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary);
    /// Flit left an input buffer.
    fn dequeue(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary);
    /// Flit discarded (never emitted by the core for in-network flits).
    fn drop_flit(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary);
}

/// Plain-text sink behind any `Write`. A failed write disables the sink for
/// the rest of the run rather than failing the simulation.
pub struct AsciiTraceSink<W: Write> {
    out: W,
    failed: bool,
}

impl<W: Write> AsciiTraceSink<W> {
    pub fn new(out: W) -> Self {
        AsciiTraceSink { out, failed: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(
        &mut self,
        marker: char,
        event: &str,
        time: VirtualTime,
        path: &TracePath,
        flit: &FlitSummary,
    ) {
        if self.failed {
            return;
        }
        let result = writeln!(
            self.out,
            "{} {} {} {}",
            marker,
            time.as_picos(),
            path.render(event),
            flit
        );
        if let Err(e) = result {
            warn!(error = %e, "trace sink write failed; tracing disabled");
            self.failed = true;
        }
    }
}

impl<W: Write> NocTrace for AsciiTraceSink<W> {
    fn tx(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary) {
        self.line('t', "Tx", time, path, flit);
    }

    fn rx(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary) {
        self.line('r', "Rx", time, path, flit);
    }

    fn enqueue(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary) {
        self.line('+', "Enqueue", time, path, flit);
    }

    fn dequeue(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary) {
        self.line('-', "Dequeue", time, path, flit);
    }

    fn drop_flit(&mut self, time: VirtualTime, path: &TracePath, flit: &FlitSummary) {
        self.line('d', "Drop", time, path, flit);
    }
}

/// Per-clock activity hook; at most one call per router per clock, with the
/// flits that arrived there during the previous clock.
pub trait PowerHook {
    fn on_clock_tick(&mut self, router: NodeId, flits_last_clock: &[FlitSummary]);
}

/// Simple activity recorder usable as a power hook: total flit arrivals and
/// bytes moved per router, from which a caller can derive energy figures.
#[derive(Debug, Default)]
pub struct ActivityCounter {
    pub flits_per_router: Vec<u64>,
    pub bytes_per_router: Vec<u64>,
}

impl ActivityCounter {
    pub fn new(routers: usize) -> Self {
        ActivityCounter {
            flits_per_router: vec![0; routers],
            bytes_per_router: vec![0; routers],
        }
    }

    pub fn total_flits(&self) -> u64 {
        self.flits_per_router.iter().sum()
    }
}

impl PowerHook for ActivityCounter {
    fn on_clock_tick(&mut self, router: NodeId, flits_last_clock: &[FlitSummary]) {
        if let Some(slot) = self.flits_per_router.get_mut(router.0) {
            *slot += flits_last_clock.len() as u64;
        }
        if let Some(slot) = self.bytes_per_router.get_mut(router.0) {
            *slot += flits_last_clock.iter().map(|f| f.size_bytes as u64).sum::<u64>();
        }
    }
}

//! Synchronous traffic generator: at every global clock tick, with
//! probability `p`, start a new packet toward a pattern-chosen destination,
//! then feed its body flits on subsequent ticks (at `clock / speedup` for
//! the data flits). An attempt whose destination equals the source is
//! aborted for that tick; `max_flits` and `max_bytes` are both honored, at
//! packet boundaries so a started packet always gets its tail.

use tracing::{debug, trace};

use crate::config::SimConfig;
use crate::engine::Duration;
use crate::error::Result;
use crate::flit::{Flit, FlitUid};
use crate::network::NodeId;
use crate::sim::Simulation;

use super::pattern::{destination_for, TrafficPattern};

#[derive(Debug, Clone)]
pub struct SyncParams {
    pub injection_probability: f64,
    pub flits_per_packet: u32,
    pub pattern: TrafficPattern,
    /// Target for the destination-specified pattern.
    pub destination: Option<NodeId>,
    /// 0 means unlimited.
    pub max_flits: u64,
    /// 0 means unlimited.
    pub max_bytes: u64,
}

impl SyncParams {
    pub fn from_config(config: &SimConfig) -> Self {
        SyncParams {
            injection_probability: config.injection_probability,
            flits_per_packet: config.flits_per_packet,
            pattern: config.traffic_pattern,
            destination: config.destination_node.map(|n| NodeId(n as usize)),
            max_flits: 0,
            max_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PacketProgress {
    head_uid: FlitUid,
    /// Flits of this packet injected so far.
    sent: u32,
}

pub struct SyncGenerator {
    node: NodeId,
    params: SyncParams,
    progress: Option<PacketProgress>,
    /// Flit refused for buffer space, retried before any new work.
    pending: Option<Flit>,
    total_flits: u64,
    total_bytes: u64,
}

impl SyncGenerator {
    pub fn new(node: NodeId, params: SyncParams) -> Self {
        SyncGenerator {
            node,
            params,
            progress: None,
            pending: None,
            total_flits: 0,
            total_bytes: 0,
        }
    }

    pub fn total_flits(&self) -> u64 {
        self.total_flits
    }

    pub(crate) fn start(&mut self, sim: &mut Simulation) -> Result<()> {
        sim.schedule_source_tick(self.node, Duration::ZERO);
        Ok(())
    }

    pub(crate) fn on_tick(&mut self, sim: &mut Simulation) -> Result<Option<Duration>> {
        let clock = sim.config().clock();

        if let Some(flit) = self.pending.take() {
            if sim.inject(self.node, &flit)? {
                self.note_injected(&flit);
            } else {
                self.pending = Some(flit);
                return Ok(Some(clock));
            }
            return Ok(Some(self.cadence(sim)));
        }

        if self.progress.is_none() {
            if self.limits_reached() {
                debug!(node = %self.node, flits = self.total_flits, "traffic source finished");
                return Ok(None);
            }
            return self.try_start_packet(sim);
        }

        self.inject_next_data_flit(sim)
    }

    fn try_start_packet(&mut self, sim: &mut Simulation) -> Result<Option<Duration>> {
        let clock = sim.config().clock();
        let flit_size = sim.config().flit_size_bytes;

        let (topology, rng) = sim.pattern_context();
        let Some(dst) = destination_for(
            self.params.pattern,
            topology,
            self.node,
            self.params.destination,
            rng,
        ) else {
            // Destination equals source (or none configured): abort this tick.
            trace!(node = %self.node, "destination maps to source, skipping tick");
            return Ok(Some(clock));
        };

        if !sim.rng_mut().gen_bool(self.params.injection_probability) {
            return Ok(Some(clock));
        }

        let data_flit_count = (self.params.flits_per_packet - 1) as u16;
        let header = sim
            .topology()
            .relative_header(self.node, dst, data_flit_count)?;
        if header.is_empty() {
            // All offsets already zero: nothing to send.
            return Ok(Some(clock));
        }

        let uid = sim.alloc_uid();
        let head = Flit::head(uid, header, flit_size, sim.now())?;
        trace!(node = %self.node, dst = %dst, head = %uid, "starting packet");

        self.progress = Some(PacketProgress {
            head_uid: uid,
            sent: 0,
        });
        if sim.inject(self.node, &head)? {
            self.note_injected(&head);
        } else {
            self.pending = Some(head);
        }
        Ok(Some(self.cadence(sim)))
    }

    fn inject_next_data_flit(&mut self, sim: &mut Simulation) -> Result<Option<Duration>> {
        let flit_size = sim.config().flit_size_bytes;
        let progress = match self.progress {
            Some(p) => p,
            None => return Ok(Some(self.cadence(sim))),
        };

        let is_tail = progress.sent + 1 == self.params.flits_per_packet;
        let uid = sim.alloc_uid();
        let flit = if is_tail {
            Flit::tail(uid, progress.head_uid, flit_size, sim.now())
        } else {
            Flit::body(uid, progress.head_uid, flit_size, sim.now())
        };

        if sim.inject(self.node, &flit)? {
            self.note_injected(&flit);
        } else {
            self.pending = Some(flit);
        }
        Ok(Some(self.cadence(sim)))
    }

    fn note_injected(&mut self, flit: &Flit) {
        self.total_flits += 1;
        self.total_bytes += flit.size_bytes as u64;
        if let Some(progress) = self.progress.as_mut() {
            progress.sent += 1;
            if progress.sent == self.params.flits_per_packet {
                self.progress = None;
            }
        }
    }

    /// Mid-packet, data flits run at `clock / speedup`; between packets the
    /// next head waits for the next clock boundary.
    fn cadence(&self, sim: &Simulation) -> Duration {
        let clock = sim.config().clock();
        if self.progress.is_some() || self.pending.is_some() {
            clock / sim.config().data_flit_speedup as u64
        } else {
            let now = sim.now();
            let next = (now + Duration::from_picos(1)).ceil_to(clock);
            next - now
        }
    }

    /// Both limits must be unmet to continue.
    fn limits_reached(&self) -> bool {
        let flits_hit = self.params.max_flits > 0 && self.total_flits >= self.params.max_flits;
        let bytes_hit = self.params.max_bytes > 0 && self.total_bytes >= self.params.max_bytes;
        flits_hit || bytes_hit
    }
}

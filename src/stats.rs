//! Per-packet latency accounting and the aggregate results report.
//!
//! Latency is keyed by head uid: the head's injection time opens a packet
//! record at the ejection port, the matching tail closes it. A tail whose
//! head was never seen is a hard invariant violation (out-of-order ejection
//! would silently miscompute latency otherwise). Packets injected during
//! the warmup prefix are tracked but excluded from the averages.

use std::collections::HashMap;

use crate::engine::{Duration, VirtualTime};
use crate::error::{NocError, Result};
use crate::flit::{Flit, FlitKind, FlitUid};
use crate::network::NodeId;

#[derive(Debug, Clone)]
pub struct PacketRecord {
    pub head_uid: FlitUid,
    pub src: Option<NodeId>,
    pub dst: NodeId,
    pub injected_at: VirtualTime,
    pub completed_at: Option<VirtualTime>,
    pub ctg_iteration: Option<u32>,
}

#[derive(Debug)]
pub struct StatsCollector {
    clock: Duration,
    warmup_deadline: VirtualTime,
    open: HashMap<FlitUid, PacketRecord>,
    completed: Vec<PacketRecord>,
    pub injected_flits: u64,
    pub injected_bytes: u64,
    pub ejected_flits: u64,
    pub ejected_bytes: u64,
}

impl StatsCollector {
    pub fn new(clock: Duration, warmup_deadline: VirtualTime) -> Self {
        StatsCollector {
            clock,
            warmup_deadline,
            open: HashMap::new(),
            completed: Vec::new(),
            injected_flits: 0,
            injected_bytes: 0,
            ejected_flits: 0,
            ejected_bytes: 0,
        }
    }

    pub fn on_injected(&mut self, flit: &Flit) {
        self.injected_flits += 1;
        self.injected_bytes += flit.size_bytes as u64;
    }

    /// Record a flit consumed at `dst`'s ejection port. `src` is resolved
    /// from the head's source coordinates by the caller.
    pub fn on_ejected(&mut self, flit: &Flit, src: Option<NodeId>, dst: NodeId) -> Result<()> {
        self.ejected_flits += 1;
        self.ejected_bytes += flit.size_bytes as u64;

        let received_at = flit.meta.receive_time.ok_or_else(|| {
            NocError::invariant(format!("flit {} ejected without a receive time", flit.uid))
        })?;
        if received_at < flit.meta.injection_time {
            return Err(NocError::invariant(format!(
                "flit {} received at {} before its injection at {}",
                flit.uid, received_at, flit.meta.injection_time
            )));
        }

        match &flit.kind {
            FlitKind::Head(_) => {
                self.open.insert(
                    flit.uid,
                    PacketRecord {
                        head_uid: flit.uid,
                        src,
                        dst,
                        injected_at: flit.meta.injection_time,
                        completed_at: None,
                        ctg_iteration: flit.meta.ctg_iteration,
                    },
                );
            }
            FlitKind::Body { head_uid } => {
                if !self.open.contains_key(head_uid) {
                    return Err(NocError::invariant(format!(
                        "body flit {} ejected before its head {}",
                        flit.uid, head_uid
                    )));
                }
            }
            FlitKind::Tail { head_uid } => {
                let mut record = self.open.remove(head_uid).ok_or_else(|| {
                    NocError::invariant(format!(
                        "tail flit {} ejected before its head {}",
                        flit.uid, head_uid
                    ))
                })?;
                record.completed_at = Some(received_at);
                self.completed.push(record);
            }
        }
        Ok(())
    }

    pub fn completed_packets(&self) -> &[PacketRecord] {
        &self.completed
    }

    /// Completed packets injected after warmup.
    pub fn measured_packets(&self) -> impl Iterator<Item = &PacketRecord> {
        self.completed
            .iter()
            .filter(move |p| p.injected_at >= self.warmup_deadline)
    }

    /// Average head-injection to tail-ejection latency in clock cycles,
    /// over measured packets.
    pub fn average_latency_cycles(&self) -> Option<f64> {
        let mut total = 0u64;
        let mut count = 0u64;
        for packet in self.measured_packets() {
            if let Some(end) = packet.completed_at {
                total += (end - packet.injected_at).as_picos();
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(total as f64 / count as f64 / self.clock.as_picos() as f64)
        }
    }
}

/// Optional power figures supplied by the power-hook collaborator.
#[derive(Debug, Clone, Copy)]
pub struct PowerSummary {
    pub dynamic_w: f64,
    pub leakage_w: f64,
}

/// End-of-run aggregate results.
#[derive(Debug)]
pub struct SimReport {
    pub average_latency_cycles: Option<f64>,
    pub completed_packets: u64,
    pub injected_flits: u64,
    pub ejected_flits: u64,
    pub total_time_s: f64,
    pub power: Option<PowerSummary>,
    pub area_um2: Option<f64>,
    pub cores_energy_j: f64,
    /// Flits still buffered or in flight at stop time (the watchdog line).
    pub unconsumed_flits: usize,
}

impl std::fmt::Display for SimReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.average_latency_cycles {
            Some(latency) => writeln!(f, "average packet latency = {:.3} cycles", latency)?,
            None => writeln!(f, "average packet latency = n/a (no measured packets)")?,
        }
        writeln!(f, "packets completed      = {}", self.completed_packets)?;
        writeln!(f, "flits injected         = {}", self.injected_flits)?;
        writeln!(f, "flits ejected          = {}", self.ejected_flits)?;
        writeln!(f, "simulated time         = {:.9} s", self.total_time_s)?;
        if let Some(power) = self.power {
            writeln!(f, "dynamic NoC power      = {:.6} W", power.dynamic_w)?;
            writeln!(f, "leakage NoC power      = {:.6} W", power.leakage_w)?;
            writeln!(
                f,
                "total NoC power        = {:.6} W",
                power.dynamic_w + power.leakage_w
            )?;
        }
        if let Some(area) = self.area_um2 {
            writeln!(f, "NoC area               = {:.1} um^2", area)?;
        }
        writeln!(f, "cores energy           = {:.9} J", self.cores_energy_j)?;
        if self.unconsumed_flits > 0 {
            writeln!(
                f,
                "WARNING: {} flits were still buffered or in flight at stop time",
                self.unconsumed_flits
            )?;
        }
        Ok(())
    }
}

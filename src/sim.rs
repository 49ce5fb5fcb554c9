//! The simulation: wiring, the event dispatch loop, and the router
//! forwarding pipeline.
//!
//! Everything is driven by five event kinds. The global clock tick flushes
//! each router's power tally and re-services every input buffer in rotated
//! round-robin order; channel deliveries move flits between routers and
//! cut through immediately where the switching policy allows; source ticks
//! drive the traffic generators. Soft refusals (buffer full, channel busy)
//! leave the flit where it is for the next tick; fatal errors abort the
//! run with a diagnostic.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::engine::{DeterministicRng, Duration, Scheduler, VirtualTime};
use crate::error::{NocError, Result};
use crate::fault::{FaultInjector, FaultTarget};
use crate::flit::{Flit, FlitKind, FlitSummary, FlitUid, UidAllocator};
use crate::network::channel::{ChannelEnd, ChannelId};
use crate::network::device::DeviceId;
use crate::network::router::{RouteRecord, RouterKind};
use crate::network::{Network, NodeId};
use crate::routing::RoutingDecision;
use crate::stats::{SimReport, StatsCollector};
use crate::topology::{builder::build_network, TopologyKind};
use crate::trace::{NocTrace, PowerHook, TracePath};
use crate::traffic::{SyncGenerator, SyncParams, TrafficSource};

#[derive(Debug, Clone, Copy)]
pub enum EventKind {
    /// Global clock boundary: power flush + buffer service.
    ClockTick,
    /// Traffic-source injection opportunity.
    SourceTick { node: NodeId },
    /// A channel transfer completes.
    Deliver { channel: ChannelId, end: ChannelEnd },
    /// A CTG iteration's inputs are satisfied (or its period arrived).
    CtgKickoff { node: NodeId, iteration: u32 },
    /// A scheduled fault fires.
    Fault { target: FaultTarget },
}

pub struct Simulation {
    config: Arc<SimConfig>,
    scheduler: Scheduler<EventKind>,
    network: Network,
    sources: Vec<Option<TrafficSource>>,
    rng: DeterministicRng,
    uids: UidAllocator,
    stats: StatsCollector,
    trace: Option<Box<dyn NocTrace>>,
    power: Option<Box<dyn PowerHook>>,
    faults: FaultInjector,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation").finish_non_exhaustive()
    }
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        let config = config.into_shared()?;
        let network = build_network(&config)?;
        let node_count = network.node_count();
        let stats = StatsCollector::new(config.clock(), config.warmup_deadline());
        let rng = DeterministicRng::new(config.seed);
        Ok(Simulation {
            config,
            scheduler: Scheduler::new(),
            network,
            sources: (0..node_count).map(|_| None).collect(),
            rng,
            uids: UidAllocator::new(),
            stats,
            trace: None,
            power: None,
            faults: FaultInjector::new(),
        })
    }

    // -- wiring -----------------------------------------------------------

    pub fn set_trace(&mut self, trace: Box<dyn NocTrace>) {
        self.trace = Some(trace);
    }

    pub fn set_power_hook(&mut self, hook: Box<dyn PowerHook>) {
        self.power = Some(hook);
    }

    pub fn take_power_hook(&mut self) -> Option<Box<dyn PowerHook>> {
        self.power.take()
    }

    /// Attach one traffic source to `node`, replacing any existing one.
    pub fn attach_source(&mut self, node: NodeId, source: TrafficSource) -> Result<()> {
        self.sources[node.0] = Some(source);
        self.with_source(node, |sim, src| src.start(sim))
    }

    /// Attach the configured synchronous generator to every node.
    pub fn attach_sync_sources(&mut self) -> Result<()> {
        let params = SyncParams::from_config(&self.config);
        for n in 0..self.network.node_count() {
            let node = NodeId(n);
            self.attach_source(node, TrafficSource::Sync(SyncGenerator::new(node, params.clone())))?;
        }
        Ok(())
    }

    pub fn inject_fault_at(&mut self, target: FaultTarget, at: VirtualTime) {
        self.faults.set_faulty_at(target, at);
    }

    // -- accessors (also used by the traffic sources) ---------------------

    pub fn now(&self) -> VirtualTime {
        self.scheduler.now()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn topology(&self) -> &TopologyKind {
        &self.network.topology
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    pub fn source(&self, node: NodeId) -> Option<&TrafficSource> {
        self.sources[node.0].as_ref()
    }

    pub(crate) fn rng_mut(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    /// Topology and RNG together, for pattern destination draws.
    pub(crate) fn pattern_context(&mut self) -> (&TopologyKind, &mut DeterministicRng) {
        (&self.network.topology, &mut self.rng)
    }

    pub(crate) fn alloc_uid(&mut self) -> FlitUid {
        self.uids.alloc()
    }

    pub(crate) fn schedule_source_tick(&mut self, node: NodeId, delay: Duration) {
        self.scheduler.schedule(delay, EventKind::SourceTick { node });
    }

    pub(crate) fn schedule_kickoff(&mut self, node: NodeId, iteration: u32, at: VirtualTime) {
        let at = if at < self.now() { self.now() } else { at };
        self.scheduler
            .schedule_at(at, EventKind::CtgKickoff { node, iteration });
    }

    // -- run loop ---------------------------------------------------------

    /// Run until the event queue drains or `stop_time` passes, then report.
    pub fn run(&mut self) -> Result<SimReport> {
        let stop = self.config.stop_time();
        let clock = self.config.clock();

        for fault in self.faults.drain() {
            if fault.at <= self.now() {
                // Faulty from the very start: apply before any event fires.
                info!(component = %fault.target, "component faulty at start");
                self.network.set_faulty(fault.target, true);
            } else {
                self.scheduler
                    .schedule_at(fault.at, EventKind::Fault { target: fault.target });
            }
        }
        self.scheduler.schedule(clock, EventKind::ClockTick);

        info!(stop = %stop, seed = self.config.seed, "simulation starting");
        while let Some(next) = self.scheduler.peek_time() {
            if next > stop {
                break;
            }
            let Some((_, _, kind)) = self.scheduler.pop_next() else {
                break;
            };
            self.handle(kind)?;
        }

        let unconsumed = self.network.unconsumed_flits();
        if unconsumed > 0 {
            for (device, count) in self.network.buffered_flits() {
                warn!(
                    device = device.0,
                    node = self.network.devices[device.0].node.0,
                    count,
                    "flits left in buffer at stop time"
                );
            }
        }
        info!(
            injected = self.stats.injected_flits,
            ejected = self.stats.ejected_flits,
            unconsumed,
            "simulation finished"
        );
        Ok(self.report(stop, unconsumed))
    }

    fn report(&self, stop: VirtualTime, unconsumed: usize) -> SimReport {
        let core_busy_s: f64 = self
            .sources
            .iter()
            .flatten()
            .map(|s| s.core_busy().as_secs_f64())
            .sum();
        SimReport {
            average_latency_cycles: self.stats.average_latency_cycles(),
            completed_packets: self.stats.completed_packets().len() as u64,
            injected_flits: self.stats.injected_flits,
            ejected_flits: self.stats.ejected_flits,
            total_time_s: stop.as_secs_f64(),
            power: None,
            area_um2: None,
            cores_energy_j: core_busy_s * self.config.core_power_watts,
            unconsumed_flits: unconsumed,
        }
    }

    fn handle(&mut self, kind: EventKind) -> Result<()> {
        match kind {
            EventKind::ClockTick => self.on_clock_tick(),
            EventKind::SourceTick { node } => self.on_source_tick(node),
            EventKind::Deliver { channel, end } => self.deliver(channel, end),
            EventKind::CtgKickoff { node, iteration } => {
                self.with_source(node, |sim, src| src.kickoff(sim, iteration))
            }
            EventKind::Fault { target } => {
                info!(component = %target, at = %self.now(), "component marked faulty");
                self.network.set_faulty(target, true);
                Ok(())
            }
        }
    }

    fn on_clock_tick(&mut self) -> Result<()> {
        // Schedule the next boundary first so it precedes this tick's
        // deliveries in the queue order.
        let next = self.now() + self.config.clock();
        if next <= self.config.stop_time() {
            self.scheduler.schedule_at(next, EventKind::ClockTick);
        }

        // At most one power-hook call per router per clock, with the flits
        // observed during the previous clock.
        for router in self.network.routers.iter_mut() {
            let arrivals = router.roll_clock();
            if let Some(hook) = self.power.as_mut() {
                hook.on_clock_tick(router.node, &arrivals);
            }
        }

        // Retry every buffered flit, round-robin per router.
        for n in 0..self.network.node_count() {
            if !self.network.is_router_reachable(NodeId(n)) {
                continue;
            }
            let order = self.network.routers[n].service_order();
            for device in order {
                self.try_forward(device)?;
            }
        }
        Ok(())
    }

    fn on_source_tick(&mut self, node: NodeId) -> Result<()> {
        let Some(mut source) = self.sources[node.0].take() else {
            return Ok(());
        };
        let result = source.on_tick(self);
        self.sources[node.0] = Some(source);
        if let Some(delay) = result? {
            self.schedule_source_tick(node, delay);
        }
        Ok(())
    }

    fn with_source(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut Simulation, &mut TrafficSource) -> Result<()>,
    ) -> Result<()> {
        let Some(mut source) = self.sources[node.0].take() else {
            return Ok(());
        };
        let result = f(self, &mut source);
        self.sources[node.0] = Some(source);
        result
    }

    // -- injection and ejection -------------------------------------------

    /// Inject a flit at `node`'s local port. `Ok(false)` means the injection
    /// buffer is full; the source retries next tick. Faulty components are
    /// fatal to the caller.
    pub fn inject(&mut self, node: NodeId, flit: &Flit) -> Result<bool> {
        if self.network.nodes[node.0].faulty {
            return Err(NocError::faulty(format!("node {}", node)));
        }
        if self.network.routers[node.0].faulty {
            return Err(NocError::faulty(format!("router {}", node)));
        }

        let device = {
            let router = &mut self.network.routers[node.0];
            match (&flit.kind, router.kind) {
                (FlitKind::Head(header), RouterKind::Irvine) => {
                    let device = router.injection_device_for(header);
                    router.injection_bindings.insert(flit.uid, device);
                    device
                }
                (FlitKind::Body { head_uid }, RouterKind::Irvine) => router
                    .injection_bindings
                    .get(head_uid)
                    .copied()
                    .unwrap_or_else(|| router.injection_device()),
                (FlitKind::Tail { head_uid }, RouterKind::Irvine) => {
                    let bound = router.injection_bindings.remove(head_uid);
                    bound.unwrap_or_else(|| router.injection_device())
                }
                _ => router.injection_device(),
            }
        };
        if self.network.devices[device.0].faulty {
            return Err(NocError::faulty(format!("net device {}", device.0)));
        }
        if self.network.devices[device.0].buffer.free_slots() == 0 {
            return Ok(false);
        }

        let owned = flit.clone();
        let summary = owned.summary();
        self.network.routers[node.0].switching.record_arrival(&owned);
        self.network.devices[device.0]
            .buffer
            .enqueue(owned)
            .map_err(|_| NocError::invariant("injection slot vanished"))?;
        self.stats.on_injected(flit);
        self.emit_enqueue(device, &summary);
        debug!(node = %node, flit = %summary, "flit injected");

        self.try_forward(device)?;
        Ok(true)
    }

    fn eject(&mut self, device: DeviceId, node: NodeId) -> Result<()> {
        let Some(mut flit) = self.network.devices[device.0].buffer.dequeue() else {
            return Ok(());
        };
        let summary = flit.summary();
        self.emit_dequeue(device, &summary);

        flit.meta.receive_time = Some(self.now());
        let head_uid = flit.head_uid();
        let is_tail = flit.is_tail();

        // The head's source coordinates identify the sender.
        let src = flit.header().map(|h| {
            let coords: Vec<u32> = (0..h.dimensions())
                .map(|d| h.source_coordinate(d) as u32)
                .collect();
            self.network.topology.node_at(&coords)
        });

        let ejection = self.network.routers[node.0].ejection_device();
        self.emit_rx(ejection, &summary);
        self.stats.on_ejected(&flit, src, node)?;
        debug!(node = %node, flit = %summary, at = %self.now(), "flit ejected");

        if is_tail {
            let router = &mut self.network.routers[node.0];
            router.switching.release(head_uid);
            router.routes.remove(&head_uid);
        }

        self.with_source(node, |sim, source| source.on_flit_received(sim, &flit))
    }

    // -- forwarding pipeline ----------------------------------------------

    /// Drain `device`'s buffer as far as the policies allow right now. A
    /// store-and-forward packet leaves as one burst; consecutive channel
    /// forwards stop at the first ChannelBusy.
    pub(crate) fn try_forward(&mut self, device: DeviceId) -> Result<()> {
        while self.forward_one(device)? {}
        Ok(())
    }

    /// Advance the flit at the front of `device`'s buffer by at most one
    /// hop. Soft refusals (switching gate, admission, channel busy) leave
    /// it in place; the next clock tick retries. `Ok(true)` means the front
    /// flit moved.
    fn forward_one(&mut self, device: DeviceId) -> Result<bool> {
        let node = self.network.devices[device.0].node;
        if self.network.nodes[node.0].faulty
            || self.network.routers[node.0].faulty
            || self.network.devices[device.0].faulty
        {
            // Buffered flits stay strictly in place inside faulty parts.
            return Ok(false);
        }
        let Some(front) = self.network.devices[device.0].buffer.front().cloned() else {
            return Ok(false);
        };
        let head_uid = front.head_uid();

        if !self.network.routers[node.0].routes.contains_key(&head_uid) {
            let header = front.header().ok_or_else(|| {
                NocError::invariant(format!(
                    "flit {} reached router {} before its head's route",
                    front.uid, node
                ))
            })?;
            let decision = self.network.routers[node.0].routing.decide(header)?;
            let record = self.resolve_decision(node, decision)?;
            self.network.routers[node.0].routes.insert(head_uid, record);
        }
        let record = self.network.routers[node.0]
            .routes
            .get(&head_uid)
            .cloned()
            .ok_or_else(|| NocError::invariant("route record vanished"))?;

        let may_leave = {
            let Network {
                routers, devices, ..
            } = &mut self.network;
            routers[node.0]
                .switching
                .may_leave(&front, &devices[device.0].buffer)
        };
        if !may_leave {
            return Ok(false);
        }

        if record.eject {
            self.eject(device, node)?;
            return Ok(true);
        }

        // Operations may not target faulty components; surfacing this is
        // fatal (no rerouting is implemented).
        let downstream_node = self.network.devices[record.downstream_device.0].node;
        if self.network.devices[record.out_device.0].faulty {
            return Err(NocError::faulty(format!("net device {}", record.out_device.0)));
        }
        let channel_id = self.network.devices[record.out_device.0]
            .channel
            .ok_or_else(|| {
                NocError::invariant(format!(
                    "routing drove flit {} off the mesh edge at router {}",
                    front.uid, node
                ))
            })?;
        if self.network.channels[channel_id.0].faulty() {
            return Err(NocError::faulty(channel_id.to_string()));
        }
        if self.network.nodes[downstream_node.0].faulty
            || self.network.routers[downstream_node.0].faulty
            || self.network.devices[record.downstream_device.0].faulty
        {
            return Err(NocError::faulty(format!("router {}", downstream_node)));
        }

        // Downstream admission per the switching policy.
        let needed = self.network.routers[node.0]
            .switching
            .required_downstream_slots(&front);
        let free = self.network.devices[record.downstream_device.0]
            .buffer
            .free_slots();
        if free < needed {
            let Network {
                routers, devices, ..
            } = &mut self.network;
            routers[node.0]
                .switching
                .on_downstream_full(&front, &devices[device.0].buffer);
            if let Some(blocked) = devices[device.0].buffer.front_mut() {
                blocked.meta.blocked = true;
            }
            return Ok(false);
        }

        let end = self.network.channels[channel_id.0].end_for_source(record.out_device)?;
        if !self.network.channels[channel_id.0].is_idle(end) {
            // ChannelBusy: retry on the next clock boundary.
            return Ok(false);
        }

        let Some(mut flit) = self.network.devices[device.0].buffer.dequeue() else {
            return Ok(false);
        };
        let summary = flit.summary();
        self.emit_dequeue(device, &summary);

        if flit.is_head() {
            if let Some(rewritten) = record.rewritten.clone() {
                flit.kind = FlitKind::Head(rewritten);
            }
        }
        let is_tail = flit.is_tail();

        self.network.channels[channel_id.0].begin_transmit(end, flit)?;
        let delay = self.network.channels[channel_id.0].send(end)?;
        self.emit_tx(record.out_device, &summary);
        self.scheduler.schedule(
            delay,
            EventKind::Deliver {
                channel: channel_id,
                end,
            },
        );

        if is_tail {
            let router = &mut self.network.routers[node.0];
            router.switching.release(head_uid);
            router.routes.remove(&head_uid);
        }
        Ok(true)
    }

    fn resolve_decision(&self, node: NodeId, decision: RoutingDecision) -> Result<RouteRecord> {
        let router = &self.network.routers[node.0];
        match decision {
            RoutingDecision::Eject => Ok(RouteRecord {
                out_device: router.ejection_device(),
                downstream_device: router.ejection_device(),
                rewritten: None,
                eject: true,
            }),
            RoutingDecision::Link {
                dimension,
                direction,
                rewritten,
            } => {
                let out_device = router.port_for(direction, dimension).ok_or_else(|| {
                    NocError::invariant(format!(
                        "router {} has no port for dimension {}",
                        node, dimension
                    ))
                })?;
                let channel = self.network.devices[out_device.0].channel.ok_or_else(|| {
                    NocError::invariant(format!(
                        "header drives flit past the mesh edge at router {}",
                        node
                    ))
                })?;
                let downstream_device = self.network.channels[channel.0]
                    .peer_of(out_device)
                    .ok_or_else(|| NocError::invariant("channel endpoint mismatch"))?;
                Ok(RouteRecord {
                    out_device,
                    downstream_device,
                    rewritten: Some(rewritten),
                    eject: false,
                })
            }
        }
    }

    fn deliver(&mut self, channel: ChannelId, end: ChannelEnd) -> Result<()> {
        let flit = self.network.channels[channel.0].complete(end)?;
        let source_device = self.network.channels[channel.0].endpoint(end);
        let dest_device = self.network.channels[channel.0].destination(end);
        let dest_node = self.network.devices[dest_device.0].node;
        let summary = flit.summary();

        self.emit_rx(dest_device, &summary);

        let reachable = self.network.is_router_reachable(dest_node)
            && !self.network.devices[dest_device.0].faulty;
        if reachable {
            // The receiving load component samples the sender's load figure,
            // the way load-balanced routers learn about their neighborhood.
            let upstream_node = self.network.devices[source_device.0].node;
            let upstream_load = {
                let upstream = &self.network.routers[upstream_node.0];
                upstream
                    .load
                    .as_ref()
                    .map(|l| l.load(upstream.link_ports().len() as u32))
            };
            let router = &mut self.network.routers[dest_node.0];
            router.note_arrival(summary);
            router.switching.record_arrival(&flit);
            if let (Some(load), Some(value)) = (router.load.as_mut(), upstream_load) {
                load.add_neighbor_load(value);
            }
        }

        self.network.devices[dest_device.0]
            .buffer
            .enqueue(flit)
            .map_err(|_| {
                NocError::invariant(format!(
                    "reserved slot at device {} vanished before delivery",
                    dest_device.0
                ))
            })?;
        self.emit_enqueue(dest_device, &summary);

        if reachable {
            self.try_forward(dest_device)?;
        }
        // The channel just freed: give the upstream router's buffers their
        // next turn without waiting for the clock boundary.
        let source_node = self.network.devices[source_device.0].node;
        if self.network.is_router_reachable(source_node) {
            for device in self.network.routers[source_node.0].service_order() {
                self.try_forward(device)?;
            }
        }
        Ok(())
    }

    // -- trace emission ---------------------------------------------------

    fn trace_path(&self, device: DeviceId) -> TracePath {
        let dev = &self.network.devices[device.0];
        TracePath {
            node: dev.node,
            device_index: dev.local_index,
        }
    }

    fn emit_tx(&mut self, device: DeviceId, summary: &FlitSummary) {
        let path = self.trace_path(device);
        let now = self.now();
        if let Some(trace) = self.trace.as_mut() {
            trace.tx(now, &path, summary);
        }
    }

    fn emit_rx(&mut self, device: DeviceId, summary: &FlitSummary) {
        let path = self.trace_path(device);
        let now = self.now();
        if let Some(trace) = self.trace.as_mut() {
            trace.rx(now, &path, summary);
        }
    }

    fn emit_enqueue(&mut self, device: DeviceId, summary: &FlitSummary) {
        let path = self.trace_path(device);
        let now = self.now();
        if let Some(trace) = self.trace.as_mut() {
            trace.enqueue(now, &path, summary);
        }
    }

    fn emit_dequeue(&mut self, device: DeviceId, summary: &FlitSummary) {
        let path = self.trace_path(device);
        let now = self.now();
        if let Some(trace) = self.trace.as_mut() {
            trace.dequeue(now, &path, summary);
        }
    }
}

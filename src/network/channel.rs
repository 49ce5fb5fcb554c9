//! Point-to-point link between two router ports.
//!
//! Each direction is its own three-state machine: IDLE, TRANSMITTING (a
//! flit is latched but the send has not been issued), PROPAGATING (delivery
//! is scheduled). In full-duplex mode (the default) the two directions never
//! interfere; in half-duplex mode a transmit requires both to be idle.

use crate::engine::Duration;
use crate::error::{NocError, Result};
use crate::flit::Flit;

use super::device::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub usize);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Transmitting,
    Propagating,
}

/// Which endpoint is driving a transfer. `A` sends toward endpoint b,
/// `B` toward endpoint a.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelEnd {
    A,
    B,
}

impl ChannelEnd {
    pub fn index(self) -> usize {
        match self {
            ChannelEnd::A => 0,
            ChannelEnd::B => 1,
        }
    }
}

#[derive(Debug)]
struct DirectionState {
    state: ChannelState,
    current: Option<Flit>,
}

impl DirectionState {
    fn new() -> Self {
        DirectionState {
            state: ChannelState::Idle,
            current: None,
        }
    }
}

#[derive(Debug)]
pub struct Channel {
    pub id: ChannelId,
    endpoints: [DeviceId; 2],
    bandwidth_bps: u64,
    propagation_delay: Duration,
    length_um: u32,
    full_duplex: bool,
    faulty: bool,
    dirs: [DirectionState; 2],
}

impl Channel {
    pub fn new(
        id: ChannelId,
        a: DeviceId,
        b: DeviceId,
        bandwidth_bps: u64,
        propagation_delay: Duration,
        length_um: u32,
    ) -> Self {
        Channel {
            id,
            endpoints: [a, b],
            bandwidth_bps,
            propagation_delay,
            length_um,
            full_duplex: true,
            faulty: false,
            dirs: [DirectionState::new(), DirectionState::new()],
        }
    }

    pub fn set_full_duplex(&mut self, full_duplex: bool) {
        self.full_duplex = full_duplex;
    }

    pub fn endpoint(&self, end: ChannelEnd) -> DeviceId {
        self.endpoints[end.index()]
    }

    pub fn peer_of(&self, device: DeviceId) -> Option<DeviceId> {
        if device == self.endpoints[0] {
            Some(self.endpoints[1])
        } else if device == self.endpoints[1] {
            Some(self.endpoints[0])
        } else {
            None
        }
    }

    /// The direction driven by `device`, or an invariant violation if the
    /// device is not attached here.
    pub fn end_for_source(&self, device: DeviceId) -> Result<ChannelEnd> {
        if device == self.endpoints[0] {
            Ok(ChannelEnd::A)
        } else if device == self.endpoints[1] {
            Ok(ChannelEnd::B)
        } else {
            Err(NocError::invariant(format!(
                "device {} is not an endpoint of {}",
                device.0, self.id
            )))
        }
    }

    /// Where a transfer driven from `end` lands.
    pub fn destination(&self, end: ChannelEnd) -> DeviceId {
        self.endpoints[1 - end.index()]
    }

    pub fn is_idle(&self, end: ChannelEnd) -> bool {
        if self.full_duplex {
            self.dirs[end.index()].state == ChannelState::Idle
        } else {
            self.dirs.iter().all(|d| d.state == ChannelState::Idle)
        }
    }

    pub fn state(&self, end: ChannelEnd) -> ChannelState {
        self.dirs[end.index()].state
    }

    pub fn length_um(&self) -> u32 {
        self.length_um
    }

    pub fn faulty(&self) -> bool {
        self.faulty
    }

    pub fn set_faulty(&mut self, faulty: bool) {
        self.faulty = faulty;
    }

    /// Latch a flit for transmission. Soft `ChannelBusy` if this direction
    /// (or, half-duplex, either direction) is not idle.
    pub fn begin_transmit(&mut self, end: ChannelEnd, flit: Flit) -> Result<()> {
        if self.faulty {
            return Err(NocError::faulty(self.id.to_string()));
        }
        if !self.is_idle(end) {
            return Err(NocError::ChannelBusy);
        }
        let dir = &mut self.dirs[end.index()];
        dir.current = Some(flit);
        dir.state = ChannelState::Transmitting;
        Ok(())
    }

    /// Commit the latched flit. Returns the total delay until delivery:
    /// `propagation_delay + size_bits / bandwidth`. Calling `send` without a
    /// preceding `begin_transmit` is a protocol violation, not backpressure.
    pub fn send(&mut self, end: ChannelEnd) -> Result<Duration> {
        if self.faulty {
            return Err(NocError::faulty(self.id.to_string()));
        }
        let dir = &mut self.dirs[end.index()];
        if dir.state != ChannelState::Transmitting {
            return Err(NocError::invariant(format!(
                "send on {} while {:?} (expected TRANSMITTING)",
                self.id, dir.state
            )));
        }
        let flit = dir.current.as_ref().ok_or_else(|| {
            NocError::invariant(format!("{} is TRANSMITTING with no latched flit", self.id))
        })?;
        let tx = transmission_time(flit.size_bits(), self.bandwidth_bps);
        dir.state = ChannelState::Propagating;
        Ok(self.propagation_delay + tx)
    }

    /// Delivery fired: return the flit and go back to IDLE.
    pub fn complete(&mut self, end: ChannelEnd) -> Result<Flit> {
        let dir = &mut self.dirs[end.index()];
        if dir.state != ChannelState::Propagating {
            return Err(NocError::invariant(format!(
                "delivery on {} while {:?} (expected PROPAGATING)",
                self.id, dir.state
            )));
        }
        let flit = dir.current.take().ok_or_else(|| {
            NocError::invariant(format!("{} is PROPAGATING with no flit in flight", self.id))
        })?;
        dir.state = ChannelState::Idle;
        Ok(flit)
    }

    /// Flits latched or in flight, for the stop-time watchdog.
    pub fn in_flight(&self) -> usize {
        self.dirs.iter().filter(|d| d.current.is_some()).count()
    }
}

fn transmission_time(size_bits: u64, bandwidth_bps: u64) -> Duration {
    if bandwidth_bps == 0 {
        return Duration::ZERO;
    }
    let picos = (size_bits as u128 * 1_000_000_000_000u128) / bandwidth_bps as u128;
    Duration::from_picos(picos as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::VirtualTime;
    use crate::flit::{FlitUid, UidAllocator};

    fn flit(uids: &mut UidAllocator) -> Flit {
        Flit::body(uids.alloc(), FlitUid(0), 32, VirtualTime::ZERO)
    }

    fn channel() -> Channel {
        // 256 Gbit/s: one 32-byte flit per nanosecond.
        Channel::new(
            ChannelId(0),
            DeviceId(10),
            DeviceId(11),
            256_000_000_000,
            Duration::ZERO,
            50,
        )
    }

    #[test]
    fn test_transmit_cycle() {
        let mut uids = UidAllocator::new();
        let mut ch = channel();

        ch.begin_transmit(ChannelEnd::A, flit(&mut uids)).unwrap();
        assert_eq!(ch.state(ChannelEnd::A), ChannelState::Transmitting);

        let delay = ch.send(ChannelEnd::A).unwrap();
        assert_eq!(delay, Duration::from_nanos(1));
        assert_eq!(ch.state(ChannelEnd::A), ChannelState::Propagating);

        ch.complete(ChannelEnd::A).unwrap();
        assert_eq!(ch.state(ChannelEnd::A), ChannelState::Idle);
    }

    #[test]
    fn test_busy_is_soft() {
        let mut uids = UidAllocator::new();
        let mut ch = channel();
        ch.begin_transmit(ChannelEnd::A, flit(&mut uids)).unwrap();
        let err = ch.begin_transmit(ChannelEnd::A, flit(&mut uids)).unwrap_err();
        assert!(err.is_soft());
    }

    #[test]
    fn test_send_without_transmit_is_fatal() {
        let mut ch = channel();
        let err = ch.send(ChannelEnd::A).unwrap_err();
        assert!(matches!(err, NocError::InvariantViolation(_)));
    }

    #[test]
    fn test_full_duplex_directions_independent() {
        let mut uids = UidAllocator::new();
        let mut ch = channel();
        ch.begin_transmit(ChannelEnd::A, flit(&mut uids)).unwrap();
        // The opposite direction is unaffected.
        ch.begin_transmit(ChannelEnd::B, flit(&mut uids)).unwrap();
        ch.send(ChannelEnd::A).unwrap();
        ch.send(ChannelEnd::B).unwrap();
        assert_eq!(ch.in_flight(), 2);
    }

    #[test]
    fn test_half_duplex_blocks_both() {
        let mut uids = UidAllocator::new();
        let mut ch = channel();
        ch.set_full_duplex(false);
        ch.begin_transmit(ChannelEnd::A, flit(&mut uids)).unwrap();
        let err = ch.begin_transmit(ChannelEnd::B, flit(&mut uids)).unwrap_err();
        assert!(matches!(err, NocError::ChannelBusy));
    }

    #[test]
    fn test_faulty_refuses_everything() {
        let mut uids = UidAllocator::new();
        let mut ch = channel();
        ch.set_faulty(true);
        let err = ch.begin_transmit(ChannelEnd::A, flit(&mut uids)).unwrap_err();
        assert!(matches!(err, NocError::ComponentFaulty(_)));
    }

    #[test]
    fn test_propagation_delay_added() {
        let mut uids = UidAllocator::new();
        let mut ch = Channel::new(
            ChannelId(1),
            DeviceId(0),
            DeviceId(1),
            256_000_000_000,
            Duration::from_picos(250),
            50,
        );
        ch.begin_transmit(ChannelEnd::A, flit(&mut uids)).unwrap();
        assert_eq!(ch.send(ChannelEnd::A).unwrap(), Duration::from_picos(1_250));
    }
}

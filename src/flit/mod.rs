//! Flits: the atomic transfer units of the network.
//!
//! A packet is one HEAD, zero or more BODY flits and one TAIL. Only the
//! head carries a header; body and tail flits carry the head's uid instead,
//! which makes "a body has no header" unrepresentable rather than a bug
//! class.

pub mod header;

pub use header::{Header, Sign};

use crate::engine::VirtualTime;
use crate::error::{NocError, Result};

/// Globally unique 32-bit flit id. Body and tail flits get their own uid and
/// reference their head through `head_uid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlitUid(pub u32);

impl std::fmt::Display for FlitUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic uid source; one per simulation.
#[derive(Debug, Default)]
pub struct UidAllocator {
    next: u32,
}

impl UidAllocator {
    pub fn new() -> Self {
        UidAllocator { next: 0 }
    }

    pub fn alloc(&mut self) -> FlitUid {
        let uid = FlitUid(self.next);
        self.next += 1;
        uid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlitType {
    Head,
    Body,
    Tail,
}

impl std::fmt::Display for FlitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlitType::Head => "HEAD",
            FlitType::Body => "BODY",
            FlitType::Tail => "TAIL",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub enum FlitKind {
    Head(Header),
    Body { head_uid: FlitUid },
    Tail { head_uid: FlitUid },
}

/// Metadata carried with every flit.
#[derive(Debug, Clone, Copy)]
pub struct FlitMeta {
    pub injection_time: VirtualTime,
    pub receive_time: Option<VirtualTime>,
    /// Set by virtual-cut-through when downstream admission failed once.
    pub blocked: bool,
    /// CTG iteration this flit belongs to, for CTG-driven traffic.
    pub ctg_iteration: Option<u32>,
}

impl FlitMeta {
    fn at(injection_time: VirtualTime) -> Self {
        FlitMeta {
            injection_time,
            receive_time: None,
            blocked: false,
            ctg_iteration: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flit {
    pub uid: FlitUid,
    pub kind: FlitKind,
    pub size_bytes: u32,
    pub meta: FlitMeta,
}

impl Flit {
    /// A head flit loses `header.size_bytes()` of its payload to the header,
    /// so it must be at least that large.
    pub fn head(
        uid: FlitUid,
        header: Header,
        size_bytes: u32,
        injected_at: VirtualTime,
    ) -> Result<Flit> {
        if size_bytes < header.size_bytes() {
            return Err(NocError::invariant(format!(
                "head flit of {} bytes cannot carry a {}-byte header",
                size_bytes,
                header.size_bytes()
            )));
        }
        Ok(Flit {
            uid,
            kind: FlitKind::Head(header),
            size_bytes,
            meta: FlitMeta::at(injected_at),
        })
    }

    pub fn body(uid: FlitUid, head_uid: FlitUid, size_bytes: u32, injected_at: VirtualTime) -> Flit {
        Flit {
            uid,
            kind: FlitKind::Body { head_uid },
            size_bytes,
            meta: FlitMeta::at(injected_at),
        }
    }

    pub fn tail(uid: FlitUid, head_uid: FlitUid, size_bytes: u32, injected_at: VirtualTime) -> Flit {
        Flit {
            uid,
            kind: FlitKind::Tail { head_uid },
            size_bytes,
            meta: FlitMeta::at(injected_at),
        }
    }

    pub fn flit_type(&self) -> FlitType {
        match self.kind {
            FlitKind::Head(_) => FlitType::Head,
            FlitKind::Body { .. } => FlitType::Body,
            FlitKind::Tail { .. } => FlitType::Tail,
        }
    }

    /// The uid of the packet's head: the flit's own uid for a head.
    pub fn head_uid(&self) -> FlitUid {
        match self.kind {
            FlitKind::Head(_) => self.uid,
            FlitKind::Body { head_uid } | FlitKind::Tail { head_uid } => head_uid,
        }
    }

    pub fn header(&self) -> Option<&Header> {
        match &self.kind {
            FlitKind::Head(h) => Some(h),
            _ => None,
        }
    }

    pub fn is_head(&self) -> bool {
        matches!(self.kind, FlitKind::Head(_))
    }

    pub fn is_tail(&self) -> bool {
        matches!(self.kind, FlitKind::Tail { .. })
    }

    pub fn size_bits(&self) -> u64 {
        self.size_bytes as u64 * 8
    }

    /// Payload capacity in bits; heads lose the header.
    pub fn payload_bits(&self) -> u64 {
        match &self.kind {
            FlitKind::Head(h) => (self.size_bytes.saturating_sub(h.size_bytes())) as u64 * 8,
            _ => self.size_bits(),
        }
    }

    pub fn summary(&self) -> FlitSummary {
        FlitSummary {
            uid: self.uid,
            head_uid: self.head_uid(),
            flit_type: self.flit_type(),
            size_bytes: self.size_bytes,
        }
    }
}

/// Compact view of a flit for trace lines and the power hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlitSummary {
    pub uid: FlitUid,
    pub head_uid: FlitUid,
    pub flit_type: FlitType,
    pub size_bytes: u32,
}

impl std::fmt::Display for FlitSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} uid={} head={} bytes={}",
            self.flit_type, self.uid, self.head_uid, self.size_bytes
        )
    }
}

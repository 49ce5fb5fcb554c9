//! Switching (flow-control) disciplines: three policies on one contract,
//! "may this flit leave its input buffer now?". The router consults the
//! policy after routing and before touching the channel; a refusal leaves
//! the flit in place to be retried on the next clock tick.

pub mod saf;
pub mod vct;
pub mod wormhole;

pub use saf::StoreAndForward;
pub use vct::VirtualCutThrough;
pub use wormhole::Wormhole;

use serde::{Deserialize, Serialize};

use crate::flit::{Flit, FlitUid};
use crate::network::buffer::InputBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchingKind {
    Wormhole,
    StoreAndForward,
    VirtualCutThrough,
}

impl SwitchingKind {
    pub fn instantiate(self) -> Box<dyn SwitchingProtocol> {
        match self {
            SwitchingKind::Wormhole => Box::new(Wormhole::new()),
            SwitchingKind::StoreAndForward => Box::new(StoreAndForward::new()),
            SwitchingKind::VirtualCutThrough => Box::new(VirtualCutThrough::new()),
        }
    }
}

pub trait SwitchingProtocol: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// A flit entered one of this router's input buffers.
    fn record_arrival(&mut self, flit: &Flit) {
        let _ = flit;
    }

    /// May the flit at the front of `buffer` leave now?
    fn may_leave(&mut self, flit: &Flit, buffer: &InputBuffer) -> bool;

    /// Free downstream slots required before `flit` may start transmitting.
    fn required_downstream_slots(&self, flit: &Flit) -> usize {
        let _ = flit;
        1
    }

    /// Downstream admission failed for `flit`, sitting at the front of
    /// `buffer`; the policy may latch a blocked state (virtual cut-through
    /// does).
    fn on_downstream_full(&mut self, flit: &Flit, buffer: &InputBuffer) {
        let _ = (flit, buffer);
    }

    /// The packet's tail has departed (or was ejected); drop per-packet
    /// state.
    fn release(&mut self, head_uid: FlitUid);
}

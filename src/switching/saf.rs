use std::collections::HashMap;

use tracing::trace;

use crate::flit::{Flit, FlitKind, FlitUid};
use crate::network::buffer::InputBuffer;

use super::SwitchingProtocol;

/// Store-and-forward: a head is held until every body and tail flit of its
/// packet sits in the same input buffer. A per-head countdown is seeded
/// from the header's data-flit count when the head arrives and decremented
/// by each following flit; the head becomes eligible at zero, and the rest
/// of the packet drains behind it in FIFO order.
#[derive(Debug, Default)]
pub struct StoreAndForward {
    remaining: HashMap<FlitUid, u16>,
}

impl StoreAndForward {
    pub fn new() -> Self {
        StoreAndForward::default()
    }
}

impl SwitchingProtocol for StoreAndForward {
    fn name(&self) -> &'static str {
        "store-and-forward"
    }

    fn record_arrival(&mut self, flit: &Flit) {
        match &flit.kind {
            FlitKind::Head(header) => {
                self.remaining.insert(flit.uid, header.data_flit_count());
                trace!(
                    head = %flit.uid,
                    pending = header.data_flit_count(),
                    "store-and-forward holds head"
                );
            }
            FlitKind::Body { head_uid } | FlitKind::Tail { head_uid } => {
                if let Some(count) = self.remaining.get_mut(head_uid) {
                    *count = count.saturating_sub(1);
                }
            }
        }
    }

    fn may_leave(&mut self, flit: &Flit, _buffer: &InputBuffer) -> bool {
        match flit.kind {
            // Bodies and tails only ever sit behind their head in the same
            // FIFO; once the head left, the whole packet is accounted for.
            FlitKind::Body { .. } | FlitKind::Tail { .. } => true,
            FlitKind::Head(_) => self
                .remaining
                .get(&flit.uid)
                .map(|count| *count == 0)
                .unwrap_or(false),
        }
    }

    fn release(&mut self, head_uid: FlitUid) {
        self.remaining.remove(&head_uid);
    }
}

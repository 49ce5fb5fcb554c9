use crate::flit::{Flit, FlitUid};
use crate::network::buffer::InputBuffer;

use super::SwitchingProtocol;

/// Wormhole switching never gates: a flit may leave as soon as the
/// downstream buffer has a slot. Backpressure arises from downstream
/// refusal alone, so no per-packet state exists.
#[derive(Debug, Default)]
pub struct Wormhole;

impl Wormhole {
    pub fn new() -> Self {
        Wormhole
    }
}

impl SwitchingProtocol for Wormhole {
    fn name(&self) -> &'static str {
        "wormhole"
    }

    fn may_leave(&mut self, _flit: &Flit, _buffer: &InputBuffer) -> bool {
        true
    }

    fn release(&mut self, _head_uid: FlitUid) {}
}

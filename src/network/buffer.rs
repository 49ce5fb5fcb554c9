use std::collections::VecDeque;

use crate::error::{NocError, Result};
use crate::flit::Flit;

/// Bounded FIFO of flits behind one inbound link. FIFO is absolute: flits
/// leave in arrival order, which is half of the no-overtaking guarantee.
#[derive(Debug)]
pub struct InputBuffer {
    queue: VecDeque<Flit>,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        InputBuffer {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn enqueue(&mut self, flit: Flit) -> Result<()> {
        if self.queue.len() >= self.capacity {
            return Err(NocError::BufferFull);
        }
        self.queue.push_back(flit);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<Flit> {
        self.queue.pop_front()
    }

    pub fn front(&self) -> Option<&Flit> {
        self.queue.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut Flit> {
        self.queue.front_mut()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn free_slots(&self) -> usize {
        self.capacity - self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flit> {
        self.queue.iter()
    }
}

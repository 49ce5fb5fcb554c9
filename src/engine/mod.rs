//! The discrete-event engine: virtual time, the event queue, and the seeded
//! random stream. Single-threaded and cooperative; time advances only when
//! the queue pops an event.

mod rng;
mod scheduler;
mod time;

pub use rng::DeterministicRng;
pub use scheduler::{EventId, Scheduler};
pub use time::{Duration, VirtualTime};

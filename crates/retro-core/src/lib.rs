//! Retrospective session rules: phase progression, the shared countdown,
//! the one-vote-per-user gate and discussion ordering. Nothing in here
//! performs I/O; callers persist whatever these functions return.

pub mod clock;
pub mod discussion;
pub mod phase;
pub mod timer;
pub mod voting;

pub use clock::{Clock, ManualClock, SystemClock};

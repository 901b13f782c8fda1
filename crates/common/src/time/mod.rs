//! Time abstractions

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};

//! # Cadence Library
//!
//! Reusable subsystems for the cadence framework:
//!
//! - **Clocks**: monotonic wall-time and a manually stepped clock for
//!   deterministic tests
//! - **SimpleTimer**: leaf subsystem measuring elapsed time
//! - **Timer**: pausable composite built from two `SimpleTimer`
//!   children, the canonical example of the data-request and
//!   action-cascade protocols

pub mod clock;
pub mod simple_timer;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use simple_timer::{SimpleTimer, SimpleTimerAction, SimpleTimerData};
pub use timer::{Timer, TimerAction, TimerData};

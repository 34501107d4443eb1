//! # Subsystem communication
//!
//! Message passing between subsystems in the control tree:
//!
//! - **Msg**: a shared, single-use request handle with an opaque
//!   identifier tag, a payload slot and a result slot
//! - **MsgKind**: whether a message asks for data or for an action
//!
//! A requester constructs a `Msg`, keeps a clone of the handle, and
//! enqueues it into the receiver's inbox through the phase context.
//! The receiver fills `payload` (and `result` on failure) in place;
//! the requester reads the slots back out once the relevant phase has
//! completed. The core never looks inside either slot.

pub mod message;

pub use message::{Msg, MsgKind};

//! # Cadence Core
//!
//! Cooperative control-loop framework for composing a control system
//! out of a hierarchy of independently updatable subsystems.
//!
//! Cadence enforces a strict multi-phase update protocol per control
//! cycle, so state reads, inter-subsystem requests, decision logic and
//! physical actuation never interleave unpredictably. This crate
//! provides the fundamental building blocks:
//!
//! - **Subsystems**: tree-structured components with one override
//!   point per scheduler phase
//! - **Messages**: single-use request handles carrying an opaque
//!   identifier, a payload slot and a result slot: the only channel
//!   through which one subsystem may affect another
//! - **Ownership tree**: an arena holding the hierarchy, verified once
//!   against every node's recorded owner before the first cycle
//! - **Scheduling**: the `Manager` drives all subsystems through the
//!   fixed 8-phase protocol, one full cycle per tick
//!
//! The model is deliberately single-threaded and cooperative: hooks
//! complete synchronously, a cycle always runs to completion, and
//! ordering across phases is a hard guarantee while ordering within a
//! phase (outside the bottom-up and top-down traversals) is not.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use cadence_core::{Manager, Subsystem, SubsystemTree};
//!
//! let mut tree = SubsystemTree::new();
//! let drivebase = tree.insert_top(Drivebase::new());
//! let left = tree.insert(DriveSide::new(), drivebase);
//! tree.add_child(drivebase, left)?;
//!
//! let mut manager = Manager::new(tree)?; // verifies the wiring
//! manager.init();
//! loop {
//!     manager.cycle()?; // one 8-phase control tick
//! }
//! ```

pub mod communication;
pub mod core;
pub mod error;
pub mod scheduling;

// Re-export commonly used types for easy access
pub use communication::{Msg, MsgKind};
pub use core::{
    AsAny, ResponderContext, Subsystem, SubsystemContext, SubsystemId, SubsystemTree,
    SubsystemView,
};
pub use error::{CadenceError, CadenceResult};
pub use scheduling::{CycleMetrics, Manager, Phase};

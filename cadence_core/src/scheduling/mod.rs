//! # Cadence scheduling
//!
//! The phased cycle driver:
//!
//! - **Manager**: owns the verified subsystem tree and runs the fixed
//!   8-phase protocol once per `cycle()` call
//! - **Phase**: names one stage of the protocol, used in logs and in
//!   hook-fault errors
//! - **CycleMetrics**: per-manager cycle counters and timing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadence_core::{Manager, SubsystemTree};
//!
//! let mut tree = SubsystemTree::new();
//! let drivebase = tree.insert_top(Drivebase::new());
//! let left = tree.insert(DriveSide::new(), drivebase);
//! tree.add_child(drivebase, left)?;
//!
//! let mut manager = Manager::new(tree)?.with_name("robot");
//! manager.init();
//! loop {
//!     manager.cycle()?; // one control tick
//! }
//! ```

pub mod manager;

use std::fmt;

pub use manager::{CycleMetrics, Manager};

/// One stage of the per-cycle update protocol.
///
/// Phases run strictly in this order; a phase completes for every
/// applicable subsystem before the next begins. The two answer stages
/// are the delivery passes of their surrounding receive phase, and the
/// model/publish pair are the two passes of the actuation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BasicData,
    DataRequestSend,
    DataRequestReceive,
    DataAnswerReceive,
    LogicUpdate,
    ActionRequestSend,
    ActionRequestReceive,
    ActionAnswerReceive,
    ControlModelUpdate,
    ControlPublish,
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::BasicData => "basic data update",
            Phase::DataRequestSend => "data request send",
            Phase::DataRequestReceive => "data request receive",
            Phase::DataAnswerReceive => "data answer receive",
            Phase::LogicUpdate => "logic update",
            Phase::ActionRequestSend => "action request send",
            Phase::ActionRequestReceive => "action request receive",
            Phase::ActionAnswerReceive => "action answer receive",
            Phase::ControlModelUpdate => "control model update",
            Phase::ControlPublish => "control publish",
            Phase::Cleanup => "cleanup",
        };
        write!(f, "{}", label)
    }
}

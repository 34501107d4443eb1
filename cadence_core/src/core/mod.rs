//! # Core types and traits of the cadence framework
//!
//! The fundamental building blocks of a cadence control system:
//!
//! - **Subsystem**: the trait every component of the control hierarchy
//!   implements; one override point per scheduler phase, all defaulted
//!   to no-ops
//! - **SubsystemTree**: the arena holding the ownership hierarchy, the
//!   per-node inboxes and the structural integrity check
//! - **Phase contexts**: `SubsystemView`, `ResponderContext` and
//!   `SubsystemContext`, granting each hook exactly the capabilities
//!   its phase contract allows
//!
//! ## Subsystem lifecycle
//!
//! 1. **Construction**: components are built and inserted into a
//!    `SubsystemTree`, children registered explicitly with `add_child`
//! 2. **Verification**: `Manager::new` checks the recorded owners
//!    against the registered hierarchy once, before any cycle runs
//! 3. **Cycling**: the manager drives every hook in the fixed phase
//!    order, one full pass per call to `cycle()`

pub mod subsystem;
pub mod tree;

pub use subsystem::{AsAny, Subsystem};
pub use tree::{ResponderContext, SubsystemContext, SubsystemId, SubsystemTree, SubsystemView};

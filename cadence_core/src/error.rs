//! Error types for the cadence framework.
//!
//! Structural wiring errors are fatal at construction time: the
//! manager refuses to build on a mis-wired tree. Hook faults are fatal
//! for the cycle that hit them and carry the phase and subsystem that
//! failed. Logical failures ("cannot comply with this request") never
//! appear here at all; they travel in a message's result slot.

use thiserror::Error;

use crate::core::tree::SubsystemId;
use crate::scheduling::Phase;

pub type CadenceResult<T> = Result<T, CadenceError>;

#[derive(Debug, Error)]
pub enum CadenceError {
    /// An id that does not name a slot in this tree.
    #[error("unknown subsystem id {0:?}")]
    UnknownSubsystem(SubsystemId),

    #[error("subsystem '{child}' cannot own itself")]
    SelfOwnership { child: &'static str },

    #[error("subsystem '{child}' is already registered under '{parent}'")]
    DuplicateChild {
        child: &'static str,
        parent: &'static str,
    },

    /// Recorded owner and registered parent disagree.
    #[error("subsystem '{child}' records owner '{expected}' but is registered under '{found}'")]
    OwnerMismatch {
        child: &'static str,
        expected: String,
        found: String,
    },

    /// One node registered in two child sets.
    #[error("subsystem '{child}' is registered under both '{first}' and '{second}'")]
    DuplicateOwnership {
        child: &'static str,
        first: &'static str,
        second: &'static str,
    },

    /// A node names an owner that never registered it.
    #[error("subsystem '{child}' records owner '{owner}' but was never registered as its child")]
    MissingRegistration {
        child: &'static str,
        owner: &'static str,
    },

    /// Not in the closure of the top-level set; catches ownership
    /// cycles and orphaned islands.
    #[error("subsystem '{0}' is not reachable from any top-level subsystem")]
    Unreachable(&'static str),

    /// A hook failed; fatal for the current cycle.
    #[error("{phase} hook failed in subsystem '{subsystem}': {source}")]
    Hook {
        phase: Phase,
        subsystem: &'static str,
        #[source]
        source: Box<CadenceError>,
    },

    /// Component-level fault with no more specific variant.
    #[error("subsystem fault: {0}")]
    Fault(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CadenceError {
    /// Convenience constructor for component code.
    pub fn fault(message: impl Into<String>) -> Self {
        CadenceError::Fault(message.into())
    }
}

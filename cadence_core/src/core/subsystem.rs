use std::any::Any;

use crate::communication::Msg;
use crate::core::tree::{ResponderContext, SubsystemContext, SubsystemView};
use crate::error::CadenceResult;

/// Uniform access to the concrete type behind a `dyn Subsystem`.
///
/// Blanket-implemented for every `'static` type; subsystems get typed
/// read-only cross-references (`peek`) for free.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A component of the control hierarchy.
///
/// Every subsystem, from a whole arm assembly down to a single motor,
/// implements this trait and is driven by the [`Manager`] through the
/// fixed per-cycle phase sequence. Each hook has a no-op default, so a
/// component overrides only the phases it participates in.
///
/// Subsystems may hold [`SubsystemId`]s of any other subsystem and read
/// its state through [`SubsystemView::peek`], but all state changes in
/// another subsystem must travel through the message system; the phase
/// contexts make mutation through a cross-reference unrepresentable.
///
/// Hooks signal unexpected faults by returning an error, which aborts
/// the current cycle. An unrecognized message identifier is never an
/// error: the receive hooks must ignore it and return `Ok(())`. A
/// logical failure ("cannot comply") is reported through the message's
/// result slot and inspected by the requester in a later phase.
///
/// [`Manager`]: crate::scheduling::Manager
/// [`SubsystemId`]: crate::core::tree::SubsystemId
/// [`SubsystemView::peek`]: crate::core::tree::SubsystemView::peek
#[allow(unused_variables)]
pub trait Subsystem: AsAny {
    /// Short static name used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Refresh this subsystem's locally observable state (sensor
    /// reads, elapsed time). Children have already completed their own
    /// basic update, so reading their state through the view is safe.
    /// Runs bottom-up within a branch.
    fn update_basic_data(&mut self, view: &SubsystemView<'_>) -> CadenceResult<()> {
        Ok(())
    }

    /// Enqueue data requests into other subsystems' inboxes. Keep a
    /// clone of each sent [`Msg`] to read the response later. No state
    /// in any subsystem may change during this phase.
    fn send_data_request(&mut self, ctx: &mut SubsystemContext<'_>) -> CadenceResult<()> {
        Ok(())
    }

    /// Answer one queued data request by filling `msg`'s payload slot
    /// (and the result slot if something went wrong). Identifiers from
    /// another vocabulary must be ignored.
    fn receive_data_request(
        &mut self,
        msg: &Msg,
        ctx: &mut ResponderContext<'_>,
    ) -> CadenceResult<()> {
        Ok(())
    }

    /// Handle one message from the answer inbox: a response another
    /// subsystem explicitly dispatched for a data request this one
    /// sent.
    fn receive_data_answer(&mut self, msg: &Msg) -> CadenceResult<()> {
        Ok(())
    }

    /// Pure internal decision making: inspect the now-resolved data
    /// requests, advance state machines, pick actions. Other
    /// subsystems are in flux during this phase, so the hook gets no
    /// access to them at all.
    fn update_logic(&mut self) -> CadenceResult<()> {
        Ok(())
    }

    /// Enqueue action requests, conventionally into owned children.
    /// This phase cascades top-down: the owner's hook has already run,
    /// and any request it addressed to this subsystem is visible via
    /// [`SubsystemContext::pending_requests`], so an instruction can be
    /// re-propagated further down within the same cycle. Requests sent
    /// upward are delivered in the next cycle.
    fn send_action_request(&mut self, ctx: &mut SubsystemContext<'_>) -> CadenceResult<()> {
        Ok(())
    }

    /// Handle one queued action request. May record same-node state
    /// that later phases act on (a target for `publish_control`, a
    /// command for the next logic update). Unknown identifiers are
    /// ignored; failure to comply goes into the result slot.
    fn receive_action_request(
        &mut self,
        msg: &Msg,
        ctx: &mut ResponderContext<'_>,
    ) -> CadenceResult<()> {
        Ok(())
    }

    /// Handle one message from the answer inbox for an action request
    /// this subsystem sent.
    fn receive_action_answer(&mut self, msg: &Msg) -> CadenceResult<()> {
        Ok(())
    }

    /// Recompute forward control outputs (controller terms) from the
    /// state established in earlier phases. All subsystems finish this
    /// before any actuation is published.
    fn update_control_models(&mut self) -> CadenceResult<()> {
        Ok(())
    }

    /// Apply the computed outputs to the physical world. Must have no
    /// effect on any subsystem's logical state: the manager can skip
    /// this hook entirely (dry-run) and every other observable behavior
    /// stays the same.
    fn publish_control(&mut self) -> CadenceResult<()> {
        Ok(())
    }

    /// End-of-cycle housekeeping. Order-independent, must not send
    /// messages.
    fn cleanup(&mut self) -> CadenceResult<()> {
        Ok(())
    }
}

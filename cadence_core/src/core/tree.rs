use std::mem;

use log::trace;

use crate::communication::{Msg, MsgKind};
use crate::core::subsystem::Subsystem;
use crate::error::{CadenceError, CadenceResult};
use crate::scheduling::Phase;

/// Handle to a subsystem slot in a [`SubsystemTree`].
///
/// Purely an index; copying it never copies or aliases the subsystem
/// itself. Cross-references between subsystems are held as ids and
/// resolved read-only through the phase contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsystemId(pub(crate) usize);

struct Slot {
    /// Taken out while one of the node's own hooks runs.
    node: Option<Box<dyn Subsystem>>,
    name: &'static str,
    owner: Option<SubsystemId>,
    children: Vec<SubsystemId>,
    request_inbox: Vec<Msg>,
    answer_inbox: Vec<Msg>,
    /// Action requests that arrived after this node's own send hook in
    /// the cascade; delivered in the next cycle's receive phase.
    deferred_requests: Vec<Msg>,
    /// Request-inbox length recorded right after this node's
    /// `send_action_request` returned.
    send_watermark: usize,
}

/// Arena of exclusively owned subsystems plus the ownership hierarchy.
///
/// Nodes are inserted owner-first ([`insert_top`] for roots, then
/// [`insert`] naming the owner for everything below) and registered
/// into their owner's child set explicitly with [`add_child`]. The
/// topology is static: once a manager takes the tree, nothing is ever
/// added, removed or reparented.
///
/// The recorded owner and the registered hierarchy are two separate
/// pieces of state on purpose; [`Manager::new`] cross-checks them once
/// and refuses mis-wired trees before the first cycle.
///
/// [`insert_top`]: SubsystemTree::insert_top
/// [`insert`]: SubsystemTree::insert
/// [`add_child`]: SubsystemTree::add_child
/// [`Manager::new`]: crate::scheduling::Manager::new
#[derive(Default)]
pub struct SubsystemTree {
    slots: Vec<Slot>,
}

impl SubsystemTree {
    pub fn new() -> Self {
        SubsystemTree { slots: Vec::new() }
    }

    fn push(&mut self, node: Box<dyn Subsystem>, owner: Option<SubsystemId>) -> SubsystemId {
        let id = SubsystemId(self.slots.len());
        self.slots.push(Slot {
            name: node.name(),
            node: Some(node),
            owner,
            children: Vec::new(),
            request_inbox: Vec::new(),
            answer_inbox: Vec::new(),
            deferred_requests: Vec::new(),
            send_watermark: 0,
        });
        id
    }

    /// Insert a top-level subsystem (no owner).
    pub fn insert_top(&mut self, node: impl Subsystem) -> SubsystemId {
        self.push(Box::new(node), None)
    }

    /// Insert a subsystem recording `owner` as the one node that holds
    /// it. Registration into the owner's child set is a separate,
    /// explicit step ([`add_child`](SubsystemTree::add_child)).
    pub fn insert(&mut self, node: impl Subsystem, owner: SubsystemId) -> SubsystemId {
        self.push(Box::new(node), Some(owner))
    }

    /// Register `child` in `parent`'s child set.
    pub fn add_child(&mut self, parent: SubsystemId, child: SubsystemId) -> CadenceResult<()> {
        if parent.0 >= self.slots.len() {
            return Err(CadenceError::UnknownSubsystem(parent));
        }
        if child.0 >= self.slots.len() {
            return Err(CadenceError::UnknownSubsystem(child));
        }
        if parent == child {
            return Err(CadenceError::SelfOwnership {
                child: self.slots[child.0].name,
            });
        }
        if self.slots[parent.0].children.contains(&child) {
            return Err(CadenceError::DuplicateChild {
                child: self.slots[child.0].name,
                parent: self.slots[parent.0].name,
            });
        }
        self.slots[parent.0].children.push(child);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn name(&self, id: SubsystemId) -> Option<&'static str> {
        self.slots.get(id.0).map(|slot| slot.name)
    }

    pub fn owner(&self, id: SubsystemId) -> Option<SubsystemId> {
        self.slots.get(id.0).and_then(|slot| slot.owner)
    }

    pub fn children(&self, id: SubsystemId) -> &[SubsystemId] {
        self.slots
            .get(id.0)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    /// Read-only typed access to a subsystem.
    pub fn peek<T: Subsystem>(&self, id: SubsystemId) -> Option<&T> {
        self.slots
            .get(id.0)?
            .node
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Mutable typed access, for wiring during construction (telling a
    /// composite the ids of its children). Once a manager has consumed
    /// the tree no `&mut SubsystemTree` exists outside it, so this
    /// cannot bypass the message system at runtime.
    pub fn get_mut<T: Subsystem>(&mut self, id: SubsystemId) -> Option<&mut T> {
        self.slots
            .get_mut(id.0)?
            .node
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    // ============================================================================
    // Structural verification
    // ============================================================================

    /// Cross-check recorded owners against the registered hierarchy.
    ///
    /// Fails on an owner/registration mismatch, a node registered
    /// under two parents, a recorded owner that never registered the
    /// node, and any node unreachable from the top-level set (which
    /// also catches ownership cycles). Run once by the manager before
    /// the first cycle; never again.
    pub(crate) fn verify(&self) -> CadenceResult<()> {
        let mut registered_under: Vec<Option<SubsystemId>> = vec![None; self.slots.len()];
        for (index, slot) in self.slots.iter().enumerate() {
            for &child in &slot.children {
                if child.0 >= self.slots.len() {
                    return Err(CadenceError::UnknownSubsystem(child));
                }
                if let Some(first) = registered_under[child.0] {
                    return Err(CadenceError::DuplicateOwnership {
                        child: self.slots[child.0].name,
                        first: self.slots[first.0].name,
                        second: slot.name,
                    });
                }
                registered_under[child.0] = Some(SubsystemId(index));
            }
        }

        for (index, slot) in self.slots.iter().enumerate() {
            match (slot.owner, registered_under[index]) {
                (None, None) => {}
                (Some(owner), Some(parent)) if owner == parent => {}
                (Some(owner), None) => {
                    if owner.0 >= self.slots.len() {
                        return Err(CadenceError::UnknownSubsystem(owner));
                    }
                    return Err(CadenceError::MissingRegistration {
                        child: slot.name,
                        owner: self.slots[owner.0].name,
                    });
                }
                (recorded, Some(parent)) => {
                    return Err(CadenceError::OwnerMismatch {
                        child: slot.name,
                        expected: recorded
                            .map(|id| self.slots[id.0].name.to_string())
                            .unwrap_or_else(|| "none".to_string()),
                        found: self.slots[parent.0].name.to_string(),
                    });
                }
            }
        }

        // Reachability from the top set; a consistent pairwise wiring
        // can still contain an ownership cycle floating off the tree.
        let mut seen = vec![false; self.slots.len()];
        let mut stack: Vec<SubsystemId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.owner.is_none())
            .map(|(index, _)| SubsystemId(index))
            .collect();
        while let Some(id) = stack.pop() {
            if mem::replace(&mut seen[id.0], true) {
                continue;
            }
            stack.extend(self.slots[id.0].children.iter().copied());
        }
        if let Some(index) = seen.iter().position(|reached| !reached) {
            return Err(CadenceError::Unreachable(self.slots[index].name));
        }

        Ok(())
    }

    /// Top-level ids and the flattened closure under `children`, in
    /// depth-first order. Valid only on a verified tree.
    pub(crate) fn flatten(&self) -> (Vec<SubsystemId>, Vec<SubsystemId>) {
        let top: Vec<SubsystemId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.owner.is_none())
            .map(|(index, _)| SubsystemId(index))
            .collect();

        let mut all = Vec::with_capacity(self.slots.len());
        let mut stack: Vec<SubsystemId> = top.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            all.push(id);
            stack.extend(self.slots[id.0].children.iter().rev().copied());
        }
        (top, all)
    }

    // ============================================================================
    // Message delivery
    // ============================================================================

    fn deliver_request(&mut self, target: SubsystemId, msg: &Msg) -> CadenceResult<()> {
        let slot = self
            .slots
            .get_mut(target.0)
            .ok_or(CadenceError::UnknownSubsystem(target))?;
        trace!("{} request {:?} -> '{}'", msg.kind(), msg, slot.name);
        slot.request_inbox.push(msg.clone());
        Ok(())
    }

    fn deliver_answer(&mut self, target: SubsystemId, msg: &Msg) -> CadenceResult<()> {
        let slot = self
            .slots
            .get_mut(target.0)
            .ok_or(CadenceError::UnknownSubsystem(target))?;
        trace!("{} answer {:?} -> '{}'", msg.kind(), msg, slot.name);
        slot.answer_inbox.push(msg.clone());
        Ok(())
    }

    /// Host-side injection between cycles. Action requests go through
    /// the deferred buffer so they surface in the next action-receive
    /// phase instead of being mis-drained as data.
    pub(crate) fn post_request(&mut self, target: SubsystemId, msg: &Msg) -> CadenceResult<()> {
        let slot = self
            .slots
            .get_mut(target.0)
            .ok_or(CadenceError::UnknownSubsystem(target))?;
        match msg.kind() {
            MsgKind::Data => slot.request_inbox.push(msg.clone()),
            MsgKind::Action => slot.deferred_requests.push(msg.clone()),
        }
        Ok(())
    }

    // ============================================================================
    // Hook execution
    // ============================================================================

    fn take_node(&mut self, id: SubsystemId, phase: Phase) -> CadenceResult<Box<dyn Subsystem>> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or(CadenceError::UnknownSubsystem(id))?;
        slot.node.take().ok_or_else(|| CadenceError::Fault(format!(
            "subsystem '{}' is already executing a hook in phase {}",
            slot.name, phase
        )))
    }

    fn wrap(phase: Phase, subsystem: &'static str, source: CadenceError) -> CadenceError {
        CadenceError::Hook {
            phase,
            subsystem,
            source: Box::new(source),
        }
    }

    /// Run a hook that gets read-only access to the rest of the tree.
    fn view_hook<F>(&mut self, id: SubsystemId, phase: Phase, hook: F) -> CadenceResult<()>
    where
        F: FnOnce(&mut dyn Subsystem, &SubsystemView<'_>) -> CadenceResult<()>,
    {
        let mut node = self.take_node(id, phase)?;
        let name = node.name();
        let view = SubsystemView {
            tree: self,
            current: id,
        };
        let outcome = hook(node.as_mut(), &view);
        self.slots[id.0].node = Some(node);
        outcome.map_err(|source| Self::wrap(phase, name, source))
    }

    /// Run a hook that may enqueue messages.
    fn ctx_hook<F>(&mut self, id: SubsystemId, phase: Phase, hook: F) -> CadenceResult<()>
    where
        F: FnOnce(&mut dyn Subsystem, &mut SubsystemContext<'_>) -> CadenceResult<()>,
    {
        let mut node = self.take_node(id, phase)?;
        let name = node.name();
        let mut ctx = SubsystemContext {
            tree: self,
            current: id,
        };
        let outcome = hook(node.as_mut(), &mut ctx);
        self.slots[id.0].node = Some(node);
        outcome.map_err(|source| Self::wrap(phase, name, source))
    }

    /// Run a hook with no tree access at all.
    fn plain_hook<F>(&mut self, id: SubsystemId, phase: Phase, hook: F) -> CadenceResult<()>
    where
        F: FnOnce(&mut dyn Subsystem) -> CadenceResult<()>,
    {
        let mut node = self.take_node(id, phase)?;
        let name = node.name();
        let outcome = hook(node.as_mut());
        self.slots[id.0].node = Some(node);
        outcome.map_err(|source| Self::wrap(phase, name, source))
    }

    // ============================================================================
    // Phase drivers (called by the manager)
    // ============================================================================

    /// Phase 1: post-order over a branch, children strictly first.
    pub(crate) fn run_basic_data(&mut self, id: SubsystemId) -> CadenceResult<()> {
        let children = self.children(id).to_vec();
        for child in children {
            self.run_basic_data(child)?;
        }
        self.view_hook(id, Phase::BasicData, |node, view| {
            node.update_basic_data(view)
        })
    }

    pub(crate) fn run_send_data(&mut self, id: SubsystemId) -> CadenceResult<()> {
        self.ctx_hook(id, Phase::DataRequestSend, |node, ctx| {
            node.send_data_request(ctx)
        })
    }

    pub(crate) fn run_logic(&mut self, id: SubsystemId) -> CadenceResult<()> {
        self.plain_hook(id, Phase::LogicUpdate, |node| node.update_logic())
    }

    /// Phase 5: pre-order cascade. The node's own send hook runs, the
    /// post-send watermark is recorded, then each child follows. A
    /// request addressed downward is queued before its target is asked
    /// to send, and anything queued later (upward or lateral) falls
    /// beyond the watermark.
    pub(crate) fn run_action_cascade(&mut self, id: SubsystemId) -> CadenceResult<()> {
        self.ctx_hook(id, Phase::ActionRequestSend, |node, ctx| {
            node.send_action_request(ctx)
        })?;
        self.slots[id.0].send_watermark = self.slots[id.0].request_inbox.len();
        let children = self.children(id).to_vec();
        for child in children {
            self.run_action_cascade(child)?;
        }
        Ok(())
    }

    pub(crate) fn run_control_models(&mut self, id: SubsystemId) -> CadenceResult<()> {
        self.plain_hook(id, Phase::ControlModelUpdate, |node| {
            node.update_control_models()
        })
    }

    pub(crate) fn run_publish(&mut self, id: SubsystemId) -> CadenceResult<()> {
        self.plain_hook(id, Phase::ControlPublish, |node| node.publish_control())
    }

    pub(crate) fn run_cleanup(&mut self, id: SubsystemId) -> CadenceResult<()> {
        self.plain_hook(id, Phase::Cleanup, |node| node.cleanup())
    }

    // ============================================================================
    // Drain-and-dispatch (not overridable)
    // ============================================================================

    fn dispatch_requests<F>(
        &mut self,
        id: SubsystemId,
        batch: Vec<Msg>,
        phase: Phase,
        receive: F,
    ) -> CadenceResult<()>
    where
        F: Fn(&mut dyn Subsystem, &Msg, &mut ResponderContext<'_>) -> CadenceResult<()>,
    {
        if batch.is_empty() {
            return Ok(());
        }
        let mut node = self.take_node(id, phase)?;
        let name = node.name();
        let mut ctx = ResponderContext {
            tree: self,
            current: id,
        };
        let mut outcome = Ok(());
        for msg in &batch {
            if msg.is_handled() {
                trace!("'{}' skipping already-handled {:?}", name, msg);
                continue;
            }
            if let Err(source) = receive(node.as_mut(), msg, &mut ctx) {
                outcome = Err(source);
                break;
            }
        }
        self.slots[id.0].node = Some(node);
        // The drained batch is dropped here; requesters keep their own
        // handles.
        outcome.map_err(|source| Self::wrap(phase, name, source))
    }

    fn dispatch_answers<F>(
        &mut self,
        id: SubsystemId,
        phase: Phase,
        receive: F,
    ) -> CadenceResult<()>
    where
        F: Fn(&mut dyn Subsystem, &Msg) -> CadenceResult<()>,
    {
        let batch = mem::take(&mut self.slots[id.0].answer_inbox);
        if batch.is_empty() {
            return Ok(());
        }
        let mut node = self.take_node(id, phase)?;
        let name = node.name();
        let mut outcome = Ok(());
        for msg in &batch {
            if let Err(source) = receive(node.as_mut(), msg) {
                outcome = Err(source);
                break;
            }
        }
        self.slots[id.0].node = Some(node);
        outcome.map_err(|source| Self::wrap(phase, name, source))
    }

    /// Phase 3: one full drain of the request inbox.
    pub(crate) fn drain_data_requests(&mut self, id: SubsystemId) -> CadenceResult<()> {
        let batch = mem::take(&mut self.slots[id.0].request_inbox);
        self.dispatch_requests(id, batch, Phase::DataRequestReceive, |node, msg, ctx| {
            node.receive_data_request(msg, ctx)
        })
    }

    pub(crate) fn drain_data_answers(&mut self, id: SubsystemId) -> CadenceResult<()> {
        self.dispatch_answers(id, Phase::DataAnswerReceive, |node, msg| {
            node.receive_data_answer(msg)
        })
    }

    /// Phase 6: dispatch the previous cycle's deferred requests plus
    /// everything queued up to this cycle's cascade watermark; later
    /// arrivals wait in the deferred buffer for the next cycle.
    pub(crate) fn drain_action_requests(&mut self, id: SubsystemId) -> CadenceResult<()> {
        let slot = &mut self.slots[id.0];
        let watermark = slot.send_watermark.min(slot.request_inbox.len());
        let mut fresh = mem::take(&mut slot.request_inbox);
        let late = fresh.split_off(watermark);
        let mut batch = mem::replace(&mut slot.deferred_requests, late);
        batch.extend(fresh);
        self.dispatch_requests(id, batch, Phase::ActionRequestReceive, |node, msg, ctx| {
            node.receive_action_request(msg, ctx)
        })
    }

    pub(crate) fn drain_action_answers(&mut self, id: SubsystemId) -> CadenceResult<()> {
        self.dispatch_answers(id, Phase::ActionAnswerReceive, |node, msg| {
            node.receive_action_answer(msg)
        })
    }

    #[cfg(test)]
    pub(crate) fn request_inbox_len(&self, id: SubsystemId) -> usize {
        self.slots[id.0].request_inbox.len()
    }

    #[cfg(test)]
    pub(crate) fn deferred_len(&self, id: SubsystemId) -> usize {
        self.slots[id.0].deferred_requests.len()
    }
}

// ============================================================================
// Phase contexts
// ============================================================================

/// Read-only window on the tree, handed to hooks whose phase contract
/// forbids communication.
///
/// The subsystem currently executing is absent from the arena while
/// its hook runs, so `peek`ing oneself yields `None`; a hook reads its
/// own state through `self`.
pub struct SubsystemView<'a> {
    tree: &'a SubsystemTree,
    current: SubsystemId,
}

impl SubsystemView<'_> {
    pub fn id(&self) -> SubsystemId {
        self.current
    }

    pub fn owner(&self) -> Option<SubsystemId> {
        self.tree.owner(self.current)
    }

    pub fn children(&self) -> &[SubsystemId] {
        self.tree.children(self.current)
    }

    /// Typed read-only access to another subsystem. Getter calls only;
    /// there is deliberately no mutable counterpart.
    pub fn peek<T: Subsystem>(&self, id: SubsystemId) -> Option<&T> {
        self.tree.peek(id)
    }
}

/// Context for the receive hooks: read access plus the ability to
/// dispatch explicit answer messages. Requests cannot be sent from
/// here, which keeps the receive phases free of new traffic.
pub struct ResponderContext<'a> {
    tree: &'a mut SubsystemTree,
    current: SubsystemId,
}

impl ResponderContext<'_> {
    pub fn id(&self) -> SubsystemId {
        self.current
    }

    pub fn owner(&self) -> Option<SubsystemId> {
        self.tree.owner(self.current)
    }

    pub fn children(&self) -> &[SubsystemId] {
        self.tree.children(self.current)
    }

    pub fn peek<T: Subsystem>(&self, id: SubsystemId) -> Option<&T> {
        self.tree.peek(id)
    }

    /// Enqueue an answer into `target`'s answer inbox. Delivered by
    /// the answer drain pass of the same phase.
    pub fn send_answer(&mut self, target: SubsystemId, msg: &Msg) -> CadenceResult<()> {
        self.tree.deliver_answer(target, msg)
    }
}

/// Full courier context for the send phases.
pub struct SubsystemContext<'a> {
    tree: &'a mut SubsystemTree,
    current: SubsystemId,
}

impl SubsystemContext<'_> {
    pub fn id(&self) -> SubsystemId {
        self.current
    }

    pub fn owner(&self) -> Option<SubsystemId> {
        self.tree.owner(self.current)
    }

    pub fn children(&self) -> &[SubsystemId] {
        self.tree.children(self.current)
    }

    pub fn peek<T: Subsystem>(&self, id: SubsystemId) -> Option<&T> {
        self.tree.peek(id)
    }

    /// Requests queued in this subsystem's own inbox, readable during
    /// the action cascade so an instruction from above can be
    /// re-propagated downward within the same cycle.
    pub fn pending_requests(&self) -> &[Msg] {
        &self.tree.slots[self.current.0].request_inbox
    }

    /// Enqueue a request into `target`'s request inbox. Keep a clone
    /// of the message to read the response after the receive phase.
    pub fn send_request(&mut self, target: SubsystemId, msg: &Msg) -> CadenceResult<()> {
        self.tree.deliver_request(target, msg)
    }

    /// Enqueue an answer into `target`'s answer inbox.
    pub fn send_answer(&mut self, target: SubsystemId, msg: &Msg) -> CadenceResult<()> {
        self.tree.deliver_answer(target, msg)
    }
}

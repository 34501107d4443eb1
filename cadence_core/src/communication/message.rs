use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Category of a request message.
///
/// Data requests ask a subsystem to report state; action requests ask
/// it to perform or queue a state-changing operation. The scheduler
/// uses the kind only to route externally posted messages to the
/// correct receive phase; receivers dispatch on the identifier alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Data,
    Action,
}

impl fmt::Display for MsgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgKind::Data => write!(f, "data"),
            MsgKind::Action => write!(f, "action"),
        }
    }
}

struct MsgInner {
    identifier: Box<dyn Any>,
    tag: String,
    payload: Option<Box<dyn Any>>,
    result: Option<Box<dyn Any>>,
}

/// A single-use request passed between subsystems.
///
/// `Msg` is a cheap-to-clone shared handle: the sender keeps one clone
/// and enqueues another into the receiver's inbox, then reads the
/// mutated `payload`/`result` slots after the corresponding receive
/// phase has run. The identifier is an opaque tag, normally an enum
/// defined by the receiving subsystem; a receiver recovers it with
/// [`Msg::identifier`] and silently ignores tags it does not know.
///
/// Action parameters are best carried inside the identifier enum's
/// variants so each receiver can match exhaustively; the payload slot
/// then stays reserved for data responses.
///
/// A non-empty `result` marks the message as already handled: the
/// drain routines will not dispatch it again.
#[derive(Clone)]
pub struct Msg {
    kind: MsgKind,
    inner: Rc<RefCell<MsgInner>>,
}

impl Msg {
    fn new<I: Any + fmt::Debug>(kind: MsgKind, identifier: I) -> Self {
        let tag = format!("{:?}", identifier);
        Msg {
            kind,
            inner: Rc::new(RefCell::new(MsgInner {
                identifier: Box::new(identifier),
                tag,
                payload: None,
                result: None,
            })),
        }
    }

    /// Create a data request. The responder fills the payload slot.
    pub fn data<I: Any + fmt::Debug>(identifier: I) -> Self {
        Msg::new(MsgKind::Data, identifier)
    }

    /// Create an action request. Instruction parameters normally ride
    /// in the identifier's enum variant; use [`Msg::with_payload`] for
    /// instruction data that does not fit the tag.
    pub fn action<I: Any + fmt::Debug>(identifier: I) -> Self {
        Msg::new(MsgKind::Action, identifier)
    }

    /// Attach instruction data to a freshly built request.
    pub fn with_payload<T: Any>(self, payload: T) -> Self {
        self.inner.borrow_mut().payload = Some(Box::new(payload));
        self
    }

    pub fn kind(&self) -> MsgKind {
        self.kind
    }

    /// Recover the identifier as the receiver's own tag type.
    ///
    /// Returns `None` when the message carries a tag from some other
    /// vocabulary; that is the "unrecognized identifier" case and the
    /// receiver must treat it as a no-op.
    pub fn identifier<I: Any + Clone>(&self) -> Option<I> {
        self.inner.borrow().identifier.downcast_ref::<I>().cloned()
    }

    /// Fill the payload slot. Called by a data responder.
    pub fn set_payload<T: Any>(&self, value: T) {
        self.inner.borrow_mut().payload = Some(Box::new(value));
    }

    pub fn has_payload(&self) -> bool {
        self.inner.borrow().payload.is_some()
    }

    /// Consume the payload, if present and of the expected type.
    ///
    /// A payload of a different type is left in place and `None` is
    /// returned.
    pub fn take_payload<T: Any>(&self) -> Option<T> {
        let mut inner = self.inner.borrow_mut();
        match inner.payload.take() {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(value) => Some(*value),
                Err(boxed) => {
                    inner.payload = Some(boxed);
                    None
                }
            },
            None => None,
        }
    }

    /// Report an out-of-band status for this request. Setting a result
    /// marks the message as handled.
    pub fn set_result<T: Any>(&self, value: T) {
        self.inner.borrow_mut().result = Some(Box::new(value));
    }

    pub fn has_result(&self) -> bool {
        self.inner.borrow().result.is_some()
    }

    /// Consume the result, if present and of the expected type.
    pub fn take_result<T: Any>(&self) -> Option<T> {
        let mut inner = self.inner.borrow_mut();
        match inner.result.take() {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(value) => Some(*value),
                Err(boxed) => {
                    inner.result = Some(boxed);
                    None
                }
            },
            None => None,
        }
    }

    /// A handled message carries a result and is never re-dispatched.
    pub fn is_handled(&self) -> bool {
        self.has_result()
    }
}

impl fmt::Debug for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Msg")
            .field("kind", &self.kind)
            .field("identifier", &inner.tag)
            .field("payload", if inner.payload.is_some() { &"<set>" } else { &"<empty>" })
            .field("result", if inner.result.is_some() { &"<set>" } else { &"<empty>" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum LiftAction {
        Raise,
        Hold,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum LiftData {
        Height,
    }

    #[test]
    fn test_identifier_roundtrip() {
        let msg = Msg::action(LiftAction::Raise);
        assert_eq!(msg.kind(), MsgKind::Action);
        assert_eq!(msg.identifier::<LiftAction>(), Some(LiftAction::Raise));
    }

    #[test]
    fn test_unrecognized_identifier_is_none() {
        let msg = Msg::action(LiftAction::Hold);
        // A receiver with a different vocabulary sees nothing.
        assert_eq!(msg.identifier::<LiftData>(), None);
        assert!(!msg.has_payload());
        assert!(!msg.has_result());
    }

    #[test]
    fn test_payload_fill_and_take() {
        let msg = Msg::data(LiftData::Height);
        assert!(!msg.has_payload());

        msg.set_payload(42.5f64);
        assert!(msg.has_payload());

        let requester_handle = msg.clone();
        assert_eq!(requester_handle.take_payload::<f64>(), Some(42.5));
        assert!(!msg.has_payload());
    }

    #[test]
    fn test_take_payload_wrong_type_leaves_slot() {
        let msg = Msg::data(LiftData::Height);
        msg.set_payload(7u32);

        assert_eq!(msg.take_payload::<String>(), None);
        // Slot untouched, the real consumer still gets it.
        assert_eq!(msg.take_payload::<u32>(), Some(7));
    }

    #[test]
    fn test_result_marks_handled() {
        let msg = Msg::action(LiftAction::Raise);
        assert!(!msg.is_handled());

        msg.set_result("mechanism jammed".to_string());
        assert!(msg.is_handled());
        assert_eq!(
            msg.take_result::<String>().as_deref(),
            Some("mechanism jammed")
        );
        assert!(!msg.is_handled());
    }

    #[test]
    fn test_action_payload_builder() {
        let msg = Msg::action(LiftAction::Raise).with_payload(0.75f32);
        assert_eq!(msg.take_payload::<f32>(), Some(0.75));
    }

    #[test]
    fn test_clones_share_state() {
        let msg = Msg::data(LiftData::Height);
        let receiver_side = msg.clone();
        receiver_side.set_payload(3u8);
        assert_eq!(msg.take_payload::<u8>(), Some(3));
    }
}

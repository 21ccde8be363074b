//! Events: declarations, the per-broadcast view handed to callbacks, and the
//! outbox actions use to post follow-up events.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use crate::error::Error;
use crate::transition::TransitionId;

/// Dense index of an event declared on a machine.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EventId(pub(crate) usize);

impl EventId {
    /// The position of this event in the machine's event table.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque parameter payload carried alongside a queued event.
///
/// The runtime never looks inside; callbacks recover the concrete type with
/// [`EventRef::params`]. The payload is owned by the queue from enqueue until
/// the end of its broadcast.
pub type ParamBlock = Box<dyn Any + Send>;

/// An event declaration: name, optional base event, and the transitions
/// bound directly to it.
pub(crate) struct EventDecl {
    pub(crate) name: String,
    pub(crate) base: Option<EventId>,
    /// Depth in the base-event chain; a root event has precedence 0.
    pub(crate) precedence: usize,
    /// Broadcast chain: this event first, then its bases, most-derived first.
    pub(crate) chain: Vec<EventId>,
    /// Declaration-ordered ids of transitions triggered by this event.
    pub(crate) transitions: Vec<TransitionId>,
}

/// A queued `(event, parameter-block)` pair.
pub(crate) struct Pending {
    pub(crate) event: EventId,
    pub(crate) params: Option<ParamBlock>,
}

/// Name of the synthetic event under which machine entry and exit run their
/// enter/exit actions.
pub const PRIME_EVENT: &str = "<prime>";

/// The event currently being dispatched, as seen by callbacks.
pub struct EventRef<'a> {
    pub(crate) id: Option<EventId>,
    pub(crate) name: &'a str,
    pub(crate) params: Option<&'a (dyn Any + Send)>,
}

impl<'a> EventRef<'a> {
    /// View for machine entry/exit, where no user event is in flight.
    pub(crate) fn prime() -> EventRef<'static> {
        EventRef {
            id: None,
            name: PRIME_EVENT,
            params: None,
        }
    }

    /// Id of the broadcast event, or `None` for the synthetic
    /// [`PRIME_EVENT`] used during machine entry and exit.
    pub fn id(&self) -> Option<EventId> {
        self.id
    }

    /// Declared name of the broadcast event.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Downcast the parameter payload, if one was queued with the event.
    pub fn params<T: 'static>(&self) -> Option<&T> {
        self.params.and_then(|p| p.downcast_ref::<T>())
    }
}

/// Queue handle passed to actions.
///
/// Events posted here are appended to the machine's FIFO queue and dispatched
/// after the current broadcast completes, in posting order.
pub struct Outbox<'a> {
    pub(crate) queue: &'a mut VecDeque<Pending>,
    pub(crate) declared: usize,
}

impl Outbox<'_> {
    /// Append an event to the machine queue.
    ///
    /// Fails with [`Error::UnknownEvent`] when the id is outside the
    /// machine's declared event range.
    pub fn post(&mut self, event: EventId, params: Option<ParamBlock>) -> Result<(), Error> {
        if event.0 >= self.declared {
            return Err(Error::UnknownEvent(event));
        }
        self.queue.push_back(Pending { event, params });
        Ok(())
    }
}

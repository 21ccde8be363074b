//! Multi-thread access to a machine.
//!
//! [`SharedMachine`] wraps a [`Machine`] in a `critical-section` mutex so
//! several producer threads (or interrupt handlers, on bare metal) can feed
//! one dispatcher. Every operation runs inside a scoped critical section:
//! the section is released on every exit path, including unwinding, and no
//! two operations overlap: `enter`, `exit`, `queue`, and the dispatch loop
//! inside `queue` are all serialised.
//!
//! Only `queue` blocks (waiting for the section). Events are dispatched
//! exactly once, in the order their `queue` calls acquired the section.
//!
//! Callbacks run while the section is held, so they must post follow-up
//! events through their [`Outbox`](crate::Outbox) argument; calling back
//! into the same `SharedMachine` from a callback would re-acquire the
//! section and must not be done.
//!
//! A `critical-section` implementation must be linked: the `std` feature of
//! that crate for hosted targets, or a platform crate on embedded.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::error::Error;
use crate::event::{EventId, ParamBlock};
use crate::machine::Machine;
use crate::state::StateId;

/// A machine shareable between threads. Requires the context and all
/// callbacks to be `Send` (which the `concurrent` feature adds to the
/// callback aliases).
pub struct SharedMachine<C> {
    inner: Mutex<RefCell<Machine<C>>>,
}

impl<C> SharedMachine<C> {
    /// Wrap a machine for shared use.
    pub fn new(machine: Machine<C>) -> Self {
        SharedMachine {
            inner: Mutex::new(RefCell::new(machine)),
        }
    }

    /// See [`Machine::enter`].
    pub fn enter(&self) -> Result<(), Error> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().enter())
    }

    /// See [`Machine::exit`].
    pub fn exit(&self) -> Result<(), Error> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().exit())
    }

    /// Queue an event and run the machine to quiescence, all inside one
    /// critical section. See [`Machine::queue`].
    pub fn queue(&self, event: EventId, params: Option<ParamBlock>) -> Result<(), Error> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().queue(event, params))
    }

    /// Whether the machine is active.
    pub fn is_active(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().is_active())
    }

    /// Whether the given state is in the active configuration.
    pub fn is_state_active(&self, id: StateId) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().is_state_active(id))
    }

    /// Run a closure against the machine inside the critical section, e.g.
    /// to inspect or update the context between events.
    pub fn with<R>(&self, f: impl FnOnce(&mut Machine<C>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow(cs).borrow_mut()))
    }

    /// Unwrap the machine for single-threaded use.
    pub fn into_inner(self) -> Machine<C> {
        self.inner.into_inner().into_inner()
    }
}

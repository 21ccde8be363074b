//! Transitions: immutable records binding an event to a source state, an
//! optional target, an optional guard, and an optional action.

use core::fmt;

use crate::event::EventId;
use crate::state::StateId;
use crate::{ActionFn, MaybeSend, TargetFn};
use crate::error::Fault;
use crate::event::EventRef;

/// Dense index of a transition in the machine's transition table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TransitionId(pub(crate) usize);

impl TransitionId {
    /// The position of this transition in the machine's transition table.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of an interned guard condition.
///
/// Conditions are declared once on the builder and may be shared by any
/// number of transitions; a shared condition is evaluated at most once per
/// broadcast.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ConditionId(pub(crate) usize);

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a transition goes.
pub enum Target<C> {
    /// No target: the transition is internal. Its action runs without
    /// exiting or re-entering any state.
    Internal,
    /// A fixed target state.
    To(StateId),
    /// A target expression evaluated at fire time.
    Dynamic(TargetFn<C>),
}

impl<C> Target<C> {
    /// Build a dynamic target from a closure.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&C, &EventRef<'_>) -> Result<StateId, Fault> + MaybeSend + 'static,
    {
        Target::Dynamic(alloc::boxed::Box::new(f))
    }
}

/// Immutable transition record. Constructed at assembly, referenced by id
/// from the per-event transition indices.
pub(crate) struct Transition<C> {
    pub(crate) event: EventId,
    pub(crate) source: StateId,
    pub(crate) target: Target<C>,
    pub(crate) condition: Option<ConditionId>,
    pub(crate) action: Option<ActionFn<C>>,
}

//! Error surfaces of the runtime and of machine assembly.

use alloc::boxed::Box;
use thiserror::Error;

use crate::event::EventId;
use crate::state::StateId;

/// Failure value returned by user-supplied callbacks.
///
/// Actions, conditions, and dynamic-target expressions are fallible; whatever
/// error they produce is carried through the dispatch loop boxed as a `Fault`
/// and surfaced as [`Error::Callback`].
pub type Fault = Box<dyn core::error::Error + Send + Sync>;

/// Errors reported by a running [`Machine`](crate::Machine).
#[derive(Debug, Error)]
pub enum Error {
    /// `queue` was called before `enter`.
    #[error("machine is not active")]
    NotActive,

    /// `enter` was called while the machine is already active.
    #[error("machine is already active")]
    AlreadyActive,

    /// The event id is outside the declared range of this machine.
    #[error("unknown event id {0}")]
    UnknownEvent(EventId),

    /// An action, condition, or target expression returned an error.
    ///
    /// The configuration reflects every exit performed before the failing
    /// callback and the event queue is preserved; `run` resumes the
    /// remaining macrostep.
    #[error("user callback failed: {0}")]
    Callback(Fault),
}

/// Errors detected while assembling a machine with
/// [`MachineBuilder::build`](crate::MachineBuilder::build).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// A state was attached to a leaf, which cannot hold children.
    #[error("state {child} has leaf state {parent} as parent")]
    LeafParent {
        /// The offending parent id.
        parent: StateId,
        /// The state that was attached to it.
        child: StateId,
    },

    /// A cluster or set was declared without any children.
    #[error("cluster or set {0} has no children")]
    ChildlessParent(StateId),

    /// History was requested on a state that is not a cluster.
    #[error("state {0} is not a cluster and cannot carry history")]
    HistoryOnNonCluster(StateId),

    /// An id passed to the builder was not issued by it.
    #[error("id {0} was not issued by this builder")]
    ForeignId(usize),
}

//! States of the hierarchy: leaves, XOR clusters, and AND sets.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::ActionFn;

/// Dense index of a state in the machine's state arena.
///
/// The root cluster is always id 0. Ids are assigned by the
/// [`MachineBuilder`](crate::MachineBuilder) in declaration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// The position of this state in the machine's state arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// History behavior of a cluster on default (non-targeted) entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum History {
    /// Always enter the first declared child.
    #[default]
    None,
    /// Re-enter the most recently active child; that child then enters by
    /// its own rules.
    Shallow,
    /// Re-enter the most recently active child and force every descendant
    /// cluster to restore its own most recently active child in turn.
    Deep,
}

/// What a state is: a leaf, an XOR parent, or an AND parent.
pub(crate) enum Kind {
    Leaf,
    Cluster {
        history: History,
        children: Vec<StateId>,
        /// Most recently active child; feeds history on re-entry and is
        /// preserved across exits.
        last_active: Option<StateId>,
    },
    Set {
        children: Vec<StateId>,
    },
}

/// A node of the state arena.
pub(crate) struct State<C> {
    pub(crate) name: String,
    pub(crate) parent: Option<StateId>,
    /// Root is 0; each level below adds one.
    pub(crate) depth: usize,
    pub(crate) active: bool,
    pub(crate) enter_action: Option<ActionFn<C>>,
    pub(crate) exit_action: Option<ActionFn<C>>,
    pub(crate) kind: Kind,
}

impl<C> State<C> {
    pub(crate) fn children(&self) -> &[StateId] {
        match &self.kind {
            Kind::Leaf => &[],
            Kind::Cluster { children, .. } | Kind::Set { children } => children,
        }
    }
}

//! The machine: arena owner, event queue, and dispatch core.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::error::Error;
use crate::event::{EventDecl, EventId, EventRef, Outbox, ParamBlock, Pending};
use crate::state::{History, Kind, State, StateId};
use crate::transition::{Target, Transition, TransitionId};
use crate::ConditionFn;

// Indented trace lines through the `log` facade; compiles to nothing
// without the `logging` feature.
#[cfg(feature = "logging")]
macro_rules! trace {
    ($indent:expr, $($arg:tt)*) => {
        log::debug!("{:width$}{}", "", format_args!($($arg)*), width = $indent * 2)
    };
}
#[cfg(not(feature = "logging"))]
macro_rules! trace {
    ($indent:expr, $($arg:tt)*) => {{
        let _ = $indent;
    }};
}

/// A runnable hierarchical state machine.
///
/// Owns every state, transition, condition, and event declared by its
/// [`MachineBuilder`](crate::MachineBuilder), the FIFO queue of pending
/// events, and the user context value handed to callbacks.
pub struct Machine<C> {
    states: Vec<State<C>>,
    transitions: Vec<Transition<C>>,
    conditions: Vec<ConditionFn<C>>,
    events: Vec<EventDecl>,
    queue: VecDeque<Pending>,
    in_progress: bool,
    debug_indent: usize,
    context: C,
}

/// How a selected transition will fire.
#[derive(Clone, Copy)]
enum Plan {
    Internal,
    External {
        target: StateId,
        /// Least common ancestor of the source's and target's parent
        /// chains; `None` when the scope reaches above the root.
        lca: Option<StateId>,
        /// Ancestor of the source just below the LCA; its active subtree
        /// is the exit scope.
        cut: StateId,
    },
}

/// A candidate transition that passed its guard, with its resolved plan.
#[derive(Clone, Copy)]
struct Armed {
    id: TransitionId,
    source_depth: usize,
    plan: Plan,
}

impl<C> Machine<C> {
    pub(crate) fn assemble(
        states: Vec<State<C>>,
        events: Vec<EventDecl>,
        conditions: Vec<ConditionFn<C>>,
        transitions: Vec<Transition<C>>,
        context: C,
    ) -> Self {
        Machine {
            states,
            transitions,
            conditions,
            events,
            queue: VecDeque::new(),
            in_progress: false,
            debug_indent: 0,
            context,
        }
    }

    /// Shared borrow of the user context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Exclusive borrow of the user context.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Whether the machine has been entered and not yet exited.
    pub fn is_active(&self) -> bool {
        self.states[0].active
    }

    /// Whether the given state is in the active configuration.
    pub fn is_state_active(&self, id: StateId) -> bool {
        self.states.get(id.0).is_some_and(|s| s.active)
    }

    /// The active configuration, in state-id order.
    pub fn active_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.active)
            .map(|(id, _)| StateId(id))
    }

    /// Declared name of a state.
    pub fn state_name(&self, id: StateId) -> Option<&str> {
        self.states.get(id.0).map(|s| s.name.as_str())
    }

    /// Declared name of an event.
    pub fn event_name(&self, id: EventId) -> Option<&str> {
        self.events.get(id.0).map(|e| e.name.as_str())
    }

    /// Depth of an event in its base-event chain; a root event has
    /// precedence 0.
    pub fn event_precedence(&self, id: EventId) -> Option<usize> {
        self.events.get(id.0).map(|e| e.precedence)
    }

    /// Most recently active child of a cluster, as history would restore it.
    pub fn last_active_child(&self, cluster: StateId) -> Option<StateId> {
        match &self.states.get(cluster.0)?.kind {
            Kind::Cluster { last_active, .. } => *last_active,
            _ => None,
        }
    }

    /// Place the root cluster in the active configuration.
    ///
    /// Entry proceeds top-down from the root, honoring history, and runs
    /// enter actions under the synthetic [`PRIME_EVENT`](crate::PRIME_EVENT).
    /// Events posted by enter actions stay queued until the next
    /// [`queue`](Self::queue) or [`run`](Self::run).
    pub fn enter(&mut self) -> Result<(), Error> {
        if self.states[0].active {
            return Err(Error::AlreadyActive);
        }
        trace!(self.debug_indent, "machine enter");
        let mut entries = Vec::new();
        collect_entries(&self.states, StateId(0), false, &[], false, &mut entries);
        let ev = EventRef::prime();
        self.execute_entries(&entries, &ev)
    }

    /// Deactivate the entire hierarchy, deepest states first, running exit
    /// actions. A no-op on an inactive machine. History (`last_active`
    /// bookkeeping) survives for a later re-entry.
    pub fn exit(&mut self) -> Result<(), Error> {
        if !self.states[0].active {
            return Ok(());
        }
        trace!(self.debug_indent, "machine exit");
        let mut exits = Vec::new();
        collect_exits(&self.states, StateId(0), &mut exits);
        let ev = EventRef::prime();
        self.execute_exits(&exits, &ev)
    }

    /// Append an event to the queue and, unless a dispatch is already in
    /// progress, run the queue to quiescence.
    pub fn queue(&mut self, event: EventId, params: Option<ParamBlock>) -> Result<(), Error> {
        if event.0 >= self.events.len() {
            return Err(Error::UnknownEvent(event));
        }
        if !self.states[0].active {
            return Err(Error::NotActive);
        }
        self.queue.push_back(Pending { event, params });
        if self.in_progress {
            return Ok(());
        }
        self.run()
    }

    /// Dispatch queued events until the queue drains.
    ///
    /// A no-op on an inactive machine and when called re-entrantly. On a
    /// callback failure the affected broadcast is abandoned, the queue is
    /// preserved, and calling `run` again resumes the macrostep.
    pub fn run(&mut self) -> Result<(), Error> {
        if !self.states[0].active || self.in_progress {
            return Ok(());
        }
        self.in_progress = true;
        while let Some(pending) = self.queue.pop_front() {
            if let Err(error) = self.broadcast(pending) {
                self.in_progress = false;
                return Err(error);
            }
        }
        self.in_progress = false;
        Ok(())
    }

    /// Dispatch one event: collect candidates along the base-event chain,
    /// evaluate guards once each, resolve conflicts, and fire the winners.
    fn broadcast(&mut self, pending: Pending) -> Result<(), Error> {
        let name = self.events[pending.event.0].name.clone();
        trace!(self.debug_indent, "broadcast {} begin", name);
        self.debug_indent += 1;
        let result = self.dispatch_broadcast(&name, pending);
        self.debug_indent -= 1;
        trace!(self.debug_indent, "broadcast {} end", name);
        result
    }

    fn dispatch_broadcast(&mut self, name: &str, pending: Pending) -> Result<(), Error> {
        let event = pending.event;
        let ev = EventRef {
            id: Some(event),
            name,
            params: pending.params.as_deref(),
        };

        // Candidates: walk the base chain most-derived first, keeping each
        // event's transitions in declaration order, sources must be active.
        let chain = self.events[event.0].chain.clone();
        let mut candidates: Vec<TransitionId> = Vec::new();
        for &chained in &chain {
            for &t in &self.events[chained.0].transitions {
                if self.states[self.transitions[t.0].source.0].active {
                    candidates.push(t);
                }
            }
        }

        // Guard evaluation, cached per condition for this broadcast.
        let mut cache: Vec<Option<bool>> = alloc::vec![None; self.conditions.len()];
        let mut armed: Vec<Armed> = Vec::new();
        for t in candidates {
            let transition = &self.transitions[t.0];
            let enabled = match transition.condition {
                None => true,
                Some(c) => match cache[c.0] {
                    Some(cached) => cached,
                    None => {
                        let condition = &self.conditions[c.0];
                        let value =
                            condition(&self.context, &ev).map_err(Error::Callback)?;
                        cache[c.0] = Some(value);
                        value
                    }
                },
            };
            if !enabled {
                continue;
            }
            let source = transition.source;
            let target = match &transition.target {
                Target::Internal => None,
                Target::To(s) => Some(*s),
                Target::Dynamic(expr) => {
                    let s = expr(&self.context, &ev).map_err(Error::Callback)?;
                    if s.0 >= self.states.len() {
                        #[cfg(feature = "logging")]
                        log::warn!(
                            "transition {}: dynamic target {} out of range, skipped",
                            t.0,
                            s.0
                        );
                        continue;
                    }
                    Some(s)
                }
            };
            let plan = match target {
                None => Plan::Internal,
                Some(target) => {
                    // A set cannot stay active with one region exited, so
                    // the transition scope climbs past set ancestors: a
                    // cross-region transition exits and re-enters the
                    // whole set.
                    let mut lca = lca_of(&self.states, source, target);
                    while let Some(l) = lca {
                        if matches!(self.states[l.0].kind, Kind::Set { .. }) {
                            lca = self.states[l.0].parent;
                        } else {
                            break;
                        }
                    }
                    let cut = cut_below(&self.states, source, lca);
                    Plan::External { target, lca, cut }
                }
            };
            armed.push(Armed {
                id: t,
                source_depth: self.states[source.0].depth,
                plan,
            });
        }

        // Conflict resolution: deepest source first, declaration order as
        // the tie-break; a transition loses when its exit scope overlaps a
        // scope already claimed.
        let mut order: Vec<usize> = (0..armed.len()).collect();
        order.sort_by(|&a, &b| {
            armed[b]
                .source_depth
                .cmp(&armed[a].source_depth)
                .then(armed[a].id.0.cmp(&armed[b].id.0))
        });
        let mut winners: Vec<usize> = Vec::new();
        for i in order {
            let conflict = match armed[i].plan {
                Plan::Internal => false,
                Plan::External { cut, .. } => winners.iter().any(|&w| match armed[w].plan {
                    Plan::Internal => false,
                    Plan::External { cut: claimed, .. } => {
                        is_ancestor_or_eq(&self.states, cut, claimed)
                            || is_ancestor_or_eq(&self.states, claimed, cut)
                    }
                }),
            };
            if conflict {
                trace!(
                    self.debug_indent,
                    "transition {} suppressed by conflict",
                    armed[i].id
                );
                continue;
            }
            winners.push(i);
        }
        winners.sort_by_key(|&i| armed[i].id.0);

        // Fire in declaration order: exits, then the action, then entries.
        for &i in &winners {
            let Armed { id: t, plan, .. } = armed[i];
            let source = self.transitions[t.0].source;
            if !self.states[source.0].active {
                trace!(
                    self.debug_indent,
                    "transition {} skipped, source no longer active",
                    t
                );
                continue;
            }
            match plan {
                Plan::Internal => {
                    trace!(
                        self.debug_indent,
                        "transition {} internal at {}",
                        t,
                        self.states[source.0].name
                    );
                    self.run_transition_action(t, &ev)?;
                }
                Plan::External { target, lca, cut } => {
                    trace!(
                        self.debug_indent,
                        "transition {}: {} -> {}",
                        t,
                        self.states[source.0].name,
                        self.states[target.0].name
                    );
                    let mut exits = Vec::new();
                    collect_exits(&self.states, cut, &mut exits);
                    self.execute_exits(&exits, &ev)?;
                    self.run_transition_action(t, &ev)?;

                    let mut descent: Vec<StateId> = Vec::new();
                    let mut cursor = Some(target);
                    while let Some(s) = cursor {
                        if Some(s) == lca {
                            break;
                        }
                        descent.push(s);
                        cursor = self.states[s.0].parent;
                    }
                    descent.reverse();
                    if let Some((&top, rest)) = descent.split_first() {
                        let mut entries = Vec::new();
                        collect_entries(&self.states, top, false, rest, false, &mut entries);
                        self.execute_entries(&entries, &ev)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn run_transition_action(&mut self, t: TransitionId, ev: &EventRef<'_>) -> Result<(), Error> {
        let declared = self.events.len();
        let transition = &mut self.transitions[t.0];
        if let Some(action) = transition.action.as_mut() {
            trace!(self.debug_indent, "action of transition {}", t);
            let mut outbox = Outbox {
                queue: &mut self.queue,
                declared,
            };
            action(&mut self.context, ev, &mut outbox).map_err(Error::Callback)?;
        }
        Ok(())
    }

    /// Deactivate states in the given (deepest-first) order, running exit
    /// actions. Already-inactive states are passed over.
    fn execute_exits(&mut self, exits: &[StateId], ev: &EventRef<'_>) -> Result<(), Error> {
        let declared = self.events.len();
        for &id in exits {
            if !self.states[id.0].active {
                continue;
            }
            self.states[id.0].active = false;
            trace!(self.debug_indent, "exit {}", self.states[id.0].name);
            let state = &mut self.states[id.0];
            if let Some(action) = state.exit_action.as_mut() {
                let mut outbox = Outbox {
                    queue: &mut self.queue,
                    declared,
                };
                action(&mut self.context, ev, &mut outbox).map_err(Error::Callback)?;
            }
        }
        Ok(())
    }

    /// Activate states in the given (top-down) order, running enter actions
    /// and updating cluster history bookkeeping. Entering an already-active
    /// state is a no-op.
    fn execute_entries(
        &mut self,
        entries: &[(StateId, bool)],
        ev: &EventRef<'_>,
    ) -> Result<(), Error> {
        let declared = self.events.len();
        for &(id, restored) in entries {
            if self.states[id.0].active {
                continue;
            }
            // XOR invariant: the exit phase must have cleared any sibling
            // before a cluster child is entered.
            if let Some(parent) = self.states[id.0].parent {
                if let Kind::Cluster { children, .. } = &self.states[parent.0].kind {
                    debug_assert!(
                        !children.iter().any(|&c| c != id && self.states[c.0].active)
                    );
                }
            }

            if restored {
                trace!(self.debug_indent, "restore history: {}", self.states[id.0].name);
            }
            self.states[id.0].active = true;
            if let Some(parent) = self.states[id.0].parent {
                if let Kind::Cluster { last_active, .. } = &mut self.states[parent.0].kind {
                    *last_active = Some(id);
                }
            }
            trace!(self.debug_indent, "enter {}", self.states[id.0].name);
            let state = &mut self.states[id.0];
            if let Some(action) = state.enter_action.as_mut() {
                let mut outbox = Outbox {
                    queue: &mut self.queue,
                    declared,
                };
                action(&mut self.context, ev, &mut outbox).map_err(Error::Callback)?;
            }
        }
        Ok(())
    }
}

/// Deepest common node of the parent chains of `source` and `target`.
///
/// Computed over parents, not the states themselves, so a self-transition
/// (and a target that is an ancestor of its source) exits and re-enters.
/// `None` when one of the two is the root.
fn lca_of<C>(states: &[State<C>], source: StateId, target: StateId) -> Option<StateId> {
    let mut a = states[source.0].parent;
    let mut b = states[target.0].parent;
    loop {
        match (a, b) {
            (Some(x), Some(y)) if x == y => return Some(x),
            (Some(x), Some(y)) => {
                let (dx, dy) = (states[x.0].depth, states[y.0].depth);
                if dx >= dy {
                    a = states[x.0].parent;
                }
                if dy >= dx {
                    b = states[y.0].parent;
                }
            }
            _ => return None,
        }
    }
}

/// Ancestor of `source` sitting just below `lca`; the root of the exit
/// scope. With no LCA the scope is the whole tree, rooted at state 0.
fn cut_below<C>(states: &[State<C>], source: StateId, lca: Option<StateId>) -> StateId {
    let depth = lca.map_or(0, |l| states[l.0].depth + 1);
    let mut cursor = source;
    while states[cursor.0].depth > depth {
        match states[cursor.0].parent {
            Some(parent) => cursor = parent,
            None => break,
        }
    }
    cursor
}

fn is_ancestor_or_eq<C>(states: &[State<C>], ancestor: StateId, node: StateId) -> bool {
    let mut cursor = node;
    while states[cursor.0].depth > states[ancestor.0].depth {
        match states[cursor.0].parent {
            Some(parent) => cursor = parent,
            None => return false,
        }
    }
    cursor == ancestor
}

/// Active states of the subtree under `top` in exit order: depth-first
/// post-order, set children in reverse declaration order.
fn collect_exits<C>(states: &[State<C>], top: StateId, out: &mut Vec<StateId>) {
    if !states[top.0].active {
        return;
    }
    match &states[top.0].kind {
        Kind::Leaf => {}
        Kind::Cluster { children, .. } => {
            if let Some(child) = children.iter().copied().find(|c| states[c.0].active) {
                collect_exits(states, child, out);
            }
        }
        Kind::Set { children } => {
            for &child in children.iter().rev() {
                collect_exits(states, child, out);
            }
        }
    }
    out.push(top);
}

/// Entry order under `top`: pre-order, following `path` where given, then
/// completing the configuration by cluster history/first-child rules and
/// set fan-out. The flag on each element records a history restoration.
/// `deep` forces descendant clusters to restore their last active child.
fn collect_entries<C>(
    states: &[State<C>],
    top: StateId,
    restored: bool,
    path: &[StateId],
    deep: bool,
    out: &mut Vec<(StateId, bool)>,
) {
    out.push((top, restored));
    match &states[top.0].kind {
        Kind::Leaf => {}
        Kind::Cluster {
            history,
            children,
            last_active,
        } => {
            if let Some((&next, rest)) = path.split_first() {
                collect_entries(states, next, false, rest, deep, out);
            } else {
                let Some(&first) = children.first() else {
                    return;
                };
                let restore = deep || !matches!(history, History::None);
                let (child, via_history) = match (restore, last_active) {
                    (true, Some(last)) => (*last, true),
                    _ => (first, false),
                };
                let deep_next = deep || matches!(history, History::Deep);
                collect_entries(states, child, via_history, &[], deep_next, out);
            }
        }
        Kind::Set { children } => {
            for &child in children {
                if path.first() == Some(&child) {
                    collect_entries(states, child, false, &path[1..], deep, out);
                } else {
                    collect_entries(states, child, false, &[], deep, out);
                }
            }
        }
    }
}

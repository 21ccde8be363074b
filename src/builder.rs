//! Machine assembly.
//!
//! The builder is the runtime half of the machine assembly contract: a
//! front-end (generated code or handwritten setup) declares states, events,
//! conditions, and transitions in order, then [`MachineBuilder::build`]
//! validates the whole description atomically and produces a [`Machine`].
//!
//! Ids are dense and assigned in declaration order; a parent id must already
//! exist when a child is declared, so the hierarchy is a tree by
//! construction, and a base event must already exist when a derived event is
//! declared, so inheritance chains are acyclic by construction.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{BuildError, Fault};
use crate::event::{EventDecl, EventId, EventRef};
use crate::machine::Machine;
use crate::state::{History, Kind, State, StateId};
use crate::transition::{ConditionId, Target, Transition, TransitionId};
use crate::{ConditionFn, MaybeSend, Outbox};

/// Assembles a [`Machine`] from ordered declarations.
///
/// See the crate-level quick start for a complete example.
pub struct MachineBuilder<C> {
    states: Vec<State<C>>,
    events: Vec<EventDecl>,
    conditions: Vec<ConditionFn<C>>,
    transitions: Vec<Transition<C>>,
    history_marks: Vec<(StateId, History)>,
    foreign: Option<usize>,
}

impl<C> MachineBuilder<C> {
    /// Start a machine description. The root cluster is created here and is
    /// always state id 0.
    pub fn new(root_name: &str) -> Self {
        let root = State {
            name: root_name.into(),
            parent: None,
            depth: 0,
            active: false,
            enter_action: None,
            exit_action: None,
            kind: Kind::Cluster {
                history: History::None,
                children: Vec::new(),
                last_active: None,
            },
        };
        MachineBuilder {
            states: alloc::vec![root],
            events: Vec::new(),
            conditions: Vec::new(),
            transitions: Vec::new(),
            history_marks: Vec::new(),
            foreign: None,
        }
    }

    /// Id of the root cluster.
    pub fn root(&self) -> StateId {
        StateId(0)
    }

    /// Declare a cluster (XOR parent) under `parent`.
    pub fn cluster(&mut self, name: &str, parent: StateId) -> StateId {
        self.add_state(
            name,
            parent,
            Kind::Cluster {
                history: History::None,
                children: Vec::new(),
                last_active: None,
            },
        )
    }

    /// Declare a set (AND parent) under `parent`.
    pub fn set(&mut self, name: &str, parent: StateId) -> StateId {
        self.add_state(name, parent, Kind::Set { children: Vec::new() })
    }

    /// Declare a leaf state under `parent`.
    pub fn leaf(&mut self, name: &str, parent: StateId) -> StateId {
        self.add_state(name, parent, Kind::Leaf)
    }

    /// Give a cluster history behavior on default entry.
    pub fn history(&mut self, cluster: StateId, history: History) -> &mut Self {
        self.history_marks.push((cluster, history));
        self
    }

    /// Attach an enter action to a state.
    pub fn on_enter<F>(&mut self, state: StateId, action: F) -> &mut Self
    where
        F: FnMut(&mut C, &EventRef<'_>, &mut Outbox<'_>) -> Result<(), Fault>
            + MaybeSend
            + 'static,
    {
        match self.states.get_mut(state.0) {
            Some(s) => s.enter_action = Some(Box::new(action)),
            None => self.mark_foreign(state.0),
        }
        self
    }

    /// Attach an exit action to a state.
    pub fn on_exit<F>(&mut self, state: StateId, action: F) -> &mut Self
    where
        F: FnMut(&mut C, &EventRef<'_>, &mut Outbox<'_>) -> Result<(), Fault>
            + MaybeSend
            + 'static,
    {
        match self.states.get_mut(state.0) {
            Some(s) => s.exit_action = Some(Box::new(action)),
            None => self.mark_foreign(state.0),
        }
        self
    }

    /// Declare an event.
    pub fn event(&mut self, name: &str) -> EventId {
        self.add_event(name, None)
    }

    /// Declare an event derived from `base`. Broadcasting the derived event
    /// also fires transitions bound to `base` (and to its bases in turn).
    pub fn derived_event(&mut self, name: &str, base: EventId) -> EventId {
        self.add_event(name, Some(base))
    }

    /// Intern a guard condition.
    ///
    /// The returned id may guard any number of transitions; within one
    /// broadcast the condition is evaluated at most once and its result
    /// shared.
    pub fn condition<F>(&mut self, condition: F) -> ConditionId
    where
        F: Fn(&C, &EventRef<'_>) -> Result<bool, Fault> + MaybeSend + 'static,
    {
        let id = ConditionId(self.conditions.len());
        self.conditions.push(Box::new(condition));
        id
    }

    /// Declare a transition on `event` out of `source`.
    ///
    /// The returned handle attaches an optional guard and action:
    ///
    /// ```rust
    /// # use chsm_rt::{MachineBuilder, Target};
    /// # let mut b = MachineBuilder::<u32>::new("root");
    /// # let root = b.root();
    /// # let a = b.leaf("a", root);
    /// # let bb = b.leaf("b", root);
    /// # let ev = b.event("go");
    /// let armed = b.condition(|count: &u32, _ev| Ok(*count > 0));
    /// b.transition(ev, a, Target::To(bb))
    ///     .guard(armed)
    ///     .effect(|count, _ev, _out| {
    ///         *count -= 1;
    ///         Ok(())
    ///     });
    /// # assert!(b.build(1).is_ok());
    /// ```
    pub fn transition(
        &mut self,
        event: EventId,
        source: StateId,
        target: Target<C>,
    ) -> TransitionHandle<'_, C> {
        let id = TransitionId(self.transitions.len());
        self.transitions.push(Transition {
            event,
            source,
            target,
            condition: None,
            action: None,
        });
        TransitionHandle { builder: self, id }
    }

    /// Validate the whole description and assemble the machine around the
    /// user context value.
    pub fn build(self, context: C) -> Result<Machine<C>, BuildError> {
        let MachineBuilder {
            mut states,
            mut events,
            conditions,
            transitions,
            history_marks,
            foreign,
        } = self;

        if let Some(id) = foreign {
            return Err(BuildError::ForeignId(id));
        }

        for (id, history) in history_marks {
            match states.get_mut(id.0) {
                Some(state) => match &mut state.kind {
                    Kind::Cluster { history: h, .. } => *h = history,
                    _ => return Err(BuildError::HistoryOnNonCluster(id)),
                },
                None => return Err(BuildError::ForeignId(id.0)),
            }
        }

        for child in 1..states.len() {
            let parent = match states[child].parent {
                Some(p) => p,
                None => continue,
            };
            if parent.0 >= child {
                return Err(BuildError::ForeignId(parent.0));
            }
            if matches!(states[parent.0].kind, Kind::Leaf) {
                return Err(BuildError::LeafParent {
                    parent,
                    child: StateId(child),
                });
            }
        }

        for (id, state) in states.iter().enumerate() {
            if !matches!(state.kind, Kind::Leaf) && state.children().is_empty() {
                return Err(BuildError::ChildlessParent(StateId(id)));
            }
        }

        for id in 0..events.len() {
            if let Some(base) = events[id].base {
                if base.0 >= id {
                    return Err(BuildError::ForeignId(base.0));
                }
            }
        }
        for id in 0..events.len() {
            let mut chain = alloc::vec![EventId(id)];
            let mut base = events[id].base;
            while let Some(b) = base {
                chain.push(b);
                base = events[b.0].base;
            }
            events[id].precedence = chain.len() - 1;
            events[id].chain = chain;
        }

        for transition in &transitions {
            if transition.event.0 >= events.len() {
                return Err(BuildError::ForeignId(transition.event.0));
            }
            if transition.source.0 >= states.len() {
                return Err(BuildError::ForeignId(transition.source.0));
            }
            if let Target::To(target) = &transition.target {
                if target.0 >= states.len() {
                    return Err(BuildError::ForeignId(target.0));
                }
            }
            if let Some(condition) = transition.condition {
                if condition.0 >= conditions.len() {
                    return Err(BuildError::ForeignId(condition.0));
                }
            }
        }

        for (id, transition) in transitions.iter().enumerate() {
            events[transition.event.0].transitions.push(TransitionId(id));
        }

        Ok(Machine::assemble(states, events, conditions, transitions, context))
    }

    fn add_state(&mut self, name: &str, parent: StateId, kind: Kind) -> StateId {
        let id = StateId(self.states.len());
        let depth = match self.states.get(parent.0) {
            Some(p) => p.depth + 1,
            None => {
                self.mark_foreign(parent.0);
                1
            }
        };
        self.states.push(State {
            name: name.into(),
            parent: Some(parent),
            depth,
            active: false,
            enter_action: None,
            exit_action: None,
            kind,
        });
        if let Some(p) = self.states.get_mut(parent.0) {
            match &mut p.kind {
                Kind::Cluster { children, .. } | Kind::Set { children } => children.push(id),
                Kind::Leaf => {}
            }
        }
        id
    }

    fn add_event(&mut self, name: &str, base: Option<EventId>) -> EventId {
        let id = EventId(self.events.len());
        self.events.push(EventDecl {
            name: name.into(),
            base,
            precedence: 0,
            chain: Vec::new(),
            transitions: Vec::new(),
        });
        id
    }

    fn mark_foreign(&mut self, id: usize) {
        if self.foreign.is_none() {
            self.foreign = Some(id);
        }
    }
}

/// Fluent handle over a freshly declared transition.
pub struct TransitionHandle<'b, C> {
    builder: &'b mut MachineBuilder<C>,
    id: TransitionId,
}

impl<C> TransitionHandle<'_, C> {
    /// Guard the transition with an interned condition.
    pub fn guard(self, condition: ConditionId) -> Self {
        self.builder.transitions[self.id.0].condition = Some(condition);
        self
    }

    /// Attach the transition action, run between the exit and entry phases.
    pub fn effect<F>(self, action: F) -> Self
    where
        F: FnMut(&mut C, &EventRef<'_>, &mut Outbox<'_>) -> Result<(), Fault>
            + MaybeSend
            + 'static,
    {
        self.builder.transitions[self.id.0].action = Some(Box::new(action));
        self
    }

    /// Id of the declared transition.
    pub fn id(&self) -> TransitionId {
        self.id
    }
}

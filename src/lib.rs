//! # chsm-rt: Concurrent Hierarchical State Machine Runtime
//!
//! An execution engine for statechart-style machines built from nested
//! **clusters** (XOR composition: exactly one child active) and **sets**
//! (AND composition: all children active), driven by broadcast events.
//!
//! ## Design Philosophy
//!
//! - **Arena ownership:** The machine owns every state and transition in
//!   dense arrays; hierarchy links are integer ids, never back-pointers.
//! - **Run to quiescence:** Queueing an event drains the whole queue;
//!   events posted by actions are dispatched in FIFO order before control
//!   returns.
//! - **Deterministic firing:** Guard results are cached per broadcast,
//!   conflicts resolve innermost-first with declaration order as the
//!   tie-break, and exit/entry paths follow the least common ancestor.
//! - **`no_std` + `alloc`:** Usable anywhere an allocator exists; threads
//!   and tracing are opt-in features.
//!
//! ## Quick Start
//!
//! ```rust
//! use chsm_rt::{MachineBuilder, Target};
//!
//! struct Lamp {
//!     switches: u32,
//! }
//!
//! let mut b = MachineBuilder::new("lamp");
//! let root = b.root();
//! let off = b.leaf("off", root);
//! let on = b.leaf("on", root);
//! let flip = b.event("flip");
//! b.transition(flip, off, Target::To(on))
//!     .effect(|lamp: &mut Lamp, _ev, _out| {
//!         lamp.switches += 1;
//!         Ok(())
//!     });
//! b.transition(flip, on, Target::To(off));
//!
//! let mut machine = b.build(Lamp { switches: 0 }).unwrap();
//! machine.enter().unwrap();
//! assert!(machine.is_state_active(off));
//!
//! machine.queue(flip, None).unwrap();
//! assert!(machine.is_state_active(on));
//! assert_eq!(machine.context().switches, 1);
//! ```
//!
//! ## Features
//!
//! - `logging`: indented dispatch trace through the `log` facade
//! - `concurrent`: the `sync` module, sharing one machine between threads
//!   with every operation serialised in a critical section
//!
//! ## Demos
//!
//! See the `demos/` directory:
//! - `microwave.rs`: clusters, guards, and shallow history
//! - `intersection.rs`: a set of concurrent clusters

#![no_std]

extern crate alloc;

mod builder;
mod error;
mod event;
mod machine;
mod state;
mod transition;

#[cfg(feature = "concurrent")]
pub mod sync;

pub use builder::{MachineBuilder, TransitionHandle};
pub use error::{BuildError, Error, Fault};
pub use event::{EventId, EventRef, Outbox, ParamBlock, PRIME_EVENT};
pub use machine::Machine;
pub use state::{History, StateId};
pub use transition::{ConditionId, Target, TransitionId};

use alloc::boxed::Box;

/// Bound placed on user callbacks: `Send` when the `concurrent` feature is
/// enabled, nothing otherwise. Implemented for every eligible type; never
/// implement it yourself.
#[cfg(feature = "concurrent")]
pub trait MaybeSend: Send {}
#[cfg(feature = "concurrent")]
impl<T: Send + ?Sized> MaybeSend for T {}

/// Bound placed on user callbacks: `Send` when the `concurrent` feature is
/// enabled, nothing otherwise. Implemented for every eligible type; never
/// implement it yourself.
#[cfg(not(feature = "concurrent"))]
pub trait MaybeSend {}
#[cfg(not(feature = "concurrent"))]
impl<T: ?Sized> MaybeSend for T {}

/// An enter action, exit action, or transition action.
///
/// Receives the machine context, the event being dispatched, and an
/// [`Outbox`] for posting follow-up events.
#[cfg(not(feature = "concurrent"))]
pub type ActionFn<C> =
    Box<dyn FnMut(&mut C, &EventRef<'_>, &mut Outbox<'_>) -> Result<(), Fault>>;
/// An enter action, exit action, or transition action.
///
/// Receives the machine context, the event being dispatched, and an
/// [`Outbox`] for posting follow-up events.
#[cfg(feature = "concurrent")]
pub type ActionFn<C> =
    Box<dyn FnMut(&mut C, &EventRef<'_>, &mut Outbox<'_>) -> Result<(), Fault> + Send>;

/// A guard condition. Evaluated at most once per broadcast; the result is
/// cached and shared by every transition referencing the same condition.
#[cfg(not(feature = "concurrent"))]
pub type ConditionFn<C> = Box<dyn Fn(&C, &EventRef<'_>) -> Result<bool, Fault>>;
/// A guard condition. Evaluated at most once per broadcast; the result is
/// cached and shared by every transition referencing the same condition.
#[cfg(feature = "concurrent")]
pub type ConditionFn<C> = Box<dyn Fn(&C, &EventRef<'_>) -> Result<bool, Fault> + Send>;

/// A target expression: resolves the destination state of a transition at
/// fire time.
#[cfg(not(feature = "concurrent"))]
pub type TargetFn<C> = Box<dyn Fn(&C, &EventRef<'_>) -> Result<StateId, Fault>>;
/// A target expression: resolves the destination state of a transition at
/// fire time.
#[cfg(feature = "concurrent")]
pub type TargetFn<C> = Box<dyn Fn(&C, &EventRef<'_>) -> Result<StateId, Fault> + Send>;

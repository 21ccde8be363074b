//! Guard condition tests
//!
//! Guards are interned on the builder and evaluated at most once per
//! broadcast; conflicting transitions resolve innermost-first with
//! declaration order as the tie-break.

use core::cell::Cell;

use chsm_rt::{MachineBuilder, Target};

#[derive(Default)]
struct Counters {
    guard_calls: Cell<u32>,
    fired: Vec<&'static str>,
}

// ============================================================================
// Test 1: Shared Guard Evaluated Once Per Broadcast
// ============================================================================

#[test]
fn shared_guard_is_evaluated_once() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let e = b.event("e");
    let g = b.condition(|c: &Counters, _ev| {
        c.guard_calls.set(c.guard_calls.get() + 1);
        Ok(true)
    });
    // Two internal transitions on the same state share one guard; both fire
    // and the guard runs once.
    b.transition(e, s, Target::Internal).guard(g).effect(
        |c: &mut Counters, _ev, _out| {
            c.fired.push("t0");
            Ok(())
        },
    );
    b.transition(e, s, Target::Internal).guard(g).effect(
        |c: &mut Counters, _ev, _out| {
            c.fired.push("t1");
            Ok(())
        },
    );
    let mut m = b.build(Counters::default()).unwrap();

    m.enter().unwrap();
    m.queue(e, None).unwrap();
    assert_eq!(m.context().guard_calls.get(), 1);
    assert_eq!(m.context().fired, ["t0", "t1"]);
}

#[test]
fn each_broadcast_gets_a_fresh_guard_cache() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let e = b.event("e");
    let g = b.condition(|c: &Counters, _ev| {
        c.guard_calls.set(c.guard_calls.get() + 1);
        Ok(true)
    });
    b.transition(e, s, Target::Internal).guard(g);
    b.transition(e, s, Target::Internal).guard(g);
    let mut m = b.build(Counters::default()).unwrap();

    m.enter().unwrap();
    m.queue(e, None).unwrap();
    m.queue(e, None).unwrap();
    // Once per broadcast, twice overall.
    assert_eq!(m.context().guard_calls.get(), 2);
}

// ============================================================================
// Test 2: Guards Block Transitions
// ============================================================================

#[test]
fn false_guard_blocks_the_transition() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let locked = b.leaf("locked", root);
    let open = b.leaf("open", root);
    let push = b.event("push");
    let unlocked = b.condition(|c: &Counters, _ev| Ok(c.guard_calls.get() > 0));
    b.transition(push, locked, Target::To(open)).guard(unlocked);
    let mut m = b.build(Counters::default()).unwrap();

    m.enter().unwrap();
    m.queue(push, None).unwrap();
    assert!(m.is_state_active(locked)); // still locked

    m.context_mut().guard_calls.set(1);
    m.queue(push, None).unwrap();
    assert!(m.is_state_active(open));
}

#[test]
fn guard_reads_event_parameters() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let idle = b.leaf("idle", root);
    let busy = b.leaf("busy", root);
    let load = b.event("load");
    let heavy = b.condition(|_c: &Counters, ev| {
        Ok(ev.params::<u32>().is_some_and(|weight| *weight > 10))
    });
    b.transition(load, idle, Target::To(busy)).guard(heavy);
    let mut m = b.build(Counters::default()).unwrap();

    m.enter().unwrap();
    m.queue(load, Some(Box::new(3u32))).unwrap();
    assert!(m.is_state_active(idle));

    m.queue(load, Some(Box::new(30u32))).unwrap();
    assert!(m.is_state_active(busy));
}

// ============================================================================
// Test 3: Conflict Resolution
// ============================================================================

#[test]
fn innermost_source_wins_a_conflict() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let p = b.cluster("p", root);
    let x = b.leaf("x", p);
    let q = b.leaf("q", root);
    let e = b.event("e");
    // Declared first, but p is shallower than x, so it loses.
    b.transition(e, p, Target::To(q)).effect(|c: &mut Counters, _ev, _out| {
        c.fired.push("outer");
        Ok(())
    });
    b.transition(e, x, Target::To(q)).effect(|c: &mut Counters, _ev, _out| {
        c.fired.push("inner");
        Ok(())
    });
    let mut m = b.build(Counters::default()).unwrap();

    m.enter().unwrap();
    m.queue(e, None).unwrap();
    assert_eq!(m.context().fired, ["inner"]);
    assert!(m.is_state_active(q));
}

#[test]
fn equal_depth_conflict_goes_to_the_earlier_declaration() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let p = b.cluster("p", root);
    let x = b.leaf("x", p);
    let y = b.leaf("y", p);
    let q = b.leaf("q", root);
    let e = b.event("e");
    b.transition(e, x, Target::To(q)).effect(|c: &mut Counters, _ev, _out| {
        c.fired.push("to-q");
        Ok(())
    });
    b.transition(e, x, Target::To(y)).effect(|c: &mut Counters, _ev, _out| {
        c.fired.push("to-y");
        Ok(())
    });
    let mut m = b.build(Counters::default()).unwrap();

    m.enter().unwrap();
    m.queue(e, None).unwrap();
    assert_eq!(m.context().fired, ["to-q"]);
    assert!(m.is_state_active(q));
    assert!(!m.is_state_active(y));
}

#[test]
fn blocked_inner_transition_unblocks_the_outer_one() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let p = b.cluster("p", root);
    let x = b.leaf("x", p);
    let q = b.leaf("q", root);
    let r = b.leaf("r", root);
    let e = b.event("e");
    let never = b.condition(|_c: &Counters, _ev| Ok(false));
    b.transition(e, x, Target::To(q)).guard(never);
    b.transition(e, p, Target::To(r));
    let mut m = b.build(Counters::default()).unwrap();

    m.enter().unwrap();
    m.queue(e, None).unwrap();
    // The guarded inner transition never arms, so the outer one fires.
    assert!(m.is_state_active(r));
    assert!(!m.is_state_active(q));
}

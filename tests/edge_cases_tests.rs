//! Edge cases and special scenarios tests

use chsm_rt::{BuildError, Error, History, MachineBuilder, Target};

#[derive(Default)]
struct Trace {
    log: Vec<String>,
}

// ============================================================================
// Test 1: Internal Transitions
// ============================================================================

#[test]
fn internal_transition_runs_the_action_without_exit_or_entry() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    b.on_enter(s, |t: &mut Trace, _ev, _out| {
        t.log.push("enter-s".into());
        Ok(())
    });
    b.on_exit(s, |t: &mut Trace, _ev, _out| {
        t.log.push("exit-s".into());
        Ok(())
    });
    let tick = b.event("tick");
    b.transition(tick, s, Target::Internal).effect(|t: &mut Trace, _ev, _out| {
        t.log.push("tick".into());
        Ok(())
    });
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    m.context_mut().log.clear();
    m.queue(tick, None).unwrap();
    m.queue(tick, None).unwrap();
    // Only the action runs; s is never exited or re-entered.
    assert_eq!(m.context().log, ["tick", "tick"]);
    assert!(m.is_state_active(s));
}

// ============================================================================
// Test 2: Dynamic Targets
// ============================================================================

#[test]
fn dynamic_target_picks_a_state_from_the_event_parameters() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let idle = b.leaf("idle", root);
    let low = b.leaf("low", root);
    let high = b.leaf("high", root);
    let go = b.event("go");
    b.transition(
        go,
        idle,
        Target::dynamic(move |_t: &Trace, ev| {
            Ok(if ev.params::<bool>() == Some(&true) { high } else { low })
        }),
    );
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    m.queue(go, Some(Box::new(true))).unwrap();
    assert!(m.is_state_active(high));
}

#[test]
fn dynamic_target_naming_an_ancestor_exits_and_reenters() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let p = b.cluster("p", root);
    let x = b.leaf("x", p);
    b.on_enter(p, |t: &mut Trace, _ev, _out| {
        t.log.push("+p".into());
        Ok(())
    });
    b.on_exit(p, |t: &mut Trace, _ev, _out| {
        t.log.push("-p".into());
        Ok(())
    });
    let reset = b.event("reset");
    b.transition(reset, x, Target::dynamic(move |_t: &Trace, _ev| Ok(p)));
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    m.context_mut().log.clear();
    m.queue(reset, None).unwrap();
    // The ancestor target is a fresh entry, not a no-op.
    assert_eq!(m.context().log, ["-p", "+p"]);
    assert!(m.is_state_active(x));
}

#[test]
fn out_of_range_dynamic_target_is_skipped() {
    // Mint a state id the real machine has never heard of.
    let mut other: MachineBuilder<Trace> = MachineBuilder::new("other");
    let other_root = other.root();
    let mut stray = other.leaf("stray", other_root);
    for n in 0..8 {
        stray = other.leaf(if n % 2 == 0 { "even" } else { "odd" }, other_root);
    }

    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let go = b.event("go");
    b.transition(go, s, Target::dynamic(move |_t: &Trace, _ev| Ok(stray)))
        .effect(|t: &mut Trace, _ev, _out| {
            t.log.push("fired".into());
            Ok(())
        });
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    m.queue(go, None).unwrap();
    // The transition is dropped whole: no action, no state change.
    assert!(m.context().log.is_empty());
    assert!(m.is_state_active(s));
}

// ============================================================================
// Test 3: Runtime Errors
// ============================================================================

#[test]
fn queue_before_enter_is_rejected() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    b.leaf("s", root);
    let e = b.event("e");
    let mut m = b.build(Trace::default()).unwrap();

    assert!(matches!(m.queue(e, None), Err(Error::NotActive)));
}

#[test]
fn unknown_event_id_is_rejected() {
    let mut other: MachineBuilder<Trace> = MachineBuilder::new("other");
    let other_root = other.root();
    other.leaf("s", other_root);
    other.event("a");
    other.event("b");
    let stray = other.event("c");

    let mut b = MachineBuilder::new("root");
    let root = b.root();
    b.leaf("s", root);
    b.event("only");
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    assert!(matches!(m.queue(stray, None), Err(Error::UnknownEvent(_))));
}

#[test]
fn failed_guard_aborts_the_broadcast_but_not_the_macrostep() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let kick = b.event("kick");
    let bad = b.event("bad");
    let good = b.event("good");
    let broken = b.condition(|_t: &Trace, _ev| Err("guard wiring broken".into()));
    b.transition(kick, s, Target::Internal).effect(move |_t: &mut Trace, _ev, out| {
        out.post(bad, None)?;
        out.post(good, None)?;
        Ok(())
    });
    b.transition(bad, s, Target::Internal).guard(broken);
    b.transition(good, s, Target::Internal).effect(|t: &mut Trace, _ev, _out| {
        t.log.push("good".into());
        Ok(())
    });
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    assert!(matches!(m.queue(kick, None), Err(Error::Callback(_))));
    // The queue survived the failed broadcast; run resumes the macrostep.
    m.run().unwrap();
    assert_eq!(m.context().log, ["good"]);
}

#[test]
fn failed_action_keeps_the_exits_already_performed() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let t = b.leaf("t", root);
    let go = b.event("go");
    b.transition(go, s, Target::To(t))
        .effect(|_t: &mut Trace, _ev, _out| Err("effect exploded".into()));
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    assert!(matches!(m.queue(go, None), Err(Error::Callback(_))));
    // Basic guarantee: s was exited before the action failed, t was never
    // entered, and the machine itself is still active.
    assert!(!m.is_state_active(s));
    assert!(!m.is_state_active(t));
    assert!(m.is_active());
}

// ============================================================================
// Test 4: Macrostep FIFO
// ============================================================================

#[test]
fn events_posted_by_actions_dispatch_after_the_current_broadcast() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s1 = b.leaf("s1", root);
    let s2 = b.leaf("s2", root);
    b.on_enter(s2, |t: &mut Trace, _ev, _out| {
        t.log.push("+s2".into());
        Ok(())
    });
    let go = b.event("go");
    let ping = b.event("ping");
    let pong = b.event("pong");
    b.transition(go, s1, Target::To(s2)).effect(move |t: &mut Trace, _ev, out| {
        t.log.push("effect".into());
        out.post(ping, None)?;
        out.post(pong, None)?;
        Ok(())
    });
    b.transition(ping, s2, Target::Internal).effect(|t: &mut Trace, _ev, _out| {
        t.log.push("ping".into());
        Ok(())
    });
    b.transition(pong, s2, Target::Internal).effect(|t: &mut Trace, _ev, _out| {
        t.log.push("pong".into());
        Ok(())
    });
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    m.queue(go, None).unwrap();
    // The go broadcast completes (action between exit and entry), then the
    // posted events run in FIFO order, all before queue() returns.
    assert_eq!(m.context().log, ["effect", "+s2", "ping", "pong"]);
}

#[test]
fn events_posted_by_enter_actions_wait_for_run() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let warmed = b.event("warmed");
    b.on_enter(s, move |_t: &mut Trace, _ev, out| {
        out.post(warmed, None)?;
        Ok(())
    });
    b.transition(warmed, s, Target::Internal).effect(|t: &mut Trace, _ev, _out| {
        t.log.push("warmed".into());
        Ok(())
    });
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    assert!(m.context().log.is_empty());
    m.run().unwrap();
    assert_eq!(m.context().log, ["warmed"]);
}

// ============================================================================
// Test 5: Event Inheritance
// ============================================================================

#[test]
fn derived_event_fires_base_transitions_too() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let alarm = b.event("alarm");
    let fire_alarm = b.derived_event("fire_alarm", alarm);
    b.transition(alarm, s, Target::Internal).effect(|t: &mut Trace, _ev, _out| {
        t.log.push("any-alarm".into());
        Ok(())
    });
    b.transition(fire_alarm, s, Target::Internal).effect(|t: &mut Trace, _ev, _out| {
        t.log.push("fire".into());
        Ok(())
    });
    let mut m = b.build(Trace::default()).unwrap();

    assert_eq!(m.event_precedence(alarm), Some(0));
    assert_eq!(m.event_precedence(fire_alarm), Some(1));

    m.enter().unwrap();
    m.queue(alarm, None).unwrap();
    assert_eq!(m.context().log, ["any-alarm"]);

    m.context_mut().log.clear();
    m.queue(fire_alarm, None).unwrap();
    // Both transitions fire, in declaration order.
    assert_eq!(m.context().log, ["any-alarm", "fire"]);
}

#[test]
fn actions_on_base_transitions_see_the_derived_event() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let alarm = b.event("alarm");
    let fire_alarm = b.derived_event("fire_alarm", alarm);
    b.transition(alarm, s, Target::Internal).effect(|t: &mut Trace, ev, _out| {
        t.log.push(format!("saw {}", ev.name()));
        Ok(())
    });
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    m.queue(fire_alarm, None).unwrap();
    assert_eq!(m.context().log, ["saw fire_alarm"]);
}

// ============================================================================
// Test 6: Parameter Payloads
// ============================================================================

#[test]
fn actions_downcast_the_parameter_block() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    let report = b.event("report");
    b.transition(report, s, Target::Internal).effect(|t: &mut Trace, ev, _out| {
        let (code, ref label) = *ev.params::<(u32, String)>().ok_or("missing params")?;
        t.log.push(format!("{code}:{label}"));
        Ok(())
    });
    let mut m = b.build(Trace::default()).unwrap();

    m.enter().unwrap();
    m.queue(report, Some(Box::new((7u32, String::from("ready")))))
        .unwrap();
    assert_eq!(m.context().log, ["7:ready"]);
}

// ============================================================================
// Test 7: Build Validation
// ============================================================================

#[test]
fn build_rejects_childless_parents() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let p = b.cluster("p", root);
    assert_eq!(
        b.build(Trace::default()).err(),
        Some(BuildError::ChildlessParent(p))
    );
}

#[test]
fn build_rejects_children_of_leaves() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let leafy = b.leaf("leafy", root);
    let child = b.leaf("child", leafy);
    assert_eq!(
        b.build(Trace::default()).err(),
        Some(BuildError::LeafParent {
            parent: leafy,
            child
        })
    );
}

#[test]
fn build_rejects_history_on_non_clusters() {
    let mut b = MachineBuilder::new("root");
    let root = b.root();
    let s = b.leaf("s", root);
    b.history(s, History::Shallow);
    assert_eq!(
        b.build(Trace::default()).err(),
        Some(BuildError::HistoryOnNonCluster(s))
    );
}

#[test]
fn build_rejects_ids_from_another_builder() {
    let mut other = MachineBuilder::<Trace>::new("other");
    let other_root = other.root();
    other.leaf("a", other_root);
    let stray = other.leaf("b", other_root);

    let mut b = MachineBuilder::new("root");
    let root = b.root();
    b.leaf("s", root);
    b.on_enter(stray, |_t: &mut Trace, _ev, _out| Ok(()));
    assert!(matches!(
        b.build(Trace::default()).err(),
        Some(BuildError::ForeignId(_))
    ));
}

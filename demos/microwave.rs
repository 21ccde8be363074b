//! Microwave Oven Demo
//!
//! The classic hierarchical state machine: an `operational` cluster nested
//! inside the oven, with shallow history so that opening the door pauses
//! cooking and closing it resumes exactly where the oven left off.
//!
//! Run with: `cargo run --example microwave`

use chsm_rt::{History, MachineBuilder, StateId, Target};

// ============================================================================
// 1. Context (Shared State)
// ============================================================================

/// What the oven remembers across states.
#[derive(Debug, Default)]
pub struct Oven {
    /// Seconds left on the timer.
    pub seconds: u32,
}

// ============================================================================
// 2. Machine Layout
// ============================================================================

struct Microwave {
    machine: chsm_rt::Machine<Oven>,
    idle: StateId,
    cooking: StateId,
    door_open: StateId,
    start: chsm_rt::EventId,
    done: chsm_rt::EventId,
    open: chsm_rt::EventId,
    close: chsm_rt::EventId,
}

fn assemble() -> Microwave {
    let mut b = MachineBuilder::new("microwave");
    let root = b.root();

    // operational: what the oven does while the door is closed.
    let operational = b.cluster("operational", root);
    b.history(operational, History::Shallow);
    let idle = b.leaf("idle", operational);
    let cooking = b.leaf("cooking", operational);
    let door_open = b.leaf("door_open", root);

    b.on_enter(idle, |_oven: &mut Oven, _ev, _out| {
        println!("  [oven] idle, ready to cook");
        Ok(())
    });
    b.on_enter(cooking, |oven: &mut Oven, _ev, _out| {
        println!("  [oven] magnetron on, {}s remaining", oven.seconds);
        Ok(())
    });
    b.on_exit(cooking, |_oven: &mut Oven, _ev, _out| {
        println!("  [oven] magnetron off");
        Ok(())
    });
    b.on_enter(door_open, |_oven: &mut Oven, _ev, _out| {
        println!("  [oven] light on, door open");
        Ok(())
    });

    let start = b.event("start");
    let done = b.event("done");
    let open = b.event("open");
    let close = b.event("close");

    b.transition(start, idle, Target::To(cooking)).effect(
        |oven: &mut Oven, ev, _out| {
            oven.seconds = *ev.params::<u32>().ok_or("start needs a duration")?;
            Ok(())
        },
    );
    b.transition(done, cooking, Target::To(idle));
    // Opening the door leaves `operational` wherever it was...
    b.transition(open, operational, Target::To(door_open));
    // ...and closing it re-enters through shallow history.
    b.transition(close, door_open, Target::To(operational));

    let machine = b.build(Oven::default()).expect("static layout is valid");
    Microwave {
        machine,
        idle,
        cooking,
        door_open,
        start,
        done,
        open,
        close,
    }
}

// ============================================================================
// 3. Drive It
// ============================================================================

fn main() {
    let mut mw = assemble();
    mw.machine.enter().unwrap();
    assert!(mw.machine.is_state_active(mw.idle));

    println!("> start 90");
    mw.machine.queue(mw.start, Some(Box::new(90u32))).unwrap();
    assert!(mw.machine.is_state_active(mw.cooking));

    println!("> door opens mid-cook");
    mw.machine.queue(mw.open, None).unwrap();
    assert!(mw.machine.is_state_active(mw.door_open));

    println!("> door closes");
    mw.machine.queue(mw.close, None).unwrap();
    // History put the oven straight back into cooking, not idle.
    assert!(mw.machine.is_state_active(mw.cooking));

    println!("> timer done");
    mw.machine.queue(mw.done, None).unwrap();
    assert!(mw.machine.is_state_active(mw.idle));

    mw.machine.exit().unwrap();
    println!("done.");
}

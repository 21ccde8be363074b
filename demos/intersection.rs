//! Traffic Intersection Demo
//!
//! Two signal heads run concurrently inside one set: the north-south and
//! east-west lights are separate clusters, both active at once, stepped by
//! the same timer event in declaration order.
//!
//! Run with: `cargo run --example intersection`

use chsm_rt::{MachineBuilder, StateId, Target};

#[derive(Debug, Default)]
pub struct Intersection {
    pub changes: u32,
}

/// One signal head: go -> caution -> stop -> go. The first leaf declared is
/// the one the head shows when the intersection powers up.
struct Head {
    go: StateId,
    caution: StateId,
    stop: StateId,
}

fn head(b: &mut MachineBuilder<Intersection>, parent: StateId, name: &str, start_red: bool) -> Head {
    let cluster = b.cluster(name, parent);
    let (go, caution, stop);
    if start_red {
        stop = b.leaf("stop", cluster);
        go = b.leaf("go", cluster);
        caution = b.leaf("caution", cluster);
    } else {
        go = b.leaf("go", cluster);
        caution = b.leaf("caution", cluster);
        stop = b.leaf("stop", cluster);
    }
    for state in [go, caution, stop] {
        b.on_enter(state, move |i: &mut Intersection, _ev, _out| {
            i.changes += 1;
            Ok(())
        });
    }
    Head { go, caution, stop }
}

fn wire(b: &mut MachineBuilder<Intersection>, tick: chsm_rt::EventId, h: &Head) {
    b.transition(tick, h.go, Target::To(h.caution));
    b.transition(tick, h.caution, Target::To(h.stop));
    b.transition(tick, h.stop, Target::To(h.go));
}

fn show(m: &chsm_rt::Machine<Intersection>, label: &str, h: &Head) {
    for state in [h.go, h.caution, h.stop] {
        if m.is_state_active(state) {
            println!("  {label}: {}", m.state_name(state).unwrap_or("?"));
        }
    }
}

fn main() {
    let mut b = MachineBuilder::new("intersection");
    let root = b.root();
    let heads = b.set("heads", root);
    let ns = head(&mut b, heads, "north_south", false);
    let ew = head(&mut b, heads, "east_west", true);

    let tick = b.event("tick");
    wire(&mut b, tick, &ns);
    wire(&mut b, tick, &ew);

    let mut m = b.build(Intersection::default()).expect("static layout is valid");
    m.enter().unwrap();
    println!("power on:");
    show(&m, "NS", &ns);
    show(&m, "EW", &ew);

    // One event steps both heads, north-south first (declaration order).
    for round in 1..=6 {
        m.queue(tick, None).unwrap();
        println!("tick {round}:");
        show(&m, "NS", &ns);
        show(&m, "EW", &ew);
    }

    m.exit().unwrap();
    println!("{} lamp changes, intersection shut down.", m.context().changes);
}

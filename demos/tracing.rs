//! # Tracing Demo: Watching a Dispatch Unfold
//!
//! With the `logging` feature the runtime emits an indented, line-oriented
//! trace of everything the dispatcher does: broadcast begin/end, the
//! transitions it selects, exits, actions, entries, and history
//! restorations. Indentation deepens with nesting.
//!
//! Run this demo with:
//! ```bash
//! RUST_LOG=debug cargo run --example tracing --features logging
//! ```
//!
//! Without the feature flag, no tracing code is compiled at all.

use chsm_rt::{History, MachineBuilder, Target};

fn init_logger() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .format_timestamp(None)
        .init();
}

fn main() {
    init_logger();

    let mut b = MachineBuilder::new("player");
    let root = b.root();
    let stopped = b.leaf("stopped", root);
    let playing = b.cluster("playing", root);
    b.history(playing, History::Shallow);
    let normal = b.leaf("normal", playing);
    let fast = b.leaf("fast", playing);

    let play = b.event("play");
    let speed = b.event("speed");
    let stop = b.event("stop");
    b.transition(play, stopped, Target::To(playing));
    b.transition(speed, normal, Target::To(fast));
    b.transition(speed, fast, Target::To(normal));
    b.transition(stop, playing, Target::To(stopped));

    let mut m = b.build(()).expect("static layout is valid");
    m.enter().unwrap();
    m.queue(play, None).unwrap();
    m.queue(speed, None).unwrap(); // normal -> fast
    m.queue(stop, None).unwrap();
    m.queue(play, None).unwrap(); // history resumes at fast
    assert!(m.is_state_active(fast));
    m.exit().unwrap();
}

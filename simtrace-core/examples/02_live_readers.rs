//! Live Writer with Independent Readers Example
//!
//! This example runs the intended deployment shape: one simulation thread
//! recording every tick, and two consumers polling the same store at
//! their own cadence - a "visualization" reader following the live head
//! and an "export" reader scrubbing fixed history.
//!
//! ## What You'll Learn
//!
//! - Sharing one store between a writer and several reader registries
//! - Per-reader change detection with `pull_all`
//! - Reading a consistent cross-variable snapshot without locks
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 02_live_readers
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use simtrace_core::{
    LinkedRegistry, RecordingLinkFactory, SampleStore, ScalarVariable, Variable, VariableGroup,
    VariableTree,
};

const TICKS: usize = 240;

fn bind_mirrors(store: &Arc<SampleStore>) -> (LinkedRegistry, Arc<ScalarVariable>, Arc<ScalarVariable>) {
    let mirrors = Arc::new(VariableGroup::new());
    let x = Arc::new(ScalarVariable::mirror("rover.x", 0.0));
    let heading = Arc::new(ScalarVariable::mirror("rover.heading", 0.0));
    mirrors.attach(x.clone() as Arc<dyn Variable>);
    mirrors.attach(heading.clone() as Arc<dyn Variable>);
    let registry = LinkedRegistry::bind(
        Arc::clone(store),
        mirrors as Arc<dyn VariableTree>,
        Arc::new(RecordingLinkFactory),
    )
    .expect("bind reader registry");
    (registry, x, heading)
}

fn main() -> Result<(), simtrace_core::RecordError> {
    println!("Simtrace Live Readers Example");
    println!("=============================\n");

    let store = Arc::new(SampleStore::new(TICKS)?);

    let model = Arc::new(VariableGroup::new());
    let x = Arc::new(ScalarVariable::new("rover.x", 0.0));
    let heading = Arc::new(ScalarVariable::new("rover.heading", 0.0));
    model.attach(x.clone() as Arc<dyn Variable>);
    model.attach(heading.clone() as Arc<dyn Variable>);

    let mut recorder = LinkedRegistry::bind(
        Arc::clone(&store),
        Arc::clone(&model) as Arc<dyn VariableTree>,
        Arc::new(RecordingLinkFactory),
    )?;

    // Writer: steps a toy rover and records every tick.
    let writer = thread::spawn(move || {
        for tick in 0..TICKS {
            let t = tick as f64 * 0.02;
            heading.set_value(0.3 * t);
            x.set_value(t * (0.3 * t).cos());
            recorder.push_all().expect("push tick");
            thread::sleep(Duration::from_micros(200));
        }
    });

    // Reader 1: visualization following the live head.
    let live_store = Arc::clone(&store);
    let live_reader = thread::spawn(move || {
        let (mut registry, x, heading) = bind_mirrors(&live_store);
        let mut refreshes = 0;
        for _ in 0..40 {
            let props = live_store.properties();
            if !props.is_empty() && registry.pull_all(props.current_index).expect("pull") {
                refreshes += 1;
                if refreshes % 10 == 0 {
                    println!(
                        "  [viz]    tick {:3}: x={:+.3} heading={:+.3}",
                        props.tick,
                        x.value(),
                        heading.value(),
                    );
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
        refreshes
    });

    // Reader 2: export consumer scrubbing a fixed early segment.
    let scrub_store = Arc::clone(&store);
    let scrub_reader = thread::spawn(move || {
        let (mut registry, x, _) = bind_mirrors(&scrub_store);
        // Wait until some history exists, then walk ticks 0..10.
        while scrub_store.properties().active_length() < 10 {
            thread::sleep(Duration::from_millis(1));
        }
        for cursor in 0..10 {
            registry.pull_all(cursor).expect("pull history");
            println!("  [export] cursor {cursor}: x={:+.4}", x.value());
        }
    });

    writer.join().expect("writer thread");
    let refreshes = live_reader.join().expect("viz thread");
    scrub_reader.join().expect("export thread");

    let props = store.properties();
    println!("\nRecorded {} ticks, viz refreshed {} times", props.tick + 1, refreshes);
    println!("Final window: [{}, {}]", props.in_point, props.out_point);
    Ok(())
}

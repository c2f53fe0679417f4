//! Basic Recording and Export Example
//!
//! This example demonstrates the simplest use case of simtrace:
//! recording a small simulation's variables tick by tick, cropping an
//! interesting segment, and exporting it in order.
//!
//! ## What You'll Learn
//!
//! - Creating a sample store and binding a writer registry
//! - Recording one sample per variable per tick
//! - Cropping the active window for looping/export
//! - Walking the (possibly wrapped) window in chronological order
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_record_export
//! ```

use std::sync::Arc;

use simtrace_core::{
    LinkedRegistry, RecordingLinkFactory, SampleStore, SampleValue, ScalarVariable, Variable,
    VariableGroup, VariableTree,
};

fn main() -> Result<(), simtrace_core::RecordError> {
    println!("Simtrace Basic Recording Example");
    println!("================================\n");

    // A small store: keeps the last 16 ticks of every variable.
    let store = Arc::new(SampleStore::new(16)?);

    // The "simulation model": one pendulum with two state variables.
    let model = Arc::new(VariableGroup::new());
    let angle = Arc::new(ScalarVariable::new("pendulum.angle", 0.0));
    let velocity = Arc::new(ScalarVariable::new("pendulum.velocity", 0.0));
    model.attach(angle.clone() as Arc<dyn Variable>);
    model.attach(velocity.clone() as Arc<dyn Variable>);

    let mut recorder = LinkedRegistry::bind(
        Arc::clone(&store),
        Arc::clone(&model) as Arc<dyn VariableTree>,
        Arc::new(RecordingLinkFactory),
    )?;
    println!("Linked {} variables\n", recorder.len());

    // Step a toy pendulum for 20 ticks. With capacity 16 the window
    // wraps and slides: the oldest four ticks fall out.
    println!("Recording 20 ticks:");
    let dt = 0.05;
    let mut a: f64 = 0.5;
    let mut v: f64 = 0.0;
    for tick in 0..20 {
        v -= 9.81 * a.sin() * dt;
        a += v * dt;
        angle.set_value(a);
        velocity.set_value(v);

        // One push per tick, after all state updates.
        recorder.push_all()?;
        if tick % 5 == 4 {
            let props = store.properties();
            println!(
                "  tick {:2}: window [{}, {}], {} samples active",
                props.tick,
                props.in_point,
                props.out_point,
                props.active_length(),
            );
        }
    }

    // Crop the middle of the recording for export.
    let props = store.properties();
    let mid = (props.in_point + 4) % props.size;
    store.set_in_point(mid)?;
    let cropped = store.set_out_point((mid + 7) % props.size)?;
    println!(
        "\nCropped to [{}, {}] ({} samples)",
        cropped.in_point,
        cropped.out_point,
        cropped.active_length(),
    );

    // Export the cropped window, oldest sample first.
    println!("\nExported pendulum.angle:");
    let exported = recorder.links()[0].export_window(&store, &cropped)?;
    for (offset, sample) in exported.iter().enumerate() {
        if let SampleValue::Scalar(value) = sample {
            println!("  +{offset:2}: {value:+.4} rad");
        }
    }

    // Back to live recording.
    let resumed = store.resume_sliding();
    println!(
        "\nResumed sliding: window [{}, {}] tracks the write head again",
        resumed.in_point, resumed.out_point,
    );
    Ok(())
}

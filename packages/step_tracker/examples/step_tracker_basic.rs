//! Tracks the steps of a small data pipeline and writes the report in two formats.
//!
//! Run with: `cargo run --example step_tracker_basic`
//!
//! Set `RUST_LOG=debug` to see each step being started and ended.

use std::hint::black_box;
use std::thread;
use std::time::Duration;

use step_tracker::{FileWriter, JsonRenderer, Session, TextRenderer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let session = Session::builder()
        .metadata("script", "step_tracker_basic")
        .metadata("author", "example")
        .metadata("inputs", vec!["orders.csv", "customers.csv"])
        .build();

    let records = session.bracket("load", || {
        thread::sleep(Duration::from_millis(100));
        (0..100_000_u64).collect::<Vec<_>>()
    })?;

    let total = session.bracket("transform", || {
        let _validate = session.step("validate");
        thread::sleep(Duration::from_millis(20));

        records.iter().map(|value| value * 2).sum::<u64>()
    })?;

    {
        let _step = session.step("store")?;
        thread::sleep(Duration::from_millis(30));
        black_box(total);
    }

    let report = session.to_report()?;
    println!("{report}");

    let output_dir = std::env::temp_dir().join("step_tracker_basic");
    let text_path = output_dir.join("report.txt");
    let json_path = output_dir.join("report.json");

    report.render_to(&TextRenderer, &FileWriter, &text_path)?;
    report.render_to(&JsonRenderer::pretty(), &FileWriter, &json_path)?;

    println!("Report written to {} and {}", text_path.display(), json_path.display());

    Ok(())
}

//! Run a single workflow
//!
//! This example demonstrates the core functionality of runninghub-client:
//! - Resolving configuration from explicit values and `config.json`
//! - Building parameter overrides from fixed slots
//! - Subscribing to lifecycle events
//! - Submitting, monitoring and saving the outputs in one call
//!
//! ```bash
//! RUNNINGHUB_API_KEY=... RUNNINGHUB_WORKFLOW_ID=... cargo run --example run_workflow
//! ```

use runninghub_client::{
    Config, ConfigOverrides, Event, FieldSlot, FieldSlots, RunningHubClient,
};
use std::path::Path;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    // Explicit values win; blanks fall back to config.json next to the binary
    let config = Config::resolve(
        ConfigOverrides {
            api_key: std::env::var("RUNNINGHUB_API_KEY").ok(),
            workflow_or_app_id: std::env::var("RUNNINGHUB_WORKFLOW_ID").ok(),
            ..Default::default()
        },
        Some(Path::new("config.json")),
    )?;

    // Up to four overrides; incomplete slots are skipped
    let mut slots = FieldSlots::new();
    slots.set(1, FieldSlot::new("6", "text", "a lighthouse at dusk, oil painting"))?;
    slots.set(2, FieldSlot::custom("3", "seed", "42"))?;
    let params = slots.into_param_set(None);

    let client = RunningHubClient::new(config)?;

    // Subscribe to events
    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::TaskSubmitted { task_id } => {
                    println!("✓ Submitted task {}", task_id);
                }
                Event::TaskStatusChanged {
                    task_id,
                    state,
                    elapsed,
                } => {
                    println!("→ Task {} is {} ({}s)", task_id, state, elapsed.as_secs());
                }
                Event::TaskHeartbeat { task_id, elapsed, .. } => {
                    println!("… Task {} still working ({}s)", task_id, elapsed.as_secs());
                }
                Event::ArtifactPersisted { path, .. } => {
                    println!("💾 Saved {}", path.display());
                }
                Event::ArtifactSkipped { url, reason, .. } => {
                    println!("⚠ Skipped {}: {}", url, reason);
                }
                Event::TaskFailed {
                    task_id,
                    state,
                    error,
                } => {
                    println!("✗ Task {} ended {}: {}", task_id, state, error);
                }
                _ => {}
            }
        }
    });

    let output = client
        .execute(params, Duration::from_secs(600), false, true, "RH")
        .await?;

    println!("Task {} finished", output.task_id);
    println!("  images: {}", output.result.images.len());
    println!("  video frames: {}", output.result.video_frames.len());
    if !output.result.text.is_empty() {
        println!("  text: {}", output.result.text);
    }
    if let Some(video) = &output.result.video {
        println!("  video: {}", video.url);
    }

    Ok(())
}

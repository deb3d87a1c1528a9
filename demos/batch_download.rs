//! Fan out a batch of prompts and collect the results
//!
//! Submits one task per parameter set, then monitors and downloads all of
//! them concurrently. Tasks that fail or time out show up as `ERROR:` lines
//! in the merged text and as labelled placeholder images.
//!
//! ```bash
//! RUNNINGHUB_API_KEY=... RUNNINGHUB_WORKFLOW_ID=... cargo run --example batch_download
//! ```

use runninghub_client::{
    BundleSlots, Config, Event, ParamAssignment, RunningHubClient, TaskAction, TaskId,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("RUNNINGHUB_API_KEY")?;
    let workflow_id = std::env::var("RUNNINGHUB_WORKFLOW_ID")?;

    let mut config = Config::new(api_key, workflow_id.clone());
    config.output.max_concurrency = 4;
    config.output.directory = Some("output/batch".into());

    let client = RunningHubClient::new(config)?;

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Event::BatchElementFailed { index, error } = event {
                println!("✗ Batch element {} failed: {}", index + 1, error);
            }
        }
    });

    // Bundle slots are 1-based; gaps are dropped
    let mut bundle = BundleSlots::new();
    for (slot, prompt) in [(1, "a red fox"), (2, "a grey wolf"), (4, "a snow owl")] {
        bundle.set(slot, vec![ParamAssignment::new("6", "text", prompt)])?;
    }

    let task_ids = client.run_batch(&workflow_id, bundle.into_bundle()).await?;
    let joined = TaskId::join(&task_ids);
    println!("Submitted: {}", joined);

    // The joined form can be stored and parsed back later
    let task_ids = TaskId::parse_list(&joined);
    let result = client
        .download_batch(&task_ids, Duration::from_secs(900), true, "RH_DL")
        .await?;

    for (i, line) in result.text.split('\n').enumerate() {
        println!("[{}] {}", i + 1, line);
    }
    for image in result.images.iter().filter(|i| i.is_placeholder()) {
        println!("placeholder: {}", image.label.as_deref().unwrap_or_default());
    }

    if let Some(first) = task_ids.first() {
        println!("{}", client.manage_task(first, TaskAction::GetStatus).await?);
    }

    Ok(())
}

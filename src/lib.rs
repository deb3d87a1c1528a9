//! # runninghub-client
//!
//! Task lifecycle engine for the RunningHub asynchronous workflow API.
//!
//! ## Design Philosophy
//!
//! runninghub-client is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Type-stable** - Every result has the same shape; missing outputs are placeholders
//! - **Fault-isolating** - One bad artifact or batch element never takes down its siblings
//! - **Event-driven** - Consumers can subscribe to lifecycle events
//!
//! ## Quick Start
//!
//! ```no_run
//! use runninghub_client::{Config, ParamAssignment, RunningHubClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RunningHubClient::new(Config::new("api-key", "1900000000000000001"))?;
//!
//!     // Subscribe to events
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let params = vec![ParamAssignment::new("6", "text", "a lighthouse at dusk")];
//!     let output = client
//!         .execute(params, Duration::from_secs(600), false, true, "RH")
//!         .await?;
//!     println!("task {} produced {} images", output.task_id, output.result.images.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// RunningHub client (decomposed into focused submodules)
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Decoded artifact values, codecs and media tooling
pub mod media;
/// Fixed-slot parameter collections
pub mod params;
/// Retry logic with exponential backoff
pub mod retry;
/// API transport
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::{
    Completion, ExecuteOutput, FetchOutcome, MaskUpload, OutputWriter, RunningHubClient, TaskAction,
};
pub use config::{Config, ConfigOverrides};
pub use error::{BusinessError, DecodeError, Error, FaultClass, Result, TransportError};
pub use media::{
    AggregatedResult, Audio, Image, Latent, Mask, MediaCapabilities, Tensor, VideoRef,
};
pub use params::{BundleSlots, FieldSlot, FieldSlots, ParamSlots};
pub use transport::{FileKind, HttpTransport, SubmitRequest, Transport, UploadRequest};
pub use types::{
    Artifact, ArtifactKind, Event, ParamAssignment, ParamBundle, ParamSet, StatusResult, Task,
    TaskId, TaskState,
};

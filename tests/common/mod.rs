//! Common test utilities for runninghub-client integration tests

#![allow(dead_code)]

use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

use runninghub_client::Config;
use runninghub_client::media::Image;
use runninghub_client::media::encode::encode_png;

/// Workflow id used against the mock server
pub const WORKFLOW_ID: &str = "1900000000000000001";

/// API key used against the mock server
pub const API_KEY: &str = "test-api-key";

/// Configuration pointing at `server` with short waits
///
/// Returns the config and the temp directory holding its output dir (keep it
/// alive for the test duration).
pub fn mock_config(server: &MockServer) -> (Config, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(API_KEY, WORKFLOW_ID);
    config.base_url = format!("{}/", server.uri());
    config.retry.max_attempts = 2;
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(20);
    config.polling.poll_interval = Duration::from_millis(50);
    config.polling.output_fetch_attempts = 2;
    config.polling.output_fetch_interval = Duration::from_millis(10);
    config.output.directory = Some(temp_dir.path().join("output"));
    config.output.search_path = false;
    (config, temp_dir)
}

/// A `{code, msg, data}` body
pub fn envelope(code: i64, msg: &str, data: Value) -> Value {
    json!({ "code": code, "msg": msg, "data": data })
}

/// Manifest entry as the outputs endpoint returns it
pub fn output_entry(url: &str, file_type: &str) -> Value {
    json!({ "fileUrl": url, "fileType": file_type, "taskCostTime": "12" })
}

/// Solid-colour PNG bytes
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![200u8; (width * height * 3) as usize];
    encode_png(&Image::from_rgb8(width, height, &pixels)).unwrap()
}

/// Load live credentials from `.env`
///
/// Required:
/// - `RUNNINGHUB_API_KEY`
/// - `RUNNINGHUB_WORKFLOW_ID`
///
/// Optional:
/// - `RUNNINGHUB_BASE_URL` (default: the public endpoint)
pub fn load_live_config() -> Option<Config> {
    dotenvy::dotenv().ok();
    let api_key = std::env::var("RUNNINGHUB_API_KEY").ok()?;
    let workflow_id = std::env::var("RUNNINGHUB_WORKFLOW_ID").ok()?;
    let mut config = Config::new(api_key, workflow_id);
    if let Ok(base_url) = std::env::var("RUNNINGHUB_BASE_URL") {
        config.base_url = base_url;
    }
    config.output.directory = Some(std::env::temp_dir().join("runninghub-live-tests"));
    Some(config)
}

/// Return early from a test when live credentials are missing
#[macro_export]
macro_rules! skip_if_no_credentials {
    () => {
        match common::load_live_config() {
            Some(config) => config,
            None => {
                eprintln!("Skipping: RUNNINGHUB_API_KEY / RUNNINGHUB_WORKFLOW_ID not set in .env");
                return;
            }
        }
    };
}

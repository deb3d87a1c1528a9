//! Shared test helpers: a scripted transport, a fake media tool and client builders.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

use super::RunningHubClient;
use crate::config::Config;
use crate::error::{BusinessError, Error, Result, TransportError};
use crate::media::encode::{encode_latent, encode_png, encode_wav};
use crate::media::{Audio, Image, Latent, MediaCapabilities, MediaTool, NoOpMediaTool, Tensor};
use crate::transport::{SubmitRequest, Transport, UploadRequest};
use crate::types::{Artifact, ArtifactKind, Event, StatusResult, TaskId};

/// One scripted answer to a status poll
#[derive(Clone, Debug)]
pub(crate) enum PollStep {
    /// Return this classification
    Status(StatusResult),
    /// Fail the request at the transport level
    Fault,
}

/// One scripted answer to a submission
#[derive(Clone, Debug)]
pub(crate) enum SubmitStep {
    /// Accept and return this task id
    Accept(String),
    /// Reject with a business envelope
    Reject { code: i64, msg: String },
    /// Fail the request at the transport level
    Fault,
}

/// In-memory [`Transport`] with scripted answers and call counters
///
/// Poll scripts are per task; the last step of a script repeats forever and
/// an unscripted task reads as `Running`. Unscripted submissions are accepted
/// with ids `task-1`, `task-2`, ...
#[derive(Default)]
pub(crate) struct StubTransport {
    submit_script: Mutex<VecDeque<SubmitStep>>,
    reject_value: Mutex<Option<String>>,
    poll_scripts: Mutex<HashMap<String, VecDeque<PollStep>>>,
    downloads: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<(String, &'static str, usize)>>,
    submitted: Mutex<Vec<SubmitRequest>>,
    poll_counts: Mutex<HashMap<String, usize>>,
    cancel_accepted: AtomicBool,
    next_id: AtomicUsize,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    pub(crate) submit_calls: AtomicUsize,
    pub(crate) download_calls: AtomicUsize,
    pub(crate) upload_calls: AtomicUsize,
    pub(crate) cancel_calls: AtomicUsize,
}

impl StubTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn script_submit(&self, steps: impl IntoIterator<Item = SubmitStep>) {
        self.submit_script.lock().unwrap().extend(steps);
    }

    /// Reject (non-retryably) any submission carrying a parameter with this value
    pub(crate) fn reject_params_with(&self, value: &str) {
        *self.reject_value.lock().unwrap() = Some(value.to_string());
    }

    pub(crate) fn script_polls(&self, task_id: &str, steps: impl IntoIterator<Item = PollStep>) {
        self.poll_scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), steps.into_iter().collect());
    }

    /// Every poll of `task_id` returns `status`
    pub(crate) fn always(&self, task_id: &str, status: StatusResult) {
        self.script_polls(task_id, [PollStep::Status(status)]);
    }

    pub(crate) fn serve(&self, url: &str, body: Vec<u8>) {
        self.downloads.lock().unwrap().insert(url.to_string(), body);
    }

    pub(crate) fn accept_cancel(&self, accepted: bool) {
        self.cancel_accepted.store(accepted, Ordering::SeqCst);
    }

    pub(crate) fn poll_count(&self, task_id: &str) -> usize {
        self.poll_counts
            .lock()
            .unwrap()
            .get(task_id)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub(crate) fn uploads(&self) -> Vec<(String, &'static str, usize)> {
        self.uploads.lock().unwrap().clone()
    }

    /// Hold every submit, poll and download open for `latency`
    pub(crate) fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Most submit, poll and download calls seen open at the same time
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn in_flight<T>(&self, answer: T) -> T {
        let latency = *self.latency.lock().unwrap();
        let Some(latency) = latency else {
            return answer;
        };
        let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(open, Ordering::SeqCst);
        tokio::time::sleep(latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }

    fn fault(url: &str) -> Error {
        Error::Transport(TransportError::Status {
            url: url.to_string(),
            status: 503,
        })
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn submit(&self, _config: &Config, request: &SubmitRequest) -> Result<TaskId> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(request.clone());

        let reject = self.reject_value.lock().unwrap().clone();
        if let Some(value) = reject
            && request.params.iter().any(|p| p.field_value == value)
        {
            return Err(Error::Business(BusinessError::from_envelope(
                1,
                "INVALID_WORKFLOW_ID",
                &request.workflow_or_app_id,
            )));
        }

        let step = self.submit_script.lock().unwrap().pop_front();
        let answer = match step {
            Some(SubmitStep::Accept(id)) => Ok(TaskId::new(id)),
            Some(SubmitStep::Reject { code, msg }) => Err(Error::Business(
                BusinessError::from_envelope(code, &msg, &request.workflow_or_app_id),
            )),
            Some(SubmitStep::Fault) => Err(Self::fault("/task/openapi/create")),
            None => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(TaskId::new(format!("task-{}", n)))
            }
        };
        self.in_flight(answer).await
    }

    async fn poll_once(&self, _config: &Config, task_id: &TaskId) -> Result<StatusResult> {
        *self
            .poll_counts
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_insert(0) += 1;

        let step = {
            let mut scripts = self.poll_scripts.lock().unwrap();
            match scripts.get_mut(task_id.as_str()) {
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
                None => None,
            }
        };
        let answer = match step {
            Some(PollStep::Status(status)) => Ok(status),
            Some(PollStep::Fault) => Err(Self::fault("/task/openapi/outputs")),
            None => Ok(StatusResult::Running),
        };
        self.in_flight(answer).await
    }

    async fn cancel(&self, _config: &Config, _task_id: &TaskId) -> Result<bool> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cancel_accepted.load(Ordering::SeqCst))
    }

    async fn upload_file(&self, _config: &Config, request: &UploadRequest) -> Result<String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploads.lock().unwrap().push((
            request.file_name.clone(),
            request.kind.as_str(),
            request.bytes.len(),
        ));
        Ok(format!("api/{}", request.file_name))
    }

    async fn download(&self, _config: &Config, url: &str, _kind: ArtifactKind) -> Result<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.downloads.lock().unwrap().get(url).cloned().ok_or_else(|| {
            Error::Transport(TransportError::Status {
                url: url.to_string(),
                status: 404,
            })
        });
        self.in_flight(answer).await
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// [`MediaTool`] that fabricates frames and converts any audio to a short WAV
pub(crate) struct FakeMediaTool {
    pub(crate) frames_per_video: usize,
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn extract_frames(&self, _video: &[u8], _extension: &str) -> Result<Vec<Image>> {
        Ok((0..self.frames_per_video)
            .map(|i| Image::from_rgb8(2, 2, &[i as u8; 12]))
            .collect())
    }

    async fn transcode_to_wav(&self, _audio: &[u8], _extension: &str) -> Result<Vec<u8>> {
        Ok(wav_bytes(8_000, &[0.25, -0.25, 0.5]))
    }

    fn capabilities(&self) -> MediaCapabilities {
        MediaCapabilities {
            can_extract_frames: true,
            can_transcode_audio: true,
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Configuration with short waits, writing into `output_dir`
pub(crate) fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::new("test-key", "1900000000000000001");
    config.base_url = "http://127.0.0.1:9".into();
    config.retry.max_attempts = 3;
    config.retry.initial_delay = Duration::from_secs(1);
    config.retry.max_delay = Duration::from_secs(4);
    config.polling.poll_interval = Duration::from_secs(5);
    config.polling.heartbeat_interval = Duration::from_secs(15);
    config.polling.output_fetch_attempts = 3;
    config.polling.output_fetch_interval = Duration::from_secs(2);
    config.output.directory = Some(output_dir.to_path_buf());
    config.output.search_path = false;
    config.output.max_concurrency = 4;
    config
}

/// Client over `transport` without media tooling.
/// Returns the client and the tempdir (which must be kept alive).
pub(crate) fn create_test_client(transport: Arc<StubTransport>) -> (RunningHubClient, TempDir) {
    create_test_client_with_media(transport, Arc::new(NoOpMediaTool))
}

pub(crate) fn create_test_client_with_media(
    transport: Arc<StubTransport>,
    media: Arc<dyn MediaTool>,
) -> (RunningHubClient, TempDir) {
    create_test_client_with_config(transport, media, |_| {})
}

/// Client whose [`test_config`] is adjusted by `configure` before use
pub(crate) fn create_test_client_with_config(
    transport: Arc<StubTransport>,
    media: Arc<dyn MediaTool>,
    configure: impl FnOnce(&mut Config),
) -> (RunningHubClient, TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(&temp_dir.path().join("output"));
    configure(&mut config);
    let client = RunningHubClient::with_parts(config, transport, media).unwrap();
    (client, temp_dir)
}

/// Solid-colour PNG
pub(crate) fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let pixels: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
    encode_png(&Image::from_rgb8(width, height, &pixels)).unwrap()
}

/// Mono 32-bit float WAV
pub(crate) fn wav_bytes(sample_rate: u32, samples: &[f32]) -> Vec<u8> {
    let audio = Audio {
        sample_rate,
        channels: vec![samples.to_vec()],
        placeholder: false,
    };
    encode_wav(&audio).unwrap()
}

/// Safetensors file with a `samples` tensor of `shape` filled with `value`
pub(crate) fn latent_bytes(shape: &[usize], value: f32) -> Vec<u8> {
    let mut tensor = Tensor::zeros(shape);
    tensor.data.iter_mut().for_each(|x| *x = value);
    encode_latent(&Latent::from_samples(tensor)).unwrap()
}

pub(crate) fn artifact(url: &str, file_type: &str) -> Artifact {
    Artifact::new(url, file_type)
}

/// Everything currently buffered on an event receiver
pub(crate) fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

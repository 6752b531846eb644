#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use video_subtitler::config::WorkspaceConfig;
use video_subtitler::error::{Endpoint, Error, Result};
use video_subtitler::transcode::ProcessOutput;
use video_subtitler::transcription::{TranscriptRequest, Waiter};
use video_subtitler::{
    CancelHandle, JobStatus, ProgressEvent, SubtitleFormat, SubtitlePipeline, TranscodeJob,
    TranscodeRunner, Transcoder, TranscriptionApi, TranscriptionClient, TranscriptionJob,
};

pub const FAKE_SRT: &[u8] = b"1\n00:00:00,000 --> 00:00:02,000\nHello and welcome\n";
pub const FAKE_VTT: &[u8] = b"WEBVTT\n\n00:00.000 --> 00:02.000\nHello and welcome\n";

/// How the fake ffmpeg behaves
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerBehavior {
    Normal,
    /// Extraction exits 0 but writes nothing
    SilentExtract,
    FailExtract(String),
    FailBurn(String),
}

/// Stands in for ffmpeg: writes plausible outputs without invoking a binary
pub struct FakeRunner {
    behavior: RunnerBehavior,
    jobs: Mutex<Vec<TranscodeJob>>,
}

impl FakeRunner {
    pub fn new(behavior: RunnerBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            jobs: Mutex::new(Vec::new()),
        })
    }

    pub fn jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

fn exited(success: bool, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        success,
        exit_code: Some(if success { 0 } else { 1 }),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl TranscodeRunner for FakeRunner {
    async fn run(&self, job: &TranscodeJob) -> std::io::Result<ProcessOutput> {
        self.jobs.lock().unwrap().push(job.clone());

        match (job, &self.behavior) {
            (TranscodeJob::ExtractAudio { .. }, RunnerBehavior::SilentExtract) => {
                Ok(exited(true, ""))
            }
            (TranscodeJob::ExtractAudio { .. }, RunnerBehavior::FailExtract(stderr)) => {
                Ok(exited(false, stderr))
            }
            (TranscodeJob::ExtractAudio { output, .. }, _) => {
                tokio::fs::write(output, b"ID3 fake mp3 audio").await?;
                Ok(exited(true, "size=1kB audio:1kB"))
            }
            (TranscodeJob::BurnSubtitles { .. }, RunnerBehavior::FailBurn(stderr)) => {
                Ok(exited(false, stderr))
            }
            (
                TranscodeJob::BurnSubtitles {
                    input,
                    subtitles,
                    output,
                    ..
                },
                _,
            ) => {
                let mut frames = tokio::fs::read(input).await?;
                frames.extend_from_slice(b"\n--burned--\n");
                frames.extend(tokio::fs::read(subtitles).await?);
                tokio::fs::write(output, frames).await?;
                Ok(exited(true, ""))
            }
        }
    }
}

/// Scripted transcription service; the last scripted status repeats
pub struct FakeApi {
    upload_status: Option<u16>,
    statuses: Mutex<VecDeque<TranscriptionJob>>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<TranscriptRequest>>,
}

impl FakeApi {
    pub fn new(statuses: Vec<TranscriptionJob>) -> Self {
        Self {
            upload_status: None,
            statuses: Mutex::new(statuses.into()),
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// queued → processing → completed
    pub fn completing() -> Arc<Self> {
        let mut completed = job("tx-1", JobStatus::Completed);
        completed.text = Some("Hello and welcome".to_string());
        Arc::new(Self::new(vec![
            job("tx-1", JobStatus::Queued),
            job("tx-1", JobStatus::Processing),
            completed,
        ]))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let mut failed = job("tx-1", JobStatus::Error);
        failed.error = Some(message.to_string());
        Arc::new(Self::new(vec![job("tx-1", JobStatus::Processing), failed]))
    }

    /// Never leaves `processing`
    pub fn stuck() -> Arc<Self> {
        Arc::new(Self::new(vec![job("tx-1", JobStatus::Processing)]))
    }

    pub fn rejecting_upload(status: u16) -> Arc<Self> {
        let mut api = Self::new(vec![job("tx-1", JobStatus::Completed)]);
        api.upload_status = Some(status);
        Arc::new(api)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<TranscriptRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

pub fn job(id: &str, status: JobStatus) -> TranscriptionJob {
    TranscriptionJob::new(id, status)
}

#[async_trait]
impl TranscriptionApi for FakeApi {
    async fn upload(&self, audio_path: &Path) -> Result<String> {
        self.record("upload");
        if let Some(status) = self.upload_status {
            return Err(Error::HttpStatus {
                endpoint: Endpoint::Upload,
                status,
                body: r#"{"error": "Authentication error, API token missing/invalid"}"#.to_string(),
            });
        }
        assert!(audio_path.is_file(), "upload before audio was extracted");
        Ok("https://cdn.example/upload/tx-audio".to_string())
    }

    async fn create_transcript(&self, request: &TranscriptRequest) -> Result<TranscriptionJob> {
        self.record("create");
        self.requests.lock().unwrap().push(request.clone());
        Ok(job("tx-1", JobStatus::Queued))
    }

    async fn get_transcript(&self, _job_id: &str) -> Result<TranscriptionJob> {
        self.record("get");
        let mut statuses = self.statuses.lock().unwrap();
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(next.expect("no scripted status"))
    }

    async fn export_subtitles(&self, _job_id: &str, format: SubtitleFormat) -> Result<Vec<u8>> {
        self.record(format!("export:{}", format));
        Ok(match format {
            SubtitleFormat::Srt => FAKE_SRT.to_vec(),
            SubtitleFormat::Vtt => FAKE_VTT.to_vec(),
        })
    }
}

/// Returns immediately, remembering what it was asked to wait
#[derive(Default)]
pub struct InstantWaiter {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Waiter for InstantWaiter {
    async fn wait(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

/// Cancels the run the first time the poller waits
pub struct CancellingWaiter {
    handle: CancelHandle,
}

impl CancellingWaiter {
    pub fn new(handle: CancelHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Waiter for CancellingWaiter {
    async fn wait(&self, _delay: Duration) {
        self.handle.cancel();
    }
}

pub fn pipeline(
    runner: Arc<FakeRunner>,
    api: Arc<FakeApi>,
    workspace_root: &Path,
) -> SubtitlePipeline {
    let transcription =
        TranscriptionClient::new(api).with_waiter(Arc::new(InstantWaiter::default()));

    pipeline_with(runner, transcription, workspace_root)
}

pub fn pipeline_with(
    runner: Arc<FakeRunner>,
    transcription: TranscriptionClient,
    workspace_root: &Path,
) -> SubtitlePipeline {
    SubtitlePipeline::new(Transcoder::new(runner), transcription).with_workspace(
        WorkspaceConfig {
            root: Some(workspace_root.to_path_buf()),
            prefix: "run-".to_string(),
        },
    )
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Number of entries left under the workspace root
pub fn leftover_workspaces(root: &Path) -> usize {
    std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
}

pub mod assemblyai;
pub mod polling;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{Error, Result};
use crate::settings::SubtitleFormat;

pub use assemblyai::AssemblyAiClient;
pub use polling::{PollPolicy, PollSchedule, TokioWaiter, Waiter};

/// Status of a transcription job as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
    /// Anything the service adds later; treated as still running
    Unknown(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Unknown(status) => status,
        }
    }
}

impl From<String> for JobStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            _ => JobStatus::Unknown(status),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transcription job, owned and updated by the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionJob {
    pub id: String,
    pub status: JobStatus,
    /// Failure reason when `status` is `error`
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    /// Seconds of audio transcribed
    #[serde(default)]
    pub audio_duration: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl TranscriptionJob {
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            error: None,
            text: None,
            language_code: None,
            audio_duration: None,
            confidence: None,
        }
    }
}

/// Body of a transcript creation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptRequest {
    pub audio_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_detection: Option<bool>,
}

impl TranscriptRequest {
    /// `language_code` of `None` asks the service to detect the language
    pub fn new(audio_url: impl Into<String>, language_code: Option<&str>) -> Self {
        Self {
            audio_url: audio_url.into(),
            language_code: language_code.map(str::to_string),
            language_detection: language_code.is_none().then_some(true),
        }
    }
}

/// The transcription service's endpoints
#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    /// Upload an audio file, returning the URL the service stored it under
    async fn upload(&self, audio_path: &Path) -> Result<String>;

    async fn create_transcript(&self, request: &TranscriptRequest) -> Result<TranscriptionJob>;

    async fn get_transcript(&self, job_id: &str) -> Result<TranscriptionJob>;

    /// Subtitle file for a completed job
    async fn export_subtitles(&self, job_id: &str, format: SubtitleFormat) -> Result<Vec<u8>>;
}

/// Drives a transcription from uploaded audio to exported subtitles
#[derive(Clone)]
pub struct TranscriptionClient {
    api: Arc<dyn TranscriptionApi>,
    waiter: Arc<dyn Waiter>,
    policy: PollPolicy,
    cancel: CancelSignal,
}

impl TranscriptionClient {
    pub fn new(api: Arc<dyn TranscriptionApi>) -> Self {
        Self {
            api,
            waiter: Arc::new(TokioWaiter),
            policy: PollPolicy::default(),
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_waiter(mut self, waiter: Arc<dyn Waiter>) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub async fn upload(&self, audio_path: &Path) -> Result<String> {
        info!("📤 Uploading audio: {}", audio_path.display());
        let upload_url = self.api.upload(audio_path).await?;
        debug!("Audio stored at {}", upload_url);
        Ok(upload_url)
    }

    /// Submit a transcription job for previously uploaded audio
    pub async fn create_job(
        &self,
        upload_url: &str,
        language_code: Option<&str>,
    ) -> Result<TranscriptionJob> {
        let request = TranscriptRequest::new(upload_url, language_code);
        let job = self.api.create_transcript(&request).await?;
        info!("📝 Transcription job {} created ({})", job.id, job.status);
        Ok(job)
    }

    /// Poll `job_id` until the service reports `completed` or `error`.
    ///
    /// Polling stops with [`Error::PollTimeout`] once the policy's `max_wait`
    /// is spent, or [`Error::Cancelled`] when the cancel signal fires.
    pub async fn await_completion(&self, job_id: &str) -> Result<TranscriptionJob> {
        let mut schedule = self.policy.schedule();

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let job = self.cancel.guard(self.api.get_transcript(job_id)).await?;

            if job.status.is_terminal() {
                return finished(job_id, job);
            }

            match &job.status {
                JobStatus::Unknown(status) => warn!(
                    "Transcription {} reported unknown status '{}', still waiting",
                    job_id, status
                ),
                status => debug!("Transcription {} is {}", job_id, status),
            }

            let delay = schedule.next_delay().ok_or_else(|| Error::PollTimeout {
                job_id: job_id.to_string(),
                waited: schedule.waited(),
            })?;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                _ = self.waiter.wait(delay) => {}
            }
        }
    }

    pub async fn export_subtitles(&self, job_id: &str, format: SubtitleFormat) -> Result<Vec<u8>> {
        let subtitles = self.api.export_subtitles(job_id, format).await?;
        info!(
            "💬 Exported {} subtitles for {} ({} bytes)",
            format,
            job_id,
            subtitles.len()
        );
        Ok(subtitles)
    }
}

/// Outcome of a job in a terminal status
fn finished(job_id: &str, job: TranscriptionJob) -> Result<TranscriptionJob> {
    if job.status == JobStatus::Completed {
        info!("✅ Transcription {} completed", job_id);
        return Ok(job);
    }

    Err(Error::Transcription {
        job_id: job_id.to_string(),
        message: job.error.unwrap_or_else(|| "unknown error".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// API whose status sequence is scripted; the last status repeats
    struct ScriptedApi {
        statuses: Mutex<VecDeque<TranscriptionJob>>,
        polls: Mutex<usize>,
    }

    impl ScriptedApi {
        fn new(jobs: Vec<TranscriptionJob>) -> Self {
            Self {
                statuses: Mutex::new(jobs.into()),
                polls: Mutex::new(0),
            }
        }

        fn polls(&self) -> usize {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TranscriptionApi for ScriptedApi {
        async fn upload(&self, _audio_path: &Path) -> Result<String> {
            Ok("https://cdn.example/upload/1".to_string())
        }

        async fn create_transcript(&self, _request: &TranscriptRequest) -> Result<TranscriptionJob> {
            Ok(TranscriptionJob::new("job-1", JobStatus::Queued))
        }

        async fn get_transcript(&self, _job_id: &str) -> Result<TranscriptionJob> {
            *self.polls.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                Ok(statuses.pop_front().unwrap())
            } else {
                Ok(statuses.front().cloned().unwrap())
            }
        }

        async fn export_subtitles(&self, _job_id: &str, _format: SubtitleFormat) -> Result<Vec<u8>> {
            Ok(b"1\n00:00:00,000 --> 00:00:01,000\nhi\n".to_vec())
        }
    }

    /// Records requested delays without sleeping
    #[derive(Default)]
    struct RecordingWaiter {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Waiter for RecordingWaiter {
        async fn wait(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    fn job(status: JobStatus) -> TranscriptionJob {
        TranscriptionJob::new("job-1", status)
    }

    fn client(api: Arc<ScriptedApi>, waiter: Arc<RecordingWaiter>) -> TranscriptionClient {
        TranscriptionClient::new(api).with_waiter(waiter)
    }

    #[tokio::test]
    async fn test_polls_until_completed() {
        let mut done = job(JobStatus::Completed);
        done.text = Some("hello there".to_string());
        let api = Arc::new(ScriptedApi::new(vec![
            job(JobStatus::Queued),
            job(JobStatus::Processing),
            done,
        ]));
        let waiter = Arc::new(RecordingWaiter::default());

        let result = client(api.clone(), waiter.clone())
            .await_completion("job-1")
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.text.as_deref(), Some("hello there"));
        // One poll after the last non-terminal status
        assert_eq!(api.polls(), 3);
        assert_eq!(
            *waiter.delays.lock().unwrap(),
            vec![Duration::from_secs(3), Duration::from_secs(3)]
        );
    }

    #[tokio::test]
    async fn test_error_status_carries_service_message() {
        let mut failed = job(JobStatus::Error);
        failed.error = Some("Audio file contains no speech".to_string());
        let api = Arc::new(ScriptedApi::new(vec![job(JobStatus::Processing), failed]));

        let err = client(api, Arc::new(RecordingWaiter::default()))
            .await_completion("job-1")
            .await
            .unwrap_err();

        match err {
            Error::Transcription { job_id, message } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(message, "Audio file contains no speech");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_without_message() {
        let api = Arc::new(ScriptedApi::new(vec![job(JobStatus::Error)]));

        let err = client(api.clone(), Arc::new(RecordingWaiter::default()))
            .await_completion("job-1")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transcription { ref message, .. } if message == "unknown error"));
        assert_eq!(api.polls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_status_keeps_polling() {
        let api = Arc::new(ScriptedApi::new(vec![
            job(JobStatus::from("throttled".to_string())),
            job(JobStatus::Completed),
        ]));

        let result = client(api.clone(), Arc::new(RecordingWaiter::default()))
            .await_completion("job-1")
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(api.polls(), 2);
    }

    #[tokio::test]
    async fn test_stuck_job_times_out() {
        let api = Arc::new(ScriptedApi::new(vec![job(JobStatus::Processing)]));
        let waiter = Arc::new(RecordingWaiter::default());

        let err = client(api.clone(), waiter.clone())
            .with_policy(PollPolicy::fixed(
                Duration::from_secs(3),
                Duration::from_secs(9),
            ))
            .await_completion("job-1")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PollTimeout { .. }));
        assert_eq!(api.polls(), 4);
        assert_eq!(waiter.delays.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_polling() {
        let api = Arc::new(ScriptedApi::new(vec![job(JobStatus::Processing)]));
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let err = client(api.clone(), Arc::new(RecordingWaiter::default()))
            .with_cancel(signal)
            .await_completion("job-1")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(api.polls(), 0);
    }

    #[test]
    fn test_status_round_trips_unknown_values() {
        let job: TranscriptionJob =
            serde_json::from_str(r#"{"id": "abc", "status": "paused"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Unknown("paused".to_string()));
        assert!(!job.status.is_terminal());
        assert_eq!(serde_json::to_value(&job.status).unwrap(), "paused");
    }

    #[test]
    fn test_transcript_request_language() {
        let auto = serde_json::to_value(TranscriptRequest::new("u", None)).unwrap();
        assert_eq!(
            auto,
            serde_json::json!({"audio_url": "u", "language_detection": true})
        );

        let fixed = serde_json::to_value(TranscriptRequest::new("u", Some("es"))).unwrap();
        assert_eq!(fixed, serde_json::json!({"audio_url": "u", "language_code": "es"}));
    }
}

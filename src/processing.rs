use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::cancel::CancelSignal;
use crate::config::{Config, Credentials, WorkspaceConfig};
use crate::error::{Error, Result, TranscodeStage};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::settings::{ProcessingSettings, SubtitleFormat};
use crate::transcode::{FfmpegRunner, SubtitleStyle, Transcoder};
use crate::transcription::{AssemblyAiClient, PollPolicy, TranscriptionClient};
use crate::workspace::Workspace;

/// Sequential steps of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingStage {
    ValidateInput,
    Workspace,
    AudioExtraction,
    Upload,
    JobCreation,
    Transcription,
    SubtitleExport,
    SubtitleBurn,
    VideoCopy,
    Finalize,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessingStage::ValidateInput => "validating input",
            ProcessingStage::Workspace => "preparing workspace",
            ProcessingStage::AudioExtraction => "extracting audio",
            ProcessingStage::Upload => "uploading audio",
            ProcessingStage::JobCreation => "creating transcription job",
            ProcessingStage::Transcription => "transcribing",
            ProcessingStage::SubtitleExport => "exporting subtitles",
            ProcessingStage::SubtitleBurn => "burning subtitles",
            ProcessingStage::VideoCopy => "copying video",
            ProcessingStage::Finalize => "collecting output",
        };
        f.write_str(label)
    }
}

/// First failure of a run, tagged with the stage it happened in
#[derive(thiserror::Error, Debug)]
#[error("Video processing failed while {stage}: {source}")]
pub struct PipelineError {
    stage: ProcessingStage,
    #[source]
    source: Error,
}

impl PipelineError {
    pub fn new(stage: ProcessingStage, source: Error) -> Self {
        Self { stage, source }
    }

    pub fn stage(&self) -> ProcessingStage {
        self.stage
    }

    pub fn error(&self) -> &Error {
        &self.source
    }
}

trait InStage<T> {
    fn in_stage(self, stage: ProcessingStage) -> std::result::Result<T, PipelineError>;
}

impl<T> InStage<T> for Result<T> {
    fn in_stage(self, stage: ProcessingStage) -> std::result::Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}

/// Output of a successful run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Final video, subtitled or an exact copy of the input
    pub video: Vec<u8>,
    pub output_filename: String,
    pub subtitles: Vec<u8>,
    pub subtitle_filename: String,
    pub subtitle_format: SubtitleFormat,
    pub transcript_id: String,
    pub stages_completed: Vec<ProcessingStage>,
    pub processing_time: Duration,
}

/// Turns a video into a subtitled video: extract audio, transcribe, export
/// subtitles, then burn them in or pass the video through.
#[derive(Clone)]
pub struct SubtitlePipeline {
    transcoder: Transcoder,
    transcription: TranscriptionClient,
    workspace: WorkspaceConfig,
    audio_extension: String,
    cancel: CancelSignal,
}

impl SubtitlePipeline {
    pub fn new(transcoder: Transcoder, transcription: TranscriptionClient) -> Self {
        Self {
            transcoder,
            transcription,
            workspace: WorkspaceConfig::default(),
            audio_extension: "mp3".to_string(),
            cancel: CancelSignal::never(),
        }
    }

    /// Wire up ffmpeg and the AssemblyAI client from configuration
    pub fn from_config(
        config: &Config,
        credentials: Credentials,
        cancel: CancelSignal,
    ) -> Result<Self> {
        config.validate()?;

        let runner = Arc::new(FfmpegRunner::new(&config.transcoder));
        let api = Arc::new(AssemblyAiClient::new(&config.transcription, credentials)?);
        let policy = PollPolicy {
            interval: config.transcription.poll_interval(),
            backoff: config.transcription.poll_backoff,
            max_interval: config.transcription.max_poll_interval(),
            max_wait: config.transcription.max_wait(),
        };

        Ok(
            Self::new(
                Transcoder::new(runner),
                TranscriptionClient::new(api).with_policy(policy),
            )
            .with_workspace(config.workspace.clone())
            .with_audio_extension(&config.transcoder.audio_extension)
            .with_cancel(cancel),
        )
    }

    pub fn with_workspace(mut self, workspace: WorkspaceConfig) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn with_audio_extension(mut self, extension: &str) -> Self {
        self.audio_extension = extension.to_string();
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.transcription = self.transcription.with_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Process one video end to end. The workspace is removed before this
    /// returns, whether the run succeeded or not.
    pub async fn run(
        &self,
        video_path: &Path,
        settings: &ProcessingSettings,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<PipelineResult, PipelineError> {
        let start_time = Instant::now();
        info!("🚀 Processing video: {}", video_path.display());

        let result = self
            .run_inner(video_path, settings, progress, start_time)
            .await;

        match &result {
            Ok(output) => info!(
                "🎉 Finished {} in {:.2}s ({} bytes)",
                output.output_filename,
                output.processing_time.as_secs_f64(),
                output.video.len()
            ),
            Err(e) => error!("❌ {}", e),
        }

        result
    }

    async fn run_inner(
        &self,
        video_path: &Path,
        settings: &ProcessingSettings,
        progress: &dyn ProgressSink,
        start_time: Instant,
    ) -> std::result::Result<PipelineResult, PipelineError> {
        let input = InputVideo::inspect(video_path)
            .await
            .in_stage(ProcessingStage::ValidateInput)?;

        let workspace = Workspace::acquire(self.workspace.root.as_deref(), &self.workspace.prefix)
            .in_stage(ProcessingStage::Workspace)?;

        let outcome = self.process(&input, &workspace, settings, progress).await;

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.release() {
            warn!(
                "Failed to remove workspace {}: {}",
                workspace_path.display(),
                e
            );
        }

        outcome.map(|mut output| {
            output.processing_time = start_time.elapsed();
            output
        })
    }

    async fn process(
        &self,
        input: &InputVideo,
        workspace: &Workspace,
        settings: &ProcessingSettings,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<PipelineResult, PipelineError> {
        let mut stages_completed = vec![ProcessingStage::ValidateInput, ProcessingStage::Workspace];

        // Stage 1: Audio extraction
        progress.stage_reached(ProgressEvent::ExtractingAudio);
        let audio_path = workspace.audio_path(&input.stem, &self.audio_extension);
        self.step(
            ProcessingStage::AudioExtraction,
            self.transcoder.extract_audio(&input.path, &audio_path),
        )
        .await?;
        stages_completed.push(ProcessingStage::AudioExtraction);

        // Stage 2: Upload and job creation
        progress.stage_reached(ProgressEvent::Uploading);
        let upload_url = self
            .step(ProcessingStage::Upload, self.transcription.upload(&audio_path))
            .await?;
        stages_completed.push(ProcessingStage::Upload);

        progress.stage_reached(ProgressEvent::Transcribing);
        let job = self
            .step(
                ProcessingStage::JobCreation,
                self.transcription
                    .create_job(&upload_url, settings.language_code()),
            )
            .await?;
        stages_completed.push(ProcessingStage::JobCreation);

        // Stage 3: Wait for the transcript
        let transcript = self
            .step(
                ProcessingStage::Transcription,
                self.transcription.await_completion(&job.id),
            )
            .await?;
        stages_completed.push(ProcessingStage::Transcription);

        // Stage 4: Subtitle export
        progress.stage_reached(ProgressEvent::ExportingSubtitles);
        let format = settings.subtitle_format;
        let subtitles = self
            .step(
                ProcessingStage::SubtitleExport,
                self.transcription.export_subtitles(&transcript.id, format),
            )
            .await?;
        let subtitle_path = workspace.subtitle_path(&input.stem, format);
        tokio::fs::write(&subtitle_path, &subtitles)
            .await
            .map_err(|e| Error::filesystem("failed to write subtitles", &subtitle_path, e))
            .in_stage(ProcessingStage::SubtitleExport)?;
        stages_completed.push(ProcessingStage::SubtitleExport);

        // Stage 5: Burn in, or pass the original through
        let (output_filename, output_path) = if settings.burn_subtitles {
            progress.stage_reached(ProgressEvent::BurningSubtitles);
            let filename = input.subtitled_filename();
            let output_path = workspace.output_path(&filename);
            let style = SubtitleStyle {
                font_size: settings.font_size.points(),
            };
            self.step(
                ProcessingStage::SubtitleBurn,
                self.transcoder
                    .burn_subtitles(&input.path, &subtitle_path, &output_path, style),
            )
            .await?;
            stages_completed.push(ProcessingStage::SubtitleBurn);
            (filename, output_path)
        } else {
            let filename = input.filename.clone();
            let output_path = workspace.output_path(&filename);
            self.step(ProcessingStage::VideoCopy, async {
                tokio::fs::copy(&input.path, &output_path)
                    .await
                    .map(|_| ())
                    .map_err(|e| Error::filesystem("failed to copy video", &output_path, e))
            })
            .await?;
            stages_completed.push(ProcessingStage::VideoCopy);
            (filename, output_path)
        };

        // Stage 6: Collect output
        let video = read_output(&output_path, settings.burn_subtitles)
            .await
            .in_stage(ProcessingStage::Finalize)?;
        stages_completed.push(ProcessingStage::Finalize);

        Ok(PipelineResult {
            video,
            output_filename,
            subtitles,
            subtitle_filename: format!("{}.{}", input.stem, format.extension()),
            subtitle_format: format,
            transcript_id: transcript.id,
            stages_completed,
            processing_time: Duration::ZERO,
        })
    }

    /// Run one stage, aborting if cancellation is requested
    async fn step<T, F>(
        &self,
        stage: ProcessingStage,
        fut: F,
    ) -> std::result::Result<T, PipelineError>
    where
        F: Future<Output = Result<T>>,
    {
        self.cancel.guard(fut).await.in_stage(stage)
    }
}

/// The source video and the names derived from it
#[derive(Debug, Clone)]
struct InputVideo {
    path: PathBuf,
    filename: String,
    stem: String,
    /// Extension including the leading dot, or empty
    extension: String,
}

impl InputVideo {
    async fn inspect(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::filesystem("input video not readable", path, e))?;

        if !metadata.is_file() {
            return Err(Error::filesystem(
                "input video is not a file",
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        Self::from_path(path)
    }

    fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::filesystem(
                    "invalid video filename",
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
                )
            })?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.clone());

        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            stem,
            extension,
        })
    }

    fn subtitled_filename(&self) -> String {
        format!("{}_subtitled{}", self.stem, self.extension)
    }
}

/// Read the final video back, rejecting missing or empty output
async fn read_output(path: &Path, burned: bool) -> Result<Vec<u8>> {
    let video = tokio::fs::read(path)
        .await
        .map_err(|e| Error::filesystem("output video missing", path, e))?;

    if video.is_empty() {
        return Err(if burned {
            Error::ExternalProcess {
                stage: TranscodeStage::Burn,
                diagnostics: format!("{} is empty", path.display()),
            }
        } else {
            Error::filesystem(
                "output video is empty",
                path,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty file"),
            )
        });
    }

    Ok(video)
}

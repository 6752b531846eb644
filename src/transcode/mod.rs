pub mod ffmpeg;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result, TranscodeStage};

pub use ffmpeg::FfmpegRunner;

/// Maximum diagnostic text kept from a failed process
const MAX_DIAGNOSTIC_CHARS: usize = 4000;

/// Styling for burned-in subtitles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtitleStyle {
    pub font_size: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self { font_size: 24 }
    }
}

/// A single transcoding operation
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeJob {
    /// Strip video and write an audio-only file
    ExtractAudio { input: PathBuf, output: PathBuf },
    /// Render subtitles into the frames, copy audio unchanged
    BurnSubtitles {
        input: PathBuf,
        subtitles: PathBuf,
        output: PathBuf,
        style: SubtitleStyle,
    },
}

impl TranscodeJob {
    pub fn stage(&self) -> TranscodeStage {
        match self {
            TranscodeJob::ExtractAudio { .. } => TranscodeStage::Extract,
            TranscodeJob::BurnSubtitles { .. } => TranscodeStage::Burn,
        }
    }

    /// File the operation is expected to produce
    pub fn output(&self) -> &Path {
        match self {
            TranscodeJob::ExtractAudio { output, .. } => output,
            TranscodeJob::BurnSubtitles { output, .. } => output,
        }
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs transcode operations with an external tool
#[async_trait]
pub trait TranscodeRunner: Send + Sync {
    async fn run(&self, job: &TranscodeJob) -> std::io::Result<ProcessOutput>;
}

/// Extracts audio and burns subtitles, checking that each operation really
/// produced its output file
#[derive(Clone)]
pub struct Transcoder {
    runner: Arc<dyn TranscodeRunner>,
}

impl Transcoder {
    pub fn new(runner: Arc<dyn TranscodeRunner>) -> Self {
        Self { runner }
    }

    /// Extract the audio track of `video_path` into `audio_path`
    pub async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<PathBuf> {
        info!("🎵 Extracting audio: {}", video_path.display());

        let job = TranscodeJob::ExtractAudio {
            input: video_path.to_path_buf(),
            output: audio_path.to_path_buf(),
        };
        self.run_checked(&job).await?;

        info!("✅ Audio extracted: {}", audio_path.display());
        Ok(audio_path.to_path_buf())
    }

    /// Render `subtitle_path` into the frames of `video_path`, writing `output_path`
    pub async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        style: SubtitleStyle,
    ) -> Result<()> {
        info!("🔥 Burning subtitles into: {}", video_path.display());

        let job = TranscodeJob::BurnSubtitles {
            input: video_path.to_path_buf(),
            subtitles: subtitle_path.to_path_buf(),
            output: output_path.to_path_buf(),
            style,
        };
        self.run_checked(&job).await?;

        info!("✅ Subtitled video written: {}", output_path.display());
        Ok(())
    }

    async fn run_checked(&self, job: &TranscodeJob) -> Result<()> {
        let stage = job.stage();

        let output = self
            .runner
            .run(job)
            .await
            .map_err(|e| Error::ExternalProcess {
                stage,
                diagnostics: format!("failed to run transcoder: {}", e),
            })?;

        if !output.stdout.trim().is_empty() {
            debug!("transcoder stdout: {}", output.stdout.trim());
        }
        if !output.stderr.trim().is_empty() {
            debug!("transcoder stderr: {}", output.stderr.trim());
        }

        if !output.success {
            let code = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(Error::ExternalProcess {
                stage,
                diagnostics: format!("exit status {}: {}", code, tail(&output.stderr)),
            });
        }

        // A zero exit status is not trusted on its own
        let produced = tokio::fs::metadata(job.output())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !produced {
            return Err(Error::ExternalProcess {
                stage,
                diagnostics: format!(
                    "reported success but {} was not created",
                    job.output().display()
                ),
            });
        }

        Ok(())
    }
}

/// Last part of the process output, where ffmpeg prints the actual error
fn tail(text: &str) -> &str {
    let text = text.trim();
    if text.len() <= MAX_DIAGNOSTIC_CHARS {
        return text;
    }
    let mut start = text.len() - MAX_DIAGNOSTIC_CHARS;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

//! Video Subtitler
//!
//! Extracts the audio track of a video with ffmpeg, transcribes it with
//! AssemblyAI, and burns the resulting subtitles back into the video.

pub mod cancel;
pub mod config;
pub mod error;
pub mod processing;
pub mod progress;
pub mod settings;
pub mod transcode;
pub mod transcription;
pub mod workspace;

// Re-export main types for easy access
pub use crate::cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use crate::config::{Config, ConfigBuilder, Credentials};
pub use crate::error::{Error, Result};
pub use crate::processing::{PipelineError, PipelineResult, ProcessingStage, SubtitlePipeline};
pub use crate::progress::{ChannelProgress, LogProgress, NoProgress, ProgressEvent, ProgressSink};
pub use crate::settings::{FontSize, ProcessingSettings, SubtitleFormat};
pub use crate::transcode::{FfmpegRunner, TranscodeJob, TranscodeRunner, Transcoder};
pub use crate::transcription::{
    AssemblyAiClient, JobStatus, PollPolicy, TranscriptionApi, TranscriptionClient,
    TranscriptionJob,
};
pub use crate::workspace::Workspace;

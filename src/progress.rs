use std::fmt;
use tokio::sync::mpsc;
use tracing::info;

/// Stage boundary reported while a video is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    ExtractingAudio,
    Uploading,
    Transcribing,
    ExportingSubtitles,
    BurningSubtitles,
}

impl ProgressEvent {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressEvent::ExtractingAudio => "extracting audio",
            ProgressEvent::Uploading => "uploading",
            ProgressEvent::Transcribing => "transcribing",
            ProgressEvent::ExportingSubtitles => "exporting subtitles",
            ProgressEvent::BurningSubtitles => "burning subtitles",
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives stage notifications from the pipeline
pub trait ProgressSink: Send + Sync {
    fn stage_reached(&self, event: ProgressEvent);
}

/// Writes each stage to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn stage_reached(&self, event: ProgressEvent) {
        info!("Progress: {}", event);
    }
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn stage_reached(&self, _event: ProgressEvent) {}
}

/// Forwards progress over a channel, e.g. to a UI task
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn stage_reached(&self, event: ProgressEvent) {
        // A closed receiver only means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

use super::{ProcessOutput, SubtitleStyle, TranscodeJob, TranscodeRunner};
use crate::config::TranscoderConfig;

/// Runs transcode operations with the ffmpeg command line tool
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: PathBuf,
    audio_codec: String,
    sample_rate: u32,
    channels: u32,
}

impl FfmpegRunner {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            binary: config.ffmpeg_path.clone(),
            audio_codec: config.audio_codec.clone(),
            sample_rate: config.audio_sample_rate,
            channels: config.audio_channels,
        }
    }

    /// Command line arguments for `job`
    pub fn args(&self, job: &TranscodeJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();

        match job {
            TranscodeJob::ExtractAudio { input, output } => {
                args.push(input.into());
                args.extend(
                    [
                        "-vn".to_string(), // No video stream
                        "-acodec".to_string(),
                        self.audio_codec.clone(),
                        "-ar".to_string(),
                        self.sample_rate.to_string(),
                        "-ac".to_string(),
                        self.channels.to_string(),
                    ]
                    .into_iter()
                    .map(OsString::from),
                );
                args.push(output.into());
            }
            TranscodeJob::BurnSubtitles {
                input,
                subtitles,
                output,
                style,
            } => {
                args.push(input.into());
                args.push("-vf".into());
                args.push(subtitles_filter(subtitles, style).into());
                args.push("-c:a".into());
                args.push("copy".into());
                args.push(output.into());
            }
        }

        args
    }
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new(&TranscoderConfig::default())
    }
}

#[async_trait]
impl TranscodeRunner for FfmpegRunner {
    async fn run(&self, job: &TranscodeJob) -> std::io::Result<ProcessOutput> {
        let args = self.args(job);
        debug!("Running {} {:?}", self.binary.display(), args);

        let output = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// `subtitles` video filter for the given file and style
fn subtitles_filter(subtitles: &Path, style: &SubtitleStyle) -> String {
    format!(
        "subtitles={}:force_style='FontSize={}'",
        escape_filter_path(&subtitles.to_string_lossy()),
        style.font_size
    )
}

/// Escape a path for use as a filter option value inside a filtergraph.
/// Both escaping levels apply: option value, then filtergraph.
fn escape_filter_path(path: &str) -> String {
    let escape = |text: &str, special: &[char]| -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            if special.contains(&c) {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    };

    let value = escape(path, &['\\', '\'', ':']);
    escape(&value, &['\\', '\'', '[', ']', ',', ';'])
}

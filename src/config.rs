use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Configuration for the video subtitler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcription service settings
    pub transcription: TranscriptionConfig,

    /// ffmpeg invocation settings
    pub transcoder: TranscoderConfig,

    /// Scratch directory settings
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL of the transcription API
    pub base_url: String,

    /// Environment variable holding the API token
    pub api_key_env: String,

    /// Upload chunk size (bytes)
    pub upload_chunk_size: usize,

    /// Delay between status polls (seconds)
    pub poll_interval_seconds: u64,

    /// Multiplier applied to the poll delay after each non-terminal status
    pub poll_backoff: f64,

    /// Upper bound on a single poll delay (seconds)
    pub max_poll_interval_seconds: u64,

    /// Total time to keep polling before giving up (seconds)
    pub max_wait_seconds: u64,

    /// Connection timeout for API calls (seconds)
    pub connect_timeout_seconds: u64,

    /// Timeout for a single API request, uploads included (seconds)
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// ffmpeg executable
    pub ffmpeg_path: PathBuf,

    /// Codec for the extracted audio track
    pub audio_codec: String,

    /// File extension matching `audio_codec`
    pub audio_extension: String,

    /// Target sample rate for transcription
    pub audio_sample_rate: u32,

    pub audio_channels: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for per-run workspaces (system temp dir if unset)
    pub root: Option<PathBuf>,

    /// Name prefix of each workspace directory
    pub prefix: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.assemblyai.com".to_string(),
            api_key_env: "ASSEMBLYAI_API_KEY".to_string(),
            upload_chunk_size: 5 * 1024 * 1024, // 5 MiB chunks
            poll_interval_seconds: 3,
            poll_backoff: 1.0,
            max_poll_interval_seconds: 30,
            max_wait_seconds: 3600, // 60 minutes for long recordings
            connect_timeout_seconds: 30,
            request_timeout_seconds: 600,
        }
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            audio_codec: "libmp3lame".to_string(),
            audio_extension: "mp3".to_string(),
            audio_sample_rate: 16000,
            audio_channels: 1,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "subtitler-".to_string(),
        }
    }
}

impl TranscriptionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_secs(self.max_poll_interval_seconds)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }
}

impl Config {
    /// Load configuration from the first config file found
    pub fn load() -> Result<Self> {
        let config_paths = [
            "subtitler.toml",
            "config/subtitler.toml",
            "/etc/video-subtitler/config.toml",
        ];

        for path in &config_paths {
            let path = Path::new(path);
            if path.is_file() {
                return Self::from_file(path);
            }
        }

        Err(Error::Configuration("no configuration file found".to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| Error::filesystem("failed to read config", path, e))?;

        let config: Config = toml::from_str(&config_str).map_err(|e| {
            Error::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;

        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var("SUBTITLER_BASE_URL") {
            self.transcription.base_url = base_url;
        }

        if let Ok(ffmpeg) = std::env::var("SUBTITLER_FFMPEG") {
            self.transcoder.ffmpeg_path = PathBuf::from(ffmpeg);
        }

        if let Ok(interval) = std::env::var("SUBTITLER_POLL_INTERVAL") {
            match interval.parse() {
                Ok(seconds) => self.transcription.poll_interval_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid SUBTITLER_POLL_INTERVAL: {}", interval),
            }
        }

        if let Ok(max_wait) = std::env::var("SUBTITLER_MAX_WAIT") {
            match max_wait.parse() {
                Ok(seconds) => self.transcription.max_wait_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid SUBTITLER_MAX_WAIT: {}", max_wait),
            }
        }

        if let Ok(root) = std::env::var("SUBTITLER_WORKSPACE_ROOT") {
            self.workspace.root = Some(PathBuf::from(root));
        }

        self
    }

    /// Defaults with environment variable overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.transcription.base_url).map_err(|e| {
            Error::Configuration(format!(
                "invalid base_url {}: {}",
                self.transcription.base_url, e
            ))
        })?;

        if self.transcription.upload_chunk_size == 0 {
            return Err(Error::Configuration(
                "upload_chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.transcription.poll_interval_seconds == 0 {
            return Err(Error::Configuration(
                "poll_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.transcription.poll_backoff < 1.0 {
            return Err(Error::Configuration(
                "poll_backoff must be at least 1.0".to_string(),
            ));
        }

        if self.transcoder.audio_sample_rate == 0 {
            return Err(Error::Configuration(
                "audio_sample_rate must be greater than 0".to_string(),
            ));
        }

        if self.transcoder.audio_extension.is_empty() {
            return Err(Error::Configuration(
                "audio_extension must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Subtitler Configuration:\n\
            - Transcription API: {}\n\
            - Poll interval: {}s (max wait {}s)\n\
            - ffmpeg: {}\n\
            - Audio: {} @ {}Hz\n\
            - Workspace root: {}",
            self.transcription.base_url,
            self.transcription.poll_interval_seconds,
            self.transcription.max_wait_seconds,
            self.transcoder.ffmpeg_path.display(),
            self.transcoder.audio_codec,
            self.transcoder.audio_sample_rate,
            self.workspace
                .root
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<system temp>".to_string()),
        )
    }
}

/// API credential for the transcription service
#[derive(Clone)]
pub struct Credentials {
    api_token: String,
}

impl Credentials {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
        }
    }

    /// Read the token from `var`; a missing or blank value is a configuration error
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(token.trim())),
            _ => Err(Error::Configuration(format!(
                "{} environment variable not set",
                var
            ))),
        }
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.transcription.base_url = base_url.into();
        self
    }

    pub fn with_poll_interval(mut self, seconds: u64) -> Self {
        self.config.transcription.poll_interval_seconds = seconds;
        self
    }

    pub fn with_max_wait(mut self, seconds: u64) -> Self {
        self.config.transcription.max_wait_seconds = seconds;
        self
    }

    pub fn with_upload_chunk_size(mut self, bytes: usize) -> Self {
        self.config.transcription.upload_chunk_size = bytes;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.config.transcoder.ffmpeg_path = path;
        self
    }

    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        self.config.workspace.root = Some(root);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

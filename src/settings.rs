//! Per-run processing settings, as submitted alongside the video

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Subtitle formats the transcription service can export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Vtt,
}

impl SubtitleFormat {
    /// File extension and export path segment
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Size of burned-in subtitle text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    /// Point size passed to the subtitle renderer
    pub fn points(&self) -> u32 {
        match self {
            FontSize::Small => 18,
            FontSize::Medium => 24,
            FontSize::Large => 32,
        }
    }
}

/// Recognized options for one pipeline run. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingSettings {
    pub subtitle_format: SubtitleFormat,
    pub burn_subtitles: bool,
    /// "auto" for language detection, otherwise a language code such as "en"
    pub language: String,
    pub font_size: FontSize,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            subtitle_format: SubtitleFormat::Srt,
            burn_subtitles: true,
            language: "auto".to_string(),
            font_size: FontSize::Medium,
        }
    }
}

impl ProcessingSettings {
    /// Parse settings JSON. Unsupported subtitle formats are rejected here,
    /// before any work is started.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid settings: {}", e)))
    }

    pub fn with_subtitle_format(mut self, format: SubtitleFormat) -> Self {
        self.subtitle_format = format;
        self
    }

    pub fn with_burn_subtitles(mut self, burn: bool) -> Self {
        self.burn_subtitles = burn;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_font_size(mut self, font_size: FontSize) -> Self {
        self.font_size = font_size;
        self
    }

    /// Language code to request, or `None` for automatic detection
    pub fn language_code(&self) -> Option<&str> {
        let language = self.language.trim();
        if language.is_empty() || language.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(language)
        }
    }
}

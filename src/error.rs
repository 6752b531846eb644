use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Result type for subtitling operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which ffmpeg operation produced an [`Error::ExternalProcess`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeStage {
    Extract,
    Burn,
}

impl fmt::Display for TranscodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeStage::Extract => write!(f, "extract"),
            TranscodeStage::Burn => write!(f, "burn"),
        }
    }
}

/// Transcription service endpoints, used to tag HTTP failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Upload,
    CreateTranscript,
    GetTranscript,
    Export,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::Upload => "upload",
            Endpoint::CreateTranscript => "transcript creation",
            Endpoint::GetTranscript => "transcript status",
            Endpoint::Export => "subtitle export",
        };
        f.write_str(name)
    }
}

/// Error types for subtitling operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// ffmpeg exited non-zero, could not be spawned, or left no output behind
    #[error("ffmpeg {stage} failed: {diagnostics}")]
    ExternalProcess {
        stage: TranscodeStage,
        diagnostics: String,
    },

    #[error("{endpoint} request failed: {source}")]
    Network {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} failed: {status} - {body}")]
    HttpStatus {
        endpoint: Endpoint,
        status: u16,
        body: String,
    },

    #[error("unexpected {endpoint} response: {source}")]
    InvalidResponse {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },

    /// The service reported the job itself as failed
    #[error("transcription {job_id} failed: {message}")]
    Transcription { job_id: String, message: String },

    #[error("transcription {job_id} still not finished after waiting {waited:?}")]
    PollTimeout { job_id: String, waited: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error("{context} ({}): {source}", .path.display())]
    Filesystem {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub(crate) fn filesystem(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Filesystem {
            context,
            path: path.into(),
            source,
        }
    }

    /// HTTP status code carried by the error, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            Error::Network { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message_contains_code_and_body() {
        let err = Error::HttpStatus {
            endpoint: Endpoint::Upload,
            status: 401,
            body: "Authentication error".to_string(),
        };

        assert_eq!(err.to_string(), "upload failed: 401 - Authentication error");
        assert_eq!(err.http_status(), Some(401));
    }

    #[test]
    fn test_external_process_message_names_stage() {
        let err = Error::ExternalProcess {
            stage: TranscodeStage::Burn,
            diagnostics: "No such filter: 'subtitles'".to_string(),
        };

        assert!(err.to_string().starts_with("ffmpeg burn failed"));
        assert_eq!(err.http_status(), None);
    }
}

use async_trait::async_trait;
use futures::stream::{self, Stream};
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;
use url::Url;

use super::{TranscriptRequest, TranscriptionApi, TranscriptionJob};
use crate::config::{Credentials, TranscriptionConfig};
use crate::error::{Endpoint, Error, Result};
use crate::settings::SubtitleFormat;

/// AssemblyAI v2 REST client
pub struct AssemblyAiClient {
    base_url: Url,
    credentials: Credentials,
    chunk_size: usize,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

impl AssemblyAiClient {
    pub fn new(config: &TranscriptionConfig, credentials: Credentials) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            Error::Configuration(format!("invalid base_url {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "invalid base_url {}: not a base URL",
                config.base_url
            )));
        }
        // Relative endpoint paths are joined below the base path
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            credentials,
            chunk_size: config.upload_chunk_size.max(1),
            client,
        })
    }

    /// `path` is relative to the base URL; `segments` are appended verbatim,
    /// percent-encoded as single path segments
    fn url(&self, path: &str, segments: &[&str]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| Error::Configuration(format!("invalid endpoint path {}: {}", path, e)))?;

        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| Error::Configuration(format!("cannot extend endpoint path {}", path)))?
                .pop_if_empty()
                .extend(segments);
        }

        Ok(url)
    }

    /// Send a request, mapping transport failures and non-200 replies
    async fn send(&self, endpoint: Endpoint, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request
            .header(header::AUTHORIZATION, self.credentials.api_token())
            .send()
            .await
            .map_err(|source| Error::Network { endpoint, source })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(endpoint: Endpoint, response: Response) -> Result<T> {
        let body = response
            .bytes()
            .await
            .map_err(|source| Error::Network { endpoint, source })?;

        serde_json::from_slice(&body).map_err(|source| Error::InvalidResponse { endpoint, source })
    }
}

/// Read `file` as a stream of `chunk_size` pieces
fn file_chunks(
    file: File,
    chunk_size: usize,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    stream::try_unfold(file, move |mut file| async move {
        let mut chunk = Vec::with_capacity(chunk_size);
        (&mut file)
            .take(chunk_size as u64)
            .read_to_end(&mut chunk)
            .await?;

        let next = if chunk.is_empty() {
            None
        } else {
            Some((chunk, file))
        };
        Ok::<_, std::io::Error>(next)
    })
}

#[async_trait]
impl TranscriptionApi for AssemblyAiClient {
    async fn upload(&self, audio_path: &Path) -> Result<String> {
        let file = File::open(audio_path)
            .await
            .map_err(|e| Error::filesystem("failed to open audio for upload", audio_path, e))?;

        let size = file.metadata().await.map(|m| m.len()).unwrap_or(0);
        debug!("Uploading {} bytes in {} byte chunks", size, self.chunk_size);

        let body = reqwest::Body::wrap_stream(file_chunks(file, self.chunk_size));
        let request = self
            .client
            .post(self.url("v2/upload", &[])?)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body);

        let response = self.send(Endpoint::Upload, request).await?;
        let upload: UploadResponse = Self::read_json(Endpoint::Upload, response).await?;
        Ok(upload.upload_url)
    }

    async fn create_transcript(&self, request: &TranscriptRequest) -> Result<TranscriptionJob> {
        let http_request = self.client.post(self.url("v2/transcript", &[])?).json(request);

        let response = self.send(Endpoint::CreateTranscript, http_request).await?;
        Self::read_json(Endpoint::CreateTranscript, response).await
    }

    async fn get_transcript(&self, job_id: &str) -> Result<TranscriptionJob> {
        let url = self.url("v2/transcript", &[job_id])?;

        let response = self.send(Endpoint::GetTranscript, self.client.get(url)).await?;
        Self::read_json(Endpoint::GetTranscript, response).await
    }

    async fn export_subtitles(&self, job_id: &str, format: SubtitleFormat) -> Result<Vec<u8>> {
        let url = self.url("v2/transcript", &[job_id, format.extension()])?;

        let response = self.send(Endpoint::Export, self.client.get(url)).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| Error::Network {
                endpoint: Endpoint::Export,
                source,
            })?;

        Ok(body.to_vec())
    }
}

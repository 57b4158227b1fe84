use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dify_relay_common::{
    filename_from_content_disposition, filename_from_url, generated_filename, sanitize_filename,
};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{RelayError, Result};

/// Where a file to be uploaded comes from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Fetched over HTTP at upload time.
    Url(String),
    /// Bytes already received in a multipart form.
    Upload { filename: String, content: Bytes },
}

impl FileSource {
    /// Human-readable origin used in logs and error messages.
    pub fn describe(&self) -> &str {
        match self {
            FileSource::Url(url) => url,
            FileSource::Upload { filename, .. } => filename,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub filename: String,
    pub content: Bytes,
}

/// Turns a [`FileSource`] into bytes plus a sanitized filename.
#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve(&self, source: &FileSource) -> Result<ResolvedFile>;
}

/// Resolver that downloads URLs with a bounded timeout.
pub struct HttpFileResolver {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFileResolver {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// GET the URL. Anything but 200 is a failure.
    pub async fn download(&self, url: &str) -> Result<ResolvedFile> {
        let download_error = |message: String| RelayError::Download {
            url: url.to_string(),
            message,
        };

        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(download_error(format!("HTTP status {status}")));
        }

        let mut filename = filename_from_url(url);
        if filename.is_empty() {
            filename = resp
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(filename_from_content_disposition)
                .unwrap_or_else(|| generated_filename("download"));
        }
        let filename = sanitize_filename(&filename);

        let content = resp
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        debug!(url, filename = %filename, size = content.len(), "Downloaded file");

        Ok(ResolvedFile { filename, content })
    }
}

#[async_trait]
impl FileResolver for HttpFileResolver {
    async fn resolve(&self, source: &FileSource) -> Result<ResolvedFile> {
        match source {
            FileSource::Url(url) => self.download(url).await,
            FileSource::Upload { filename, content } => Ok(ResolvedFile {
                filename: sanitize_filename(filename),
                content: content.clone(),
            }),
        }
    }
}

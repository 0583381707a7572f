use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::CrawlError;
use crate::model::{ImageTask, Outcome};

/// HTTP side of the crawler: single-attempt page reads and retrying image downloads.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    retry: RetryPolicy,
}

impl Downloader {
    /// `timeout` bounds connecting and each read, not the whole transfer, so a large
    /// image that keeps arriving is never cut off.
    pub fn new(user_agent: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .cookie_store(true)
            .build()?;
        Ok(Self { client, retry })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.user_agent, config.timeout(), config.retry)
    }

    /// GET a page as text. One attempt, only 200 counts.
    #[instrument(skip(self))]
    pub async fn page(&self, url: &str) -> Result<String, CrawlError> {
        let response = self.get(url).await?;
        let body = response
            .text()
            .await
            .map_err(|source| CrawlError::Transport {
                url: url.to_owned(),
                source,
            })?;
        debug!("fetched {} bytes", body.len());
        Ok(body)
    }

    /// GET and decode a JSON document. One attempt.
    pub async fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CrawlError> {
        let body = self.page(url).await?;
        serde_json::from_str(&body).map_err(|e| CrawlError::parse(url, e.to_string()))
    }

    /// Download `task.source_url` into `task.destination_path`, trying at most `max_retries` times.
    ///
    /// The body is streamed into a hidden `.part` sibling and renamed into place only after a
    /// complete 200 response, so a file at the destination is always a finished download.
    /// `task.attempt_count` records the attempts made by this call.
    pub async fn fetch_to_file(&self, task: &mut ImageTask, max_retries: u32) -> Outcome {
        let max_retries = max_retries.max(1);
        task.attempt_count = 0;

        if let Some(parent) = task.destination_path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                let err = CrawlError::filesystem(parent, e);
                error!("[FAILED] {}: {}", task.source_url, err);
                return Outcome::Failed(err.to_string());
            }
        }

        let mut last_error = None;
        while task.attempt_count < max_retries {
            task.attempt_count += 1;
            let attempt = task.attempt_count;
            match self.attempt(&task.source_url, &task.destination_path).await {
                Ok(()) => {
                    info!("[OK] {}", display_name(&task.destination_path));
                    return Outcome::Success;
                }
                Err(err) if !err.is_retryable() => {
                    error!("[FAILED] {}: {}", task.source_url, err);
                    return Outcome::Failed(err.to_string());
                }
                Err(err) => {
                    warn!("[Retry {}/{}] {}: {}", attempt, max_retries, task.source_url, err);
                    last_error = Some(err);
                    if attempt < max_retries {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }

        error!("[FAILED] {}", task.source_url);
        Outcome::Failed(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_owned()),
        )
    }

    async fn get(&self, url: &str) -> Result<Response, CrawlError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| CrawlError::Transport {
                url: url.to_owned(),
                source,
            })?;
        if response.status() != StatusCode::OK {
            return Err(CrawlError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_owned(),
            });
        }
        Ok(response)
    }

    async fn attempt(&self, url: &str, destination: &Path) -> Result<(), CrawlError> {
        let response = self.get(url).await?;
        let part = partial_path(destination);

        let result = match write_body(response, url, &part).await {
            Ok(()) => fs::rename(&part, destination)
                .await
                .map_err(|e| CrawlError::filesystem(destination, e)),
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(e) = fs::remove_file(&part).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not remove partial file {}: {}", part.display(), e);
                }
            }
        }
        result
    }
}

async fn write_body(mut response: Response, url: &str, part: &Path) -> Result<(), CrawlError> {
    let mut file = File::create(part)
        .await
        .map_err(|e| CrawlError::filesystem(part, e))?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| CrawlError::Transport {
            url: url.to_owned(),
            source,
        })?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| CrawlError::filesystem(part, e))?;
    }
    file.flush()
        .await
        .map_err(|e| CrawlError::filesystem(part, e))
}

fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.part", name))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while listing, fetching, and saving chapters.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("network error fetching {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("could not parse {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("chapter range {start}-{end} is invalid for a list of {len} chapters")]
    InputRange { start: usize, end: usize, len: usize },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("chapter list not found: {}", path.display())]
    MissingList { path: PathBuf },
}

impl CrawlError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Network and status failures may succeed on another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::HttpStatus { .. })
    }

    /// Errors caused by what the user asked for rather than by the network or disk.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InputRange { .. } | Self::MissingList { .. })
    }
}

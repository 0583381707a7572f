use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// The two supported sites. Each one fixes how chapter images are resolved and named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Komiku,
    Shinigami,
}

impl Source {
    pub fn name(&self) -> &'static str {
        match self {
            Source::Komiku => "komiku",
            Source::Shinigami => "shinigami",
        }
    }

    /// Turn one master-list line into the identifier its image lister needs.
    pub fn chapter_source(&self, chapter_url: &str) -> ChapterSource {
        match self {
            Source::Komiku => ChapterSource::HtmlPage(chapter_url.to_owned()),
            Source::Shinigami => ChapterSource::ApiDetail(last_path_segment(chapter_url).to_owned()),
        }
    }

    /// File name of page `index` (1-based) in a chapter of `total` pages.
    pub fn page_file_name(&self, index: usize, total: usize) -> String {
        match self {
            Source::Komiku => format!("image_{}.jpg", index),
            Source::Shinigami => {
                let width = padding_width(total);
                format!("{:0width$}.jpg", index, width = width)
            }
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `ceil(log10(total + 1))`, i.e. the digit count of `total`, never below one.
pub fn padding_width(total: usize) -> usize {
    let mut width = 1;
    let mut rest = total / 10;
    while rest > 0 {
        width += 1;
        rest /= 10;
    }
    width
}

/// Last non-empty path segment, used as the chapter or series UUID.
pub fn last_path_segment(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

/// Where the images of one chapter come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterSource {
    /// A chapter page whose content images are tagged in the HTML.
    HtmlPage(String),
    /// A chapter UUID resolved through the JSON detail endpoint.
    ApiDetail(String),
}

impl ChapterSource {
    pub fn id(&self) -> &str {
        match self {
            ChapterSource::HtmlPage(url) => url,
            ChapterSource::ApiDetail(uuid) => uuid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub source_url: String,
    pub destination_path: PathBuf,
    pub attempt_count: u32,
}

impl ImageTask {
    pub fn new(source_url: impl Into<String>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            destination_path: destination_path.into(),
            attempt_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub task: ImageTask,
    pub outcome: Outcome,
}

/// One selected chapter, alive only while it is being processed.
#[derive(Debug, Clone)]
pub struct ChapterJob {
    /// 1-based position in the master list.
    pub index: usize,
    pub source: ChapterSource,
    pub output_dir: PathBuf,
}

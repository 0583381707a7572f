//! Master chapter lists: one absolute chapter URL per line, line order = chapter order.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::CrawlError;

/// Ordering applied once, when a master list is written. Readers never reorder.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderPolicy {
    AsListed,
    /// For sites that list the newest chapter first.
    Reversed,
}

impl OrderPolicy {
    pub fn apply(&self, mut urls: Vec<String>) -> Vec<String> {
        if *self == OrderPolicy::Reversed {
            urls.reverse();
        }
        urls
    }
}

pub fn parse_manifest(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[instrument]
pub async fn read_manifest(path: &Path) -> Result<Vec<String>, CrawlError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CrawlError::MissingList {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(CrawlError::filesystem(path, e)),
    };
    let urls = parse_manifest(&content);
    info!("Loaded {} chapter URLs from {}", urls.len(), path.display());
    Ok(urls)
}

pub async fn write_manifest(path: &Path, urls: &[String]) -> Result<(), CrawlError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CrawlError::filesystem(parent, e))?;
    }
    let mut content = urls.join("\n");
    content.push('\n');
    fs::write(path, content)
        .await
        .map_err(|e| CrawlError::filesystem(path, e))?;
    info!("{} chapter URLs saved to {}", urls.len(), path.display());
    Ok(())
}

/// Names of the `.txt` master lists in `dir`, sorted. A missing directory holds none.
pub async fn list_manifests(dir: &Path) -> Result<Vec<String>, CrawlError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CrawlError::filesystem(dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CrawlError::filesystem(dir, e))?
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("txt") {
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                names.push(name.to_owned());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// A loaded master list together with the series name its results are stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesList {
    pub name: String,
    pub urls: Vec<String>,
}

impl SeriesList {
    pub async fn load(list_path: &Path) -> Result<Self, CrawlError> {
        Ok(Self {
            name: series_name(list_path),
            urls: read_manifest(list_path).await?,
        })
    }
}

/// Series directory name for a master list file: its stem.
pub fn series_name(list_path: &Path) -> String {
    list_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned())
}

pub fn manifest_path(list_dir: &Path, series: &str) -> PathBuf {
    list_dir.join(format!("{}.txt", series))
}

/// Slice `urls` to the 1-based inclusive range `start..=end`.
///
/// Returns the selected chapters and the master-list index of the first one, so
/// `chapter_<n>` folders keep the numbering of the full list.
pub fn select_range(
    urls: &[String],
    start: usize,
    end: usize,
) -> Result<(&[String], usize), CrawlError> {
    if start < 1 || start > end || end > urls.len() {
        return Err(CrawlError::InputRange {
            start,
            end,
            len: urls.len(),
        });
    }
    Ok((&urls[start - 1..end], start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("https://example.com/c/{}", i)).collect()
    }

    #[test]
    fn select_range_returns_inclusive_slice_and_offset() -> Result<(), CrawlError> {
        let all = urls(10);
        for start in 1..=10 {
            for end in start..=10 {
                let (selected, offset) = select_range(&all, start, end)?;
                assert_eq!(selected.len(), end - start + 1);
                assert_eq!(offset, start);
                assert_eq!(selected, &all[start - 1..end]);
            }
        }
        Ok(())
    }

    #[test]
    fn select_range_rejects_out_of_bounds() {
        let all = urls(3);
        for (start, end) in [(0, 2), (2, 4), (3, 2), (4, 4)] {
            match select_range(&all, start, end) {
                Err(CrawlError::InputRange { len, .. }) => assert_eq!(len, 3),
                other => panic!("expected InputRange for {}-{}, got {:?}", start, end, other),
            }
        }
        assert!(select_range(&[], 1, 1).is_err());
    }

    #[tokio::test]
    async fn series_list_is_named_after_its_file() -> Result<(), CrawlError> {
        let tmp = tempfile::tempdir().unwrap();
        let path = manifest_path(tmp.path(), "Solo_Leveling");
        write_manifest(&path, &urls(3)).await?;

        let series = SeriesList::load(&path).await?;

        assert_eq!(series.name, "Solo_Leveling");
        assert_eq!(series.urls, urls(3));
        assert!(matches!(
            SeriesList::load(&tmp.path().join("absent.txt")).await,
            Err(CrawlError::MissingList { .. })
        ));
        Ok(())
    }

    #[test]
    fn parse_manifest_skips_blank_lines_and_keeps_order() {
        let content = "https://a/1\n\n  https://a/2  \r\nhttps://a/3";
        assert_eq!(
            parse_manifest(content),
            vec!["https://a/1", "https://a/2", "https://a/3"]
        );
    }

    #[test]
    fn order_policy() {
        let listed = vec!["3".to_owned(), "2".to_owned(), "1".to_owned()];
        assert_eq!(OrderPolicy::AsListed.apply(listed.clone()), listed);
        assert_eq!(OrderPolicy::Reversed.apply(listed), vec!["1", "2", "3"]);
    }

    #[test]
    fn series_name_is_file_stem() {
        assert_eq!(series_name(Path::new("lists/One_Piece.txt")), "One_Piece");
    }

    #[tokio::test]
    async fn manifest_round_trip_and_listing() -> Result<(), CrawlError> {
        let tmp = tempfile::tempdir().map_err(|e| CrawlError::filesystem("tmp", e))?;
        let dir = tmp.path().join("lists");
        let all = urls(3);

        write_manifest(&manifest_path(&dir, "b_series"), &all).await?;
        write_manifest(&manifest_path(&dir, "a_series"), &all[..1]).await?;
        std::fs::write(dir.join("notes.md"), "ignored").map_err(|e| CrawlError::filesystem("notes", e))?;

        assert_eq!(read_manifest(&dir.join("b_series.txt")).await?, all);
        assert_eq!(
            list_manifests(&dir).await?,
            vec!["a_series.txt", "b_series.txt"]
        );
        assert!(list_manifests(&tmp.path().join("absent")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_manifest_is_reported() {
        let result = read_manifest(Path::new("/nonexistent/chapter-fetch/list.txt")).await;
        assert!(matches!(result, Err(CrawlError::MissingList { .. })));
    }
}

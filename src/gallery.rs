//! Static gallery page for a downloaded chapter: `list.json` plus an `index.html` viewer.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::CrawlError;

static LIST_FILE: &str = "list.json";
static PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.[^.]*$").expect("page number pattern"));
static INDEX_FILE: &str = "index.html";

static INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1"/>
    <title>Chapter</title>
    <style>
        body { margin: 0; background: #111; }
        img { display: block; max-width: 100%; margin: 0 auto; }
    </style>
</head>
<body>
    <main id="pages"></main>
    <script>
        fetch("list.json")
            .then((response) => response.json())
            .then((files) => {
                const pages = document.getElementById("pages");
                for (const file of files) {
                    const img = document.createElement("img");
                    img.src = file;
                    img.loading = "lazy";
                    pages.appendChild(img);
                }
            });
    </script>
</body>
</html>
"#;

/// Write `list.json` and `index.html` into `chapter_dir`; returns the listed pages.
///
/// With a `template`, that file is copied as `index.html`; otherwise the built-in viewer is used.
#[instrument(skip(template))]
pub async fn generate_index(
    chapter_dir: &Path,
    template: Option<&Path>,
) -> Result<Vec<String>, CrawlError> {
    let pages = chapter_pages(chapter_dir).await?;

    let list_path = chapter_dir.join(LIST_FILE);
    let json = serde_json::to_string_pretty(&pages)
        .map_err(|e| CrawlError::parse(list_path.display().to_string(), e.to_string()))?;
    fs::write(&list_path, json)
        .await
        .map_err(|e| CrawlError::filesystem(&list_path, e))?;

    let index_path = chapter_dir.join(INDEX_FILE);
    match template {
        Some(template) => {
            fs::copy(template, &index_path)
                .await
                .map_err(|e| CrawlError::filesystem(template, e))?;
        }
        None => fs::write(&index_path, INDEX_HTML)
            .await
            .map_err(|e| CrawlError::filesystem(&index_path, e))?,
    }

    info!("Gallery index written to {} ({} pages)", index_path.display(), pages.len());
    Ok(pages)
}

/// `.jpg` files of a chapter in page order.
async fn chapter_pages(chapter_dir: &Path) -> Result<Vec<String>, CrawlError> {
    let mut entries = fs::read_dir(chapter_dir)
        .await
        .map_err(|e| CrawlError::filesystem(chapter_dir, e))?;

    let mut pages = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CrawlError::filesystem(chapter_dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".jpg") && !name.starts_with('.') {
            pages.push(name);
        }
    }
    pages.sort_by(|a, b| (page_number(a), a).cmp(&(page_number(b), b)));
    Ok(pages)
}

// `image_10.jpg` must come after `image_9.jpg`
fn page_number(name: &str) -> Option<u64> {
    PAGE_NUMBER
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

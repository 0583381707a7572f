use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::CrawlError;

static TITLE_SELECTOR: &str = "title";
static SERIES_CHAPTER_SELECTOR: &str = "td.judulseries a";

/// HTML side of the listers: content images on chapter pages and chapter links on series pages.
pub struct Parser {
    image_selector: Selector,
    title_selector: Selector,
    chapter_selector: Selector,
}

impl Parser {
    pub fn new(image_selector: &str) -> Result<Self, CrawlError> {
        Ok(Self {
            image_selector: parse_selector(image_selector)?,
            title_selector: parse_selector(TITLE_SELECTOR)?,
            chapter_selector: parse_selector(SERIES_CHAPTER_SELECTOR)?,
        })
    }

    /// `src` of every content image, in document order, resolved against `page_url`.
    #[instrument(skip_all)]
    pub fn chapter_images(&self, html: &str, page_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let srcs: Vec<String> = document
            .select(&self.image_selector)
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(|src| resolve(base.as_ref(), src))
            .collect();
        debug!("{} content images on {}", srcs.len(), page_url);
        srcs
    }

    pub fn page_title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.title_selector)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_owned())
            .filter(|t| !t.is_empty())
    }

    /// Chapter links of a series page, in page order.
    pub fn series_chapters(&self, html: &str, page_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        document
            .select(&self.chapter_selector)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| resolve(base.as_ref(), href))
            .collect()
    }
}

fn parse_selector(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector)
        .map_err(|e| CrawlError::parse(selector, format!("invalid selector: {}", e)))
}

fn resolve(base: Option<&Url>, link: &str) -> String {
    base.and_then(|b| b.join(link).ok())
        .map(String::from)
        .unwrap_or_else(|| link.to_owned())
}

/// `{data: {base_url, chapter: {path, data: [filenames]}}}`
#[derive(Deserialize, Debug)]
pub struct ChapterDetail {
    data: ChapterDetailData,
}

#[derive(Deserialize, Debug)]
struct ChapterDetailData {
    base_url: String,
    chapter: ChapterPages,
}

#[derive(Deserialize, Debug)]
struct ChapterPages {
    path: String,
    data: Vec<String>,
}

impl ChapterDetail {
    /// `base_url + path + filename` for each page, in list order.
    pub fn image_urls(&self) -> Vec<String> {
        let prefix = format!("{}{}", self.data.base_url, self.data.chapter.path);
        self.data
            .chapter
            .data
            .iter()
            .map(|file| format!("{}{}", prefix, file))
            .collect()
    }
}

/// One page of the chapter listing endpoint: `{data: [...]}`. A missing or null
/// `data` is an empty page.
#[derive(Deserialize, Debug, Default)]
pub struct ChapterListPage {
    #[serde(default)]
    data: Option<Vec<ChapterListItem>>,
}

impl ChapterListPage {
    pub fn into_items(self) -> Vec<ChapterListItem> {
        self.data.unwrap_or_default()
    }
}

#[derive(Deserialize, Debug)]
pub struct ChapterListItem {
    #[serde(default)]
    pub chapter_id: Option<String>,
}

/// `{data: {title}}` of the series detail endpoint.
#[derive(Deserialize, Debug, Default)]
pub struct SeriesDetail {
    #[serde(default)]
    data: Option<SeriesDetailData>,
}

#[derive(Deserialize, Debug)]
struct SeriesDetailData {
    #[serde(default)]
    title: Option<String>,
}

impl SeriesDetail {
    pub fn title(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.title.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

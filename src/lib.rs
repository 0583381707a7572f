pub mod config;
pub mod crawler;
pub mod error;
pub mod gallery;
pub mod logger;
pub mod manifest;
pub mod model;
pub mod series;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::{Config, SiteConfig};
pub use crawler::{ChapterCrawler, Downloader, RunSummary};
pub use error::CrawlError;
pub use model::Source;
pub use series::SeriesLister;
pub use utils::{NamedPicker, SelectionProvider, StdinPicker};

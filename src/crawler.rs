pub mod batch;
pub mod downloader;
pub mod parser;
pub mod task;

pub use batch::{BatchSummary, run_batch};
pub use downloader::Downloader;
pub use parser::Parser;
pub use task::TaskManager;

use std::path::{Path, PathBuf};

use tracing::{error, info, instrument, warn};

use crate::config::SiteConfig;
use crate::error::CrawlError;
use crate::gallery;
use crate::manifest::{SeriesList, select_range};
use crate::model::{ChapterJob, ChapterSource, ImageTask, Source};
use parser::ChapterDetail;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub chapters_processed: usize,
    pub chapters_skipped: usize,
    pub images_succeeded: usize,
    pub images_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterReport {
    Downloaded { index: usize, summary: BatchSummary },
    Skipped { index: usize, reason: String },
}

/// Drives a run: chapters one after another, the images of each chapter concurrently.
pub struct ChapterCrawler {
    source: Source,
    site: SiteConfig,
    downloader: Downloader,
    parser: Parser,
    gallery: bool,
    gallery_template: Option<PathBuf>,
}

impl ChapterCrawler {
    pub fn new(source: Source, site: SiteConfig, downloader: Downloader) -> Result<Self, CrawlError> {
        let parser = Parser::new(&site.image_selector)?;
        Ok(Self {
            source,
            site,
            downloader,
            parser,
            gallery: false,
            gallery_template: None,
        })
    }

    /// Also write a gallery index into every chapter that downloaded at least one page.
    pub fn with_gallery(mut self, template: Option<PathBuf>) -> Self {
        self.gallery = true;
        self.gallery_template = template;
        self
    }

    /// Download chapters `start..=end` of `series` into `<result_root>/<series name>/chapter_<n>/`.
    pub async fn run_series(
        &self,
        series: &SeriesList,
        start: usize,
        end: usize,
        result_root: &Path,
    ) -> Result<RunSummary, CrawlError> {
        self.run(&series.urls, start, end, &result_root.join(&series.name))
            .await
    }

    /// Process the 1-based inclusive range `start..=end` of `urls`.
    ///
    /// An invalid range fails before any request is made. A chapter that cannot be
    /// resolved is logged and skipped; the run carries on with the next one.
    #[instrument(skip(self, urls), fields(source = %self.source, chapters = urls.len()))]
    pub async fn run(
        &self,
        urls: &[String],
        start: usize,
        end: usize,
        series_dir: &Path,
    ) -> Result<RunSummary, CrawlError> {
        let (selected, offset) = select_range(urls, start, end)?;
        info!("Processing {} chapters ({}-{})", selected.len(), start, end);

        let mut summary = RunSummary::default();
        for (i, url) in selected.iter().enumerate() {
            let index = offset + i;
            let job = ChapterJob {
                index,
                source: self.source.chapter_source(url),
                output_dir: series_dir.join(format!("chapter_{}", index)),
            };
            match self.process_chapter(job).await {
                ChapterReport::Downloaded { summary: batch, .. } => {
                    summary.chapters_processed += 1;
                    summary.images_succeeded += batch.succeeded;
                    summary.images_failed += batch.failed;
                }
                ChapterReport::Skipped { .. } => summary.chapters_skipped += 1,
            }
        }

        info!(
            "Run complete: {} chapters downloaded, {} skipped, {} images saved, {} failed",
            summary.chapters_processed,
            summary.chapters_skipped,
            summary.images_succeeded,
            summary.images_failed
        );
        Ok(summary)
    }

    #[instrument(skip_all, fields(chapter = job.index))]
    pub async fn process_chapter(&self, job: ChapterJob) -> ChapterReport {
        info!("[SCRAPING] {}", job.source.id());

        let images = match self.resolve_images(&job.source).await {
            Ok(images) if images.is_empty() => {
                return ChapterReport::Skipped {
                    index: job.index,
                    reason: "no images found".to_owned(),
                };
            }
            Ok(images) => images,
            Err(e) => {
                error!("[ERROR] chapter {} skipped: {}", job.index, e);
                return ChapterReport::Skipped {
                    index: job.index,
                    reason: e.to_string(),
                };
            }
        };

        info!(
            "Found {} images ({} workers)",
            images.len(),
            self.site.concurrency_limit
        );
        let tasks = self.image_tasks(&job, &images);
        let results = run_batch(
            &self.downloader,
            tasks,
            self.site.concurrency_limit,
            self.site.max_retries,
        )
        .await;
        let summary = BatchSummary::from_results(&results);

        info!(
            "[DONE] chapter {}: {} found, {} saved, {} failed -> {}",
            job.index,
            summary.total,
            summary.succeeded,
            summary.failed,
            job.output_dir.display()
        );

        if self.gallery && summary.succeeded > 0 {
            if let Err(e) = gallery::generate_index(&job.output_dir, self.gallery_template.as_deref()).await {
                error!("gallery index for chapter {} failed: {}", job.index, e);
            }
        }

        ChapterReport::Downloaded {
            index: job.index,
            summary,
        }
    }

    /// Ordered image URLs of one chapter. The page or detail document is read once.
    pub async fn resolve_images(&self, source: &ChapterSource) -> Result<Vec<String>, CrawlError> {
        match source {
            ChapterSource::HtmlPage(url) => {
                let html = self.downloader.page(url).await?;
                let images = self.parser.chapter_images(&html, url);
                if images.is_empty() {
                    warn!("[WARNING] no content images on {}", url);
                }
                Ok(images)
            }
            ChapterSource::ApiDetail(uuid) => {
                let url = format!("{}/chapter/detail/{}", self.site.api_base, uuid);
                let detail: ChapterDetail = self.downloader.json(&url).await?;
                let images = detail.image_urls();
                if images.is_empty() {
                    warn!("[WARNING] chapter {} lists no images", uuid);
                }
                Ok(images)
            }
        }
    }

    fn image_tasks(&self, job: &ChapterJob, images: &[String]) -> Vec<ImageTask> {
        images
            .iter()
            .enumerate()
            .map(|(i, url)| {
                let name = self.source.page_file_name(i + 1, images.len());
                ImageTask::new(url.clone(), job.output_dir.join(name))
            })
            .collect()
    }
}

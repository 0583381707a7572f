//! Title listing: turn a series URL into a master chapter list on disk.

use std::path::PathBuf;

use tracing::{error, info, instrument, warn};

use crate::config::SiteConfig;
use crate::crawler::Downloader;
use crate::crawler::parser::{ChapterListItem, ChapterListPage, Parser, SeriesDetail};
use crate::error::CrawlError;
use crate::manifest::{manifest_path, write_manifest};
use crate::model::{Source, last_path_segment};
use crate::utils::sanitize_file_name;

pub struct SeriesLister {
    source: Source,
    site: SiteConfig,
    list_dir: PathBuf,
    downloader: Downloader,
    parser: Parser,
}

impl SeriesLister {
    pub fn new(
        source: Source,
        site: SiteConfig,
        list_dir: PathBuf,
        downloader: Downloader,
    ) -> Result<Self, CrawlError> {
        let parser = Parser::new(&site.image_selector)?;
        Ok(Self {
            source,
            site,
            list_dir,
            downloader,
            parser,
        })
    }

    /// Write `<list_dir>/<series title>.txt` and return its path.
    #[instrument(skip(self), fields(source = %self.source))]
    pub async fn build_manifest(&self, series_url: &str) -> Result<PathBuf, CrawlError> {
        let (title, urls) = match self.source {
            Source::Komiku => self.komiku(series_url).await?,
            Source::Shinigami => self.shinigami(series_url).await?,
        };
        let urls = self.site.order.apply(urls);
        info!("Series '{}': {} chapters", title, urls.len());

        let path = manifest_path(&self.list_dir, &sanitize_file_name(&title));
        write_manifest(&path, &urls).await?;
        Ok(path)
    }

    async fn komiku(&self, series_url: &str) -> Result<(String, Vec<String>), CrawlError> {
        let html = self.downloader.page(series_url).await?;
        let title = self
            .parser
            .page_title(&html)
            .unwrap_or_else(|| "output".to_owned());
        let urls = self.parser.series_chapters(&html, series_url);
        if urls.is_empty() {
            return Err(CrawlError::parse(series_url, "no chapter links on series page"));
        }
        Ok((title, urls))
    }

    async fn shinigami(&self, series_url: &str) -> Result<(String, Vec<String>), CrawlError> {
        let uuid = last_path_segment(series_url);
        let items = self.fetch_all_chapters(uuid).await?;
        let title = self.fetch_title(uuid).await;
        Ok((title, self.chapter_urls(&items)))
    }

    /// Page through the listing until a short page. A failing page ends the listing
    /// with what was collected; failing on the first page is an error.
    async fn fetch_all_chapters(&self, uuid: &str) -> Result<Vec<ChapterListItem>, CrawlError> {
        let page_size = self.site.page_size;
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/chapter/{}/list?page={}&page_size={}&sort_by=chapter_number&sort_order=asc",
                self.site.api_base, uuid, page, page_size
            );
            let listing: ChapterListPage = match self.downloader.json(&url).await {
                Ok(listing) => listing,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    error!("chapter listing stopped at page {}: {}", page, e);
                    break;
                }
            };

            let page_items = listing.into_items();
            let count = page_items.len();
            info!("  - page {} | items: {}", page, count);
            items.extend(page_items);
            if count < page_size {
                break;
            }
            page += 1;
        }

        info!("{} chapters collected", items.len());
        Ok(items)
    }

    async fn fetch_title(&self, uuid: &str) -> String {
        let url = format!("{}/manga/detail/{}", self.site.api_base, uuid);
        match self.downloader.json::<SeriesDetail>(&url).await {
            Ok(detail) => match detail.title() {
                Some(title) => title.to_owned(),
                None => {
                    warn!("series detail has no title, using {}", uuid);
                    uuid.to_owned()
                }
            },
            Err(e) => {
                warn!("could not fetch series title, using {}: {}", uuid, e);
                uuid.to_owned()
            }
        }
    }

    fn chapter_urls(&self, items: &[ChapterListItem]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| item.chapter_id.as_deref())
            .map(|id| format!("{}{}", self.site.view_base, id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::Router;
    use axum::extract::{Path as UrlPath, Query};
    use axum::http::StatusCode;
    use axum::response::{Html, IntoResponse};
    use axum::routing::get;
    use serde_json::json;

    use super::*;
    use crate::manifest::{OrderPolicy, read_manifest};
    use crate::test_support::{downloader, serve};

    fn shinigami_site(base: &str, page_size: usize) -> SiteConfig {
        SiteConfig {
            api_base: base.to_owned(),
            view_base: "https://view.example/chapter/".to_owned(),
            page_size,
            ..SiteConfig::shinigami()
        }
    }

    /// 5 chapters served `page_size` at a time; chapter 3 has no id.
    fn listing_router(title_ok: bool) -> Router {
        Router::new()
            .route(
                "/chapter/:uuid/list",
                get(|UrlPath(uuid): UrlPath<String>, Query(q): Query<HashMap<String, String>>| async move {
                    if uuid != "series-uuid" {
                        return (StatusCode::NOT_FOUND, axum::Json(json!({})));
                    }
                    let page: usize = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                    let size: usize = q.get("page_size").and_then(|p| p.parse().ok()).unwrap_or(24);
                    let data: Vec<_> = (1..=5usize)
                        .skip((page - 1) * size)
                        .take(size)
                        .map(|n| {
                            if n == 3 {
                                json!({"chapter_number": n})
                            } else {
                                json!({"chapter_id": format!("c{}", n), "chapter_number": n})
                            }
                        })
                        .collect();
                    (StatusCode::OK, axum::Json(json!({ "data": data })))
                }),
            )
            .route(
                "/manga/detail/:uuid",
                get(move || async move {
                    if title_ok {
                        axum::Json(json!({"data": {"title": "Solo Leveling: Ragnarok"}})).into_response()
                    } else {
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                }),
            )
    }

    #[tokio::test]
    async fn shinigami_listing_paginates_until_short_page() {
        let base = serve(listing_router(true)).await;
        let tmp = tempfile::tempdir().unwrap();
        for page_size in [2, 5, 24] {
            let lister = SeriesLister::new(
                Source::Shinigami,
                shinigami_site(&base, page_size),
                tmp.path().to_path_buf(),
                downloader(),
            )
            .unwrap();

            let path = lister
                .build_manifest("https://view.example/series/series-uuid/")
                .await
                .unwrap();

            assert_eq!(path, tmp.path().join("Solo_Leveling_Ragnarok.txt"));
            assert_eq!(
                read_manifest(&path).await.unwrap(),
                vec![
                    "https://view.example/chapter/c1",
                    "https://view.example/chapter/c2",
                    "https://view.example/chapter/c4",
                    "https://view.example/chapter/c5",
                ]
            );
        }
    }

    #[tokio::test]
    async fn shinigami_first_page_failure_is_an_error() {
        let base = serve(listing_router(true)).await;
        let tmp = tempfile::tempdir().unwrap();
        let lister = SeriesLister::new(
            Source::Shinigami,
            shinigami_site(&base, 24),
            tmp.path().to_path_buf(),
            downloader(),
        )
        .unwrap();

        let err = lister
            .build_manifest("https://view.example/series/unknown")
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn shinigami_title_falls_back_to_uuid() {
        let base = serve(listing_router(false)).await;
        let tmp = tempfile::tempdir().unwrap();
        let lister = SeriesLister::new(
            Source::Shinigami,
            shinigami_site(&base, 24),
            tmp.path().to_path_buf(),
            downloader(),
        )
        .unwrap();

        let path = lister
            .build_manifest("https://view.example/series/series-uuid")
            .await
            .unwrap();
        assert_eq!(path, tmp.path().join("series-uuid.txt"));
    }

    #[tokio::test]
    async fn komiku_listing_is_reversed_into_reading_order() {
        let router = Router::new().route(
            "/manga/boruto/",
            get(|| async {
                Html(
                    r#"<html><head><title>Komik Boruto</title></head><body><table>
                    <tr><td class="judulseries"><a href="/boruto-chapter-2/">2</a></td></tr>
                    <tr><td class="judulseries"><a href="/boruto-chapter-1/">1</a></td></tr>
                    </table></body></html>"#,
                )
            }),
        );
        let base = serve(router).await;
        let tmp = tempfile::tempdir().unwrap();
        let site = SiteConfig::komiku();
        assert_eq!(site.order, OrderPolicy::Reversed);
        let lister =
            SeriesLister::new(Source::Komiku, site, tmp.path().to_path_buf(), downloader()).unwrap();

        let path = lister
            .build_manifest(&format!("{}/manga/boruto/", base))
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("Komik_Boruto.txt"));
        assert_eq!(
            read_manifest(&path).await.unwrap(),
            vec![
                format!("{}/boruto-chapter-1/", base),
                format!("{}/boruto-chapter-2/", base),
            ]
        );
    }

    #[tokio::test]
    async fn komiku_page_without_chapters_is_rejected() {
        let router = Router::new().route("/empty", get(|| async { Html("<html></html>") }));
        let base = serve(router).await;
        let tmp = tempfile::tempdir().unwrap();
        let lister = SeriesLister::new(
            Source::Komiku,
            SiteConfig::komiku(),
            tmp.path().to_path_buf(),
            downloader(),
        )
        .unwrap();

        let err = lister
            .build_manifest(&format!("{}/empty", base))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Parse { .. }));
        assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
    }
}

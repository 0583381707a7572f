use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::manifest::OrderPolicy;
use crate::model::Source;

pub static DEFAULT_CONFIG_FILE: &str = "chapter-fetch.toml";

static DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
static DEFAULT_IMAGE_SELECTOR: &str = r#"img[itemprop="image"]"#;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
// exponential backoff stops doubling after this many retries
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Run configuration. Everything the crawler needs is passed in from here;
/// no component reads process-wide paths on its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the per-source list and result directories.
    pub base_dir: PathBuf,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    pub gallery_template: Option<PathBuf>,
    komiku: SiteSettings,
    shinigami: SiteSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
            gallery_template: None,
            komiku: SiteSettings::default(),
            shinigami: SiteSettings::default(),
        }
    }
}

impl Config {
    /// Load `path`, or `chapter-fetch.toml` from the working directory when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).format(config::FileFormat::Toml),
            None => config::File::with_name(DEFAULT_CONFIG_FILE)
                .format(config::FileFormat::Toml)
                .required(false),
        };

        config::Config::builder()
            .add_source(file)
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("failed to deserialize configuration: {}", e))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("failed to deserialize configuration: {}", e))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Site settings with this source's defaults filled in.
    pub fn site(&self, source: Source) -> SiteConfig {
        let (settings, defaults) = match source {
            Source::Komiku => (&self.komiku, SiteConfig::komiku()),
            Source::Shinigami => (&self.shinigami, SiteConfig::shinigami()),
        };
        settings.resolve(defaults)
    }

    pub fn list_dir(&self, source: Source) -> PathBuf {
        self.base_dir.join(self.site(source).list_dir)
    }

    pub fn result_dir(&self, source: Source) -> PathBuf {
        self.base_dir.join(self.site(source).result_dir)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Fixed,
    Exponential,
}

/// Wait between failed attempts of one image download.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    pub delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_RETRY_DELAY_MS,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            delay_ms: 0,
            backoff: Backoff::Fixed,
        }
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.delay_ms);
        match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential => {
                let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
                base * (1u32 << shift)
            }
        }
    }
}

/// Per-source keys as written in the file; unset keys fall back to the source defaults.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
struct SiteSettings {
    concurrency_limit: Option<usize>,
    max_retries: Option<u32>,
    list_dir: Option<PathBuf>,
    result_dir: Option<PathBuf>,
    order: Option<OrderPolicy>,
    image_selector: Option<String>,
    api_base: Option<String>,
    view_base: Option<String>,
    page_size: Option<usize>,
}

impl SiteSettings {
    fn resolve(&self, defaults: SiteConfig) -> SiteConfig {
        SiteConfig {
            concurrency_limit: self
                .concurrency_limit
                .unwrap_or(defaults.concurrency_limit)
                .max(1),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries).max(1),
            list_dir: self.list_dir.clone().unwrap_or(defaults.list_dir),
            result_dir: self.result_dir.clone().unwrap_or(defaults.result_dir),
            order: self.order.unwrap_or(defaults.order),
            image_selector: self
                .image_selector
                .clone()
                .unwrap_or(defaults.image_selector),
            api_base: self.api_base.clone().unwrap_or(defaults.api_base),
            view_base: self.view_base.clone().unwrap_or(defaults.view_base),
            page_size: self.page_size.unwrap_or(defaults.page_size).max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub concurrency_limit: usize,
    pub max_retries: u32,
    pub list_dir: PathBuf,
    pub result_dir: PathBuf,
    /// Applied once when the master list is written.
    pub order: OrderPolicy,
    /// CSS selector of the content images on a chapter page.
    pub image_selector: String,
    pub api_base: String,
    /// Prefix of the chapter URLs written to shinigami master lists.
    pub view_base: String,
    pub page_size: usize,
}

impl SiteConfig {
    pub fn komiku() -> Self {
        Self {
            concurrency_limit: 20,
            max_retries: 5,
            list_dir: PathBuf::from("komiku_chapter_list"),
            result_dir: PathBuf::from("komiku_result"),
            order: OrderPolicy::Reversed,
            image_selector: DEFAULT_IMAGE_SELECTOR.to_owned(),
            api_base: String::new(),
            view_base: String::new(),
            page_size: 24,
        }
    }

    pub fn shinigami() -> Self {
        Self {
            concurrency_limit: 12,
            max_retries: 4,
            list_dir: PathBuf::from("shinigami_chapter_list"),
            result_dir: PathBuf::from("shinigami_result"),
            order: OrderPolicy::AsListed,
            image_selector: DEFAULT_IMAGE_SELECTOR.to_owned(),
            api_base: "https://api.shngm.io/v1".to_owned(),
            view_base: "https://08.shinigami.asia/chapter/".to_owned(),
            page_size: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_source_defaults() -> Result<()> {
        let config = Config::from_toml("")?;
        assert_eq!(config.user_agent, "Mozilla/5.0");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.site(Source::Komiku), SiteConfig::komiku());
        assert_eq!(config.site(Source::Shinigami), SiteConfig::shinigami());
        assert_eq!(
            config.list_dir(Source::Komiku),
            PathBuf::from("./komiku_chapter_list")
        );
        Ok(())
    }

    #[test]
    fn partial_site_table_keeps_other_defaults() -> Result<()> {
        let config = Config::from_toml(
            r#"
            base_dir = "data"
            timeout_secs = 30

            [retry]
            delay_ms = 250
            backoff = "exponential"

            [shinigami]
            concurrency_limit = 4
            order = "reversed"
            "#,
        )?;
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.retry.backoff, Backoff::Exponential);

        let site = config.site(Source::Shinigami);
        assert_eq!(site.concurrency_limit, 4);
        assert_eq!(site.order, OrderPolicy::Reversed);
        assert_eq!(site.max_retries, 4);
        assert_eq!(site.api_base, "https://api.shngm.io/v1");
        assert_eq!(
            config.result_dir(Source::Shinigami),
            PathBuf::from("data/shinigami_result")
        );
        Ok(())
    }

    #[test]
    fn zero_limits_are_raised_to_one() -> Result<()> {
        let config = Config::from_toml(
            r#"
            [komiku]
            concurrency_limit = 0
            max_retries = 0
            "#,
        )?;
        let site = config.site(Source::Komiku);
        assert_eq!(site.concurrency_limit, 1);
        assert_eq!(site.max_retries, 1);
        Ok(())
    }

    #[test]
    fn invalid_backoff_is_rejected() {
        assert!(Config::from_toml("[retry]\nbackoff = \"random\"").is_err());
    }

    #[test]
    fn retry_delays() {
        let fixed = RetryPolicy {
            delay_ms: 1000,
            backoff: Backoff::Fixed,
        };
        assert_eq!(fixed.delay_after(1), Duration::from_secs(1));
        assert_eq!(fixed.delay_after(4), Duration::from_secs(1));

        let exp = RetryPolicy {
            delay_ms: 100,
            backoff: Backoff::Exponential,
        };
        assert_eq!(exp.delay_after(1), Duration::from_millis(100));
        assert_eq!(exp.delay_after(2), Duration::from_millis(200));
        assert_eq!(exp.delay_after(4), Duration::from_millis(800));
        assert_eq!(exp.delay_after(50), Duration::from_millis(6400));

        assert_eq!(RetryPolicy::none().delay_after(3), Duration::ZERO);
    }
}

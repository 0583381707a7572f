use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use chapter_fetch::manifest::{SeriesList, list_manifests, manifest_path};
use chapter_fetch::utils::{display_elapsed_time, prompt_line, prompt_number};
use chapter_fetch::{
    ChapterCrawler, Config, CrawlError, Downloader, NamedPicker, SelectionProvider, SeriesLister,
    Source, StdinPicker, gallery, logger,
};

#[derive(Parser)]
#[command(name = "chapter-fetch", version, about = "Download manga chapter images")]
struct Cli {
    /// Configuration file (defaults to ./chapter-fetch.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the chapter list of a series
    List {
        #[arg(value_enum)]
        source: Source,
        /// Series page (komiku) or series URL ending in its UUID (shinigami)
        series_url: Option<String>,
    },
    /// Download a range of chapters from a chapter list
    Download(DownloadArgs),
    /// Write list.json and index.html into a downloaded chapter directory
    Gallery { chapter_dir: PathBuf },
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(value_enum)]
    source: Source,
    /// Chapter list name, with or without `.txt`
    #[arg(long)]
    list: Option<String>,
    /// First chapter, 1-based
    #[arg(long)]
    start: Option<usize>,
    /// Last chapter, inclusive
    #[arg(long)]
    end: Option<usize>,
    /// Parallel image downloads per chapter
    #[arg(long)]
    concurrency: Option<usize>,
    /// Attempts per image
    #[arg(long)]
    retries: Option<u32>,
    /// Also write a gallery index into each chapter
    #[arg(long)]
    gallery: bool,
}

/// Bad or missing interactive input.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct InputError(String);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    let input = err.is::<InputError>()
        || err
            .downcast_ref::<CrawlError>()
            .is_some_and(CrawlError::is_input_error);
    if input { 1 } else { 2 }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::List { source, series_url } => {
            let series_url = match series_url {
                Some(url) => url,
                None => prompt_line("Series URL")?,
            };
            if series_url.is_empty() {
                return Err(InputError("no series URL given".to_owned()).into());
            }
            let lister = SeriesLister::new(
                source,
                config.site(source),
                config.list_dir(source),
                Downloader::from_config(&config)?,
            )?;
            let path = lister.build_manifest(&series_url).await?;
            info!("Chapter list saved to {}", path.display());
        }
        Command::Download(args) => download(&config, args).await?,
        Command::Gallery { chapter_dir } => {
            gallery::generate_index(&chapter_dir, config.gallery_template.as_deref()).await?;
        }
    }
    Ok(())
}

async fn download(config: &Config, args: DownloadArgs) -> Result<()> {
    let source = args.source;
    let list_dir = config.list_dir(source);
    let choices = list_manifests(&list_dir).await?;
    if choices.is_empty() {
        println!(
            "No chapter lists in {}. Run `chapter-fetch list {} <SERIES_URL>` first.",
            list_dir.display(),
            source
        );
        return Ok(());
    }

    let picker: Box<dyn SelectionProvider> = match &args.list {
        Some(name) => Box::new(NamedPicker(name.clone())),
        None => Box::new(StdinPicker),
    };
    let Some(choice) = picker.select(&choices)? else {
        let name = args.list.as_deref().unwrap_or_default();
        return Err(CrawlError::MissingList {
            path: manifest_path(&list_dir, name.trim_end_matches(".txt")),
        }
        .into());
    };
    let list_path = list_dir.join(&choices[choice]);
    info!("Selected {}", list_path.display());
    let series = SeriesList::load(&list_path).await?;
    println!("Chapters available: {}", series.urls.len());

    let start = match args.start {
        Some(n) => n,
        None => ask_number("Start chapter")?,
    };
    let end = match args.end {
        Some(n) => n,
        None => ask_number("End chapter")?,
    };

    let mut site = config.site(source);
    if let Some(limit) = args.concurrency {
        site.concurrency_limit = limit.max(1);
    }
    if let Some(retries) = args.retries {
        site.max_retries = retries.max(1);
    }

    let mut crawler = ChapterCrawler::new(source, site, Downloader::from_config(config)?)?;
    if args.gallery {
        crawler = crawler.with_gallery(config.gallery_template.clone());
    }

    let started = Instant::now();
    crawler
        .run_series(&series, start, end, &config.result_dir(source))
        .await?;
    display_elapsed_time(started.elapsed());
    Ok(())
}

fn ask_number(label: &str) -> Result<usize> {
    prompt_number(label, &mut io::stdin().lock()).map_err(|e| InputError(e.to_string()).into())
}

//! Command-line front end for the overlap scanner
//!
//! `overlap scan essay.txt --config web.json` checks a document against the
//! configured web search provider; `--offline <corpus>` scans against a local
//! corpus instead, after `overlap index <corpus>` has built its index files.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use overlap::dispatch::ProgressFn;
use overlap::offline::read_corpus;
use overlap::{
    CachePolicy, DispatchEvent, Document, IndexOptions, OfflineIndex, ScanApi, ScanConfig,
    ScanReport, Scanner, WeightMethod,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a document and print the report as JSON
    Scan(ScanArgs),
    /// Build offline index files for a corpus directory
    Index(IndexArgs),
    /// Look a term up in a corpus's offline index
    Query(QueryArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Document to scan (UTF-8 text)
    document: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scan against the offline index of this corpus
    #[arg(long)]
    offline: Option<PathBuf>,

    /// Shingle width
    #[arg(short = 'n', long)]
    width: Option<usize>,

    /// Sequences must score strictly above this
    #[arg(long)]
    min_score: Option<f64>,

    /// Rarity weighting method: idf, log, pow or linear
    #[arg(long)]
    method: Option<WeightMethod>,

    /// Report raw candidate sources instead of scored sequences
    #[arg(long)]
    no_scoring: bool,

    /// Ignore quoted, bracketed and reference-section text
    #[arg(long)]
    strip_citations: bool,

    /// Cache policy: off, use, import or export
    #[arg(long)]
    cache: Option<CachePolicy>,

    /// Directory for cached provider payloads
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Concurrency limit
    #[arg(short = 'C', long)]
    concurrency: Option<usize>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// Corpus directory; documents are read from its Sources/ subdirectory
    corpus: PathBuf,

    /// Shingle widths to index
    #[arg(short, long, value_delimiter = ',', default_value = "3")]
    widths: Vec<usize>,

    /// Ignore quoted, bracketed and reference-section text
    #[arg(long)]
    strip_citations: bool,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Corpus directory holding index files
    corpus: PathBuf,

    /// Phrase to look up; shingled with the index width
    term: String,

    /// Shingle width of the index to use
    #[arg(short = 'n', long, default_value_t = 3)]
    width: usize,
}

fn load_config(args: &ScanArgs) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScanConfig::default(),
    };

    if let Some(width) = args.width {
        config.shingle.width = width;
    }
    if args.strip_citations {
        config.shingle.strip_citations = true;
    }
    if let Some(min_score) = args.min_score {
        config.scoring.min_score = min_score;
    }
    if let Some(method) = args.method {
        config.scoring.weighting.method = method;
    }
    if args.no_scoring {
        config.scoring.enabled = false;
    }
    if let Some(policy) = args.cache {
        config.dispatch.cache_policy = policy;
    }
    if let Some(dir) = &args.cache_dir {
        config.dispatch.cache_dir = Some(dir.clone());
    }
    if let Some(concurrency) = args.concurrency {
        config.dispatch.max_concurrency = concurrency;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Progress bar driven by dispatcher events; each round resets it.
fn progress_bar() -> Result<(ProgressBar, ProgressFn)> {
    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
        .progress_chars("#>-"));

    let bar = pb.clone();
    let progress: ProgressFn = Arc::new(move |event: &DispatchEvent| match event {
        DispatchEvent::RoundStarted { round, terms } => {
            bar.set_length(*terms as u64);
            bar.set_position(0);
            if *round == 0 {
                bar.set_message("querying");
            } else {
                bar.set_message(format!("repair round {round}"));
            }
        }
        DispatchEvent::Retried { term, attempt } => {
            bar.set_message(format!("retry {attempt}: {term}"));
        }
        DispatchEvent::Finished { .. } => bar.inc(1),
    });
    Ok((pb, progress))
}

fn write_report(report: &ScanReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

async fn scan(args: ScanArgs) -> Result<()> {
    let config = load_config(&args)?;
    let text = std::fs::read_to_string(&args.document)
        .with_context(|| format!("Failed to read {}", args.document.display()))?;

    let mut scanner = match &args.offline {
        Some(corpus) => Scanner::offline(config, corpus)
            .with_context(|| format!("Failed to open offline index in {}", corpus.display()))?,
        None => Scanner::remote(config).context("Failed to set up search provider")?,
    };

    let bar = if args.quiet || args.offline.is_some() {
        None
    } else {
        let (pb, progress) = progress_bar()?;
        scanner = scanner.with_progress(progress);
        Some(pb)
    };

    let report = scanner.scan(text).await;
    if let Some(pb) = &bar {
        pb.finish_and_clear();
    }
    let report = report.context("Scan failed")?;

    if report.dispatch.failed() > 0 {
        eprintln!(
            "Warning: {} of {} terms could not be resolved",
            report.dispatch.failed(),
            report.dispatch.requested
        );
    }
    eprintln!(
        "Similarity {:.1}% over {} positions, {} fragments",
        report.similarity * 100.0,
        report.positions,
        report.visible_fragments().count()
    );
    write_report(&report, args.output.as_deref())
}

fn index(args: IndexArgs) -> Result<()> {
    if args.widths.iter().any(|&w| w == 0) {
        bail!("Shingle widths must be at least 1");
    }
    let documents = read_corpus(&args.corpus)
        .with_context(|| format!("Failed to read corpus {}", args.corpus.display()))?;
    let name = args
        .corpus
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string());
    let options = IndexOptions {
        strip_citations: args.strip_citations,
    };

    let indexes = OfflineIndex::build_all(&name, &documents, &args.widths, options)
        .context("Failed to build index")?;
    for built in indexes {
        let path = args.corpus.join(OfflineIndex::file_name(built.width()));
        built
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!(
            "Wrote {} ({} documents, {} terms)",
            path.display(),
            built.corpus_size(),
            built.term_count()
        );
    }
    Ok(())
}

fn query(args: QueryArgs) -> Result<()> {
    let index = OfflineIndex::load_for_width(&args.corpus, args.width)
        .with_context(|| format!("Failed to load index from {}", args.corpus.display()))?;
    let phrase = Document::index(args.term.as_str(), args.width)?;
    if phrase.is_empty() {
        bail!("{:?} has fewer than {} words", args.term, args.width);
    }

    for term in phrase.sorted_terms() {
        let sources = index.lookup(term);
        println!("{term}: {} sources", sources.len());
        for source in sources {
            println!("  {source}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match Cli::parse().command {
        Command::Scan(args) => scan(args).await,
        Command::Index(args) => index(args),
        Command::Query(args) => query(args),
    }
}

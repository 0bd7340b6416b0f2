//! Boatrace extract CLI - turn race bulletins into CSV tables

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use boatrace_extract::config::{parse_date, parse_month, DEFAULT_ODDS_DIR, DEFAULT_TABLE_DIR};
use boatrace_extract::source::{archive_url, date_from_member_name, format_date};
use boatrace_extract::store::RACE_TABLE;
use boatrace_extract::{
    build_day, parse_document, ArchiveFetcher, CsvSink, DateRange, DirectorySource, Document,
    DocumentKind, FetchConfig, FetchError, FetchOutcome, Grammar, JsonLinesSink, PipelineConfig,
    RaceStore, RecordKind, RecordSink,
};

#[derive(Parser)]
#[command(name = "boatrace-extract")]
#[command(author, version, about = "Boat race bulletin extraction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, env = "BOATRACE_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single bulletin into one record kind
    Parse {
        /// Bulletin text file (CP932 or UTF-8)
        file: PathBuf,

        /// Record kind: schedule, result, environment or odds
        #[arg(short, long, default_value = "result")]
        kind: RecordKind,

        /// Race day (YYYY-MM-DD); taken from the file name when omitted
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Write CSV here instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print only the first N records
        #[arg(long)]
        preview: Option<usize>,

        /// Print JSON lines instead of CSV
        #[arg(long)]
        json: bool,
    },

    /// Build merged daily tables over a date range
    Build {
        #[command(flatten)]
        range: RangeArgs,

        /// Directory with extracted K/B bulletins
        #[arg(short, long, env = "BOATRACE_INPUT_DIR", default_value = ".")]
        input: PathBuf,

        /// Directory for merged daily tables
        #[arg(long, env = "BOATRACE_TABLE_DIR", default_value = DEFAULT_TABLE_DIR)]
        table_dir: PathBuf,

        /// Directory for daily odds tables
        #[arg(long, env = "BOATRACE_ODDS_DIR", default_value = DEFAULT_ODDS_DIR)]
        odds_dir: PathBuf,

        /// Keep the per-bulletin CSV files
        #[arg(long)]
        keep_intermediate: bool,

        /// Skip the odds table
        #[arg(long)]
        no_odds: bool,

        /// Also store the tables in this SQLite database
        #[arg(long, env = "BOATRACE_DB")]
        db: Option<PathBuf>,

        /// Download missing bulletins into the input directory first
        #[arg(long)]
        fetch: bool,

        /// Delay between archive requests in milliseconds
        #[arg(long, default_value = "3000")]
        delay_ms: u64,
    },

    /// Download and unpack bulletin archives for a date range
    Fetch {
        #[command(flatten)]
        range: RangeArgs,

        /// Directory for archives and extracted bulletins
        #[arg(short, long, env = "BOATRACE_INPUT_DIR", default_value = ".")]
        dest: PathBuf,

        /// Delay between requests in milliseconds
        #[arg(long, default_value = "3000")]
        delay_ms: u64,

        /// Download again even when the archive is present
        #[arg(long)]
        force: bool,
    },

    /// Print bulletin archive URLs for a date range
    Urls {
        #[command(flatten)]
        range: RangeArgs,

        /// Only one bulletin kind (K or B)
        #[arg(long)]
        only: Option<char>,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// Single race day (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, conflicts_with_all = ["from", "month"])]
    date: Option<NaiveDate>,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, requires = "to", conflicts_with = "month")]
    from: Option<NaiveDate>,

    /// Last day of the range (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, requires = "from")]
    to: Option<NaiveDate>,

    /// Whole month (YYYY-MM)
    #[arg(long, value_parser = parse_month)]
    month: Option<DateRange>,
}

impl RangeArgs {
    fn range(&self) -> Result<DateRange> {
        match (self.date, self.from, self.to, self.month) {
            (Some(date), _, _, _) => Ok(DateRange::single(date)),
            (_, Some(from), Some(to), _) => DateRange::new(from, to).map_err(|e| anyhow!(e)),
            (_, _, _, Some(month)) => Ok(month),
            _ => bail!("give one of --date, --from/--to or --month"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Parse {
            file,
            kind,
            date,
            output,
            preview,
            json,
        } => run_parse(&file, kind, date, output.as_deref(), preview, json),
        Commands::Build {
            range,
            input,
            table_dir,
            odds_dir,
            keep_intermediate,
            no_odds,
            db,
            fetch,
            delay_ms,
        } => {
            let range = range.range()?;
            if fetch {
                let fetch_config = FetchConfig {
                    delay_ms,
                    ..Default::default()
                };
                run_fetch(&input, range, fetch_config)?;
            }
            let config = PipelineConfig {
                input_dir: input,
                table_dir,
                odds_dir,
                keep_intermediate,
                with_odds: !no_odds,
            };
            run_build(&config, range, db.as_deref())
        }
        Commands::Fetch {
            range,
            dest,
            delay_ms,
            force,
        } => {
            let config = FetchConfig {
                delay_ms,
                skip_existing: !force,
                ..Default::default()
            };
            run_fetch(&dest, range.range()?, config)
        }
        Commands::Urls { range, only } => run_urls(range.range()?, only),
    }
}

fn run_parse(
    file: &Path,
    kind: RecordKind,
    date: Option<NaiveDate>,
    output: Option<&Path>,
    preview: Option<usize>,
    json: bool,
) -> Result<()> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let date = date
        .or_else(|| date_from_member_name(&name))
        .with_context(|| format!("No race day in {:?}; pass --date", name))?;

    let text = DirectorySource::read_text(file)
        .with_context(|| format!("Failed to read bulletin: {:?}", file))?;
    let doc = Document::from_text(name, format_date(date), kind.document_kind(), &text);

    let grammar = Grammar::new();
    let extraction = parse_document(&grammar, kind, &doc)
        .with_context(|| format!("Failed to parse {:?}", file))?;

    eprintln!(
        "{}: {} {} records from {}",
        "Parsed".green(),
        extraction.records.len(),
        kind,
        doc.name
    );
    for diagnostic in &extraction.diagnostics {
        eprintln!("{} {}", "Undetected".yellow(), diagnostic);
    }

    let limit = preview.unwrap_or(extraction.records.len());
    let records = &extraction.records[..limit.min(extraction.records.len())];

    if let Some(path) = output {
        let mut sink = CsvSink::create(path)
            .with_context(|| format!("Failed to create output file: {:?}", path))?;
        sink.accept(kind, records)
            .with_context(|| format!("Failed to write {:?}", path))?;
        eprintln!("{}: {:?}", "Saved".green(), path);
    } else if json {
        let mut sink = JsonLinesSink::new(BufWriter::new(io::stdout().lock()));
        sink.accept(kind, records)?;
    } else {
        let mut sink = CsvSink::new(BufWriter::new(io::stdout().lock()));
        sink.accept(kind, records)?;
    }

    Ok(())
}

fn run_build(config: &PipelineConfig, range: DateRange, db: Option<&Path>) -> Result<()> {
    println!(
        "{}: {} -> {} ({} to {})",
        "Building".green(),
        config.input_dir.display(),
        config.table_dir.display(),
        range.start,
        range.end
    );

    let grammar = Grammar::new();
    let source = DirectorySource::new(&config.input_dir);
    let mut store = db
        .map(|path| {
            RaceStore::open(path).with_context(|| format!("Failed to open database: {:?}", path))
        })
        .transpose()?;

    let pb = ProgressBar::new(range.num_days() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut built = 0usize;
    let mut failed = 0usize;
    let mut entry_rows = 0usize;

    for date in range.days() {
        pb.set_message(format_date(date));
        match build_day(&grammar, &source, config, date, store.as_mut()) {
            Ok(output) => {
                built += 1;
                entry_rows += output.entry_rows;
            }
            Err(e) => {
                failed += 1;
                pb.println(format!("{} {}: {}", "Warning".yellow(), date, e));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "{}: {} days, {} entry rows, {} skipped",
        "Complete".green(),
        built,
        entry_rows,
        failed
    );
    if let (Some(store), Some(path)) = (&store, db) {
        println!(
            "{}: {:?} ({} race rows)",
            "Stored".green(),
            path,
            store.row_count(RACE_TABLE)?
        );
    }
    Ok(())
}

fn run_fetch(dest: &Path, range: DateRange, config: FetchConfig) -> Result<()> {
    println!(
        "{}: {} to {} into {} (delay {}ms)",
        "Fetching".green(),
        range.start,
        range.end,
        dest.display(),
        config.delay_ms
    );

    // Create runtime for async operations
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    let fetcher = ArchiveFetcher::new(config).context("Failed to create HTTP client")?;

    let pb = ProgressBar::new(range.num_days() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut downloaded = 0usize;
    let mut present = 0usize;
    let mut missing = 0usize;

    for date in range.days() {
        pb.set_message(format_date(date));
        match rt.block_on(fetcher.fetch_day(date, dest)) {
            Ok(outcomes) => {
                for outcome in &outcomes {
                    match outcome {
                        FetchOutcome::Present(_) => present += 1,
                        FetchOutcome::Unpacked(_) | FetchOutcome::Downloaded(_) => {
                            downloaded += 1;
                            pb.println(format!("{} {:?}", "Unpacked".green(), outcome.path()));
                        }
                    }
                }
            }
            Err(FetchError::Status { status: 404, .. }) => {
                missing += 1;
                pb.println(format!("{} {}: no bulletin", "Skipped".yellow(), date));
            }
            Err(e) => {
                missing += 1;
                pb.println(format!("{} {}: {}", "Warning".yellow(), date, e));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "{}: {} unpacked, {} already present, {} days missing",
        "Complete".green(),
        downloaded,
        present,
        missing
    );
    Ok(())
}

fn run_urls(range: DateRange, only: Option<char>) -> Result<()> {
    let kinds: Vec<DocumentKind> = match only.map(|c| c.to_ascii_uppercase()) {
        None => vec![DocumentKind::Result, DocumentKind::Schedule],
        Some('K') => vec![DocumentKind::Result],
        Some('B') => vec![DocumentKind::Schedule],
        Some(other) => bail!("unknown bulletin kind {:?}; use K or B", other),
    };

    for date in range.days() {
        for &kind in &kinds {
            println!("{}", archive_url(date, kind));
        }
    }
    Ok(())
}

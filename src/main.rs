use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use icarus::clean::MarkupCleaner;
use icarus::config::{ExtractOptions, DEFAULT_MIN_SECTION_CHARS, PROGRESS_INTERVAL};
use icarus::output::{CsvWriter, JsonlWriter, RowSink};
use icarus::parser::WikiReader;
use icarus::rules::CleanerRules;
use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "icarus")]
#[command(about = "Turn Wikipedia dumps into cleaned, sectioned plain text")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a dump and write kept pages as JSONL and/or CSV
    Extract(ExtractArgs),
    /// Clean a single wikitext file and print its sections
    Clean(CleanArgs),
}

#[derive(Args)]
struct CleaningArgs {
    /// Keep list and definition lines (markers are still stripped)
    #[arg(long)]
    keep_lists: bool,

    /// Drop sections shorter than this many characters
    #[arg(long, default_value_t = DEFAULT_MIN_SECTION_CHARS)]
    min_section_chars: usize,

    /// JSON file overriding the built-in cleaning patterns
    #[arg(long)]
    rules: Option<PathBuf>,
}

impl CleaningArgs {
    fn load_rules(&self) -> Result<CleanerRules> {
        match &self.rules {
            Some(path) => CleanerRules::from_path(path),
            None => Ok(CleanerRules::default()),
        }
    }
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the Wikipedia dump file (.xml.bz2 or plain .xml)
    #[arg(short, long)]
    input: PathBuf,

    /// Write kept pages as JSON Lines to this path
    #[arg(long)]
    jsonl: Option<PathBuf>,

    /// Write kept pages as CSV to this path
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Stop after reading this many pages
    #[arg(long)]
    max_pages: Option<u64>,

    /// Keep redirect pages instead of skipping them
    #[arg(long)]
    keep_redirects: bool,

    /// Keep pages outside the main namespace
    #[arg(long)]
    include_non_main: bool,

    /// Keep disambiguation pages
    #[arg(long)]
    include_disambiguation: bool,

    #[command(flatten)]
    cleaning: CleaningArgs,
}

#[derive(Args)]
struct CleanArgs {
    /// Path to a file containing raw wikitext
    #[arg(short, long)]
    input: PathBuf,

    #[command(flatten)]
    cleaning: CleaningArgs,
}

fn open_sinks(args: &ExtractArgs) -> Result<Vec<(&Path, Box<dyn RowSink>)>> {
    let mut sinks: Vec<(&Path, Box<dyn RowSink>)> = Vec::new();
    if let Some(path) = &args.jsonl {
        sinks.push((path.as_path(), Box::new(JsonlWriter::create(path)?)));
    }
    if let Some(path) = &args.csv {
        sinks.push((path.as_path(), Box::new(CsvWriter::create(path)?)));
    }
    Ok(sinks)
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let rules = args.cleaning.load_rules()?;
    let options = ExtractOptions {
        max_pages: args.max_pages,
        skip_redirects: !args.keep_redirects,
        include_non_main: args.include_non_main,
        include_disambiguation: args.include_disambiguation,
        drop_lists: !args.cleaning.keep_lists,
        min_section_chars: args.cleaning.min_section_chars,
    };

    let mut sinks = open_sinks(&args)?;
    if sinks.is_empty() {
        warn!("No --jsonl or --csv given, running without writing output");
    }

    let reader = WikiReader::open(&args.input)
        .with_context(|| format!("Failed to open wiki dump at: {}", args.input.display()))?;
    let pb = ProgressBar::new_spinner();
    let spinner = pb.clone();
    let mut extraction = icarus::extract::run(reader, &options, &rules)
        .context("Invalid cleaning rules")?
        .with_progress(PROGRESS_INTERVAL, move |counters| {
            spinner.set_message(format!("{} pages read, {} written", counters.seen, counters.written));
            spinner.tick();
        });

    info!(input = %args.input.display(), "Starting extraction");
    let start = Instant::now();

    for row in extraction.by_ref() {
        let row = row.context("Failed to read wiki dump")?;
        for (path, sink) in sinks.iter_mut() {
            sink.write_row(&row)
                .with_context(|| format!("Failed to write to: {}", path.display()))?;
        }
    }
    pb.finish_and_clear();

    for (path, sink) in sinks.iter_mut() {
        sink.finish()
            .with_context(|| format!("Failed to finish: {}", path.display()))?;
    }

    let elapsed = start.elapsed();
    let counters = extraction.counters();
    let diagnostics = extraction.diagnostics();
    info!(
        duration_secs = elapsed.as_secs_f64(),
        templates_removed = diagnostics.templates_removed,
        malformed_markup = diagnostics.malformed_markup,
        "Extraction complete"
    );

    println!();
    println!("=== Summary ===");
    println!("Pages seen:               {}", counters.seen);
    println!("Pages written:            {}", counters.written);
    println!("Skipped (redirect):       {}", counters.skipped_redirect);
    println!("Skipped (empty):          {}", counters.skipped_empty);
    println!("Skipped (namespace):      {}", counters.skipped_namespace);
    println!("Skipped (disambiguation): {}", counters.skipped_disambiguation);
    println!("Extraction time:          {:.2}s", elapsed.as_secs_f64());
    for (path, _) in &sinks {
        println!("Output:                   {}", path.display());
    }

    if counters.written == 0 {
        warn!(seen = counters.seen, "No pages were written; check the dump and the filters");
        eprintln!("Warning: no pages were written");
    }

    Ok(())
}

fn run_clean(args: CleanArgs) -> Result<()> {
    let rules = args.cleaning.load_rules()?;
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read wikitext file: {}", args.input.display()))?;

    let cleaner = MarkupCleaner::new(&rules).context("Invalid cleaning rules")?;
    let (page, report) =
        cleaner.clean_with_report(&raw, !args.cleaning.keep_lists, args.cleaning.min_section_chars);

    for outcome in report.malformed_nodes() {
        warn!(?outcome, "Malformed markup");
    }

    for (i, section) in page.section_texts.iter().enumerate() {
        println!("--- section {} ({} chars) ---", i, section.chars().count());
        println!("{}", section);
    }
    if page.is_blank() {
        println!("(no text left after cleaning)");
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Clean(args) => run_clean(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use twiki2mw::checkout::{LegacyEncoding, RcsCheckout};
use twiki2mw::export::{run_export, ExportOptions};
use twiki2mw::stats::MigrationStats;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "twiki2mw")]
#[command(version)]
#[command(about = "Migrate a TWiki data web and its history to MediaWiki XML")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a TWiki data web and its RCS history into JSON
    Extract(ExtractArgs),
    /// Convert extracted JSON into a MediaWiki XML export
    Export(ExportArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the TWiki data web directory (e.g. data/Main)
    #[arg(short, long)]
    input: PathBuf,

    /// Output JSON file (standard output if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Byte encoding of the topic and history files
    #[arg(long, value_enum, default_value_t = LegacyEncoding::Latin1)]
    encoding: LegacyEncoding,

    /// RCS checkout program
    #[arg(long, default_value = twiki2mw::config::DEFAULT_CHECKOUT_PROGRAM)]
    co_program: PathBuf,
}

#[derive(Args)]
struct ExportArgs {
    /// Extracted JSON file
    #[arg(short, long)]
    input: PathBuf,

    /// Output XML file (standard output if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Site name for the siteinfo block (required)
    #[arg(long)]
    site_name: Option<String>,

    /// Database name for the siteinfo block (required)
    #[arg(long)]
    db_name: Option<String>,

    /// Base page URL for the siteinfo block (required)
    #[arg(long)]
    base_url: Option<String>,

    /// CSV table of oldTitle,newTitle page name replacements
    #[arg(long)]
    page_names: Option<PathBuf>,

    /// Namespace number the pages are exported into
    #[arg(long, default_value_t = twiki2mw::config::DEFAULT_NAMESPACE)]
    namespace: i32,

    /// Contributor credited with renames done by the migration
    #[arg(long, default_value = twiki2mw::config::DEFAULT_MIGRATION_USER)]
    migration_user: String,

    /// Timestamp of migration renames, RFC 3339 (defaults to now)
    #[arg(long)]
    migration_timestamp: Option<String>,

    /// Topic whose children stay top-level pages
    #[arg(long, default_value = twiki2mw::config::DEFAULT_HOME_TOPIC)]
    home_topic: String,

    /// Convert TWiki markup to wikitext
    #[arg(long)]
    format_markup: bool,
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let stats = MigrationStats::new();
    let checkout = RcsCheckout::new(&args.co_program, args.encoding);

    info!(input = ?args.input, "Starting extraction pass");
    let start = Instant::now();
    let pages = twiki2mw::extract::run_extraction(&args.input, &checkout, args.encoding, &stats)?;
    let duration = start.elapsed();
    info!(duration_secs = duration.as_secs_f64(), "Extraction complete");

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            twiki2mw::extract::write_pages(file, &pages)?;
        }
        None => twiki2mw::extract::write_pages(io::stdout().lock(), &pages)?,
    }

    eprintln!();
    eprintln!("=== Summary ===");
    eprintln!("Extraction time:     {:.2}s", duration.as_secs_f64());
    eprintln!("Pages extracted:     {}", stats.extracted_pages());
    eprintln!("Revisions extracted: {}", stats.extracted_revisions());
    eprintln!("Anomalies:           {}", stats.anomaly_count());

    Ok(())
}

fn run_export_command(args: ExportArgs) -> Result<()> {
    let migration_timestamp = args
        .migration_timestamp
        .as_deref()
        .map(|ts| {
            DateTime::parse_from_rfc3339(ts)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid migration timestamp: {}", ts))
        })
        .transpose()?;

    let options = ExportOptions {
        input: args.input,
        output: args.output,
        site_name: args.site_name,
        db_name: args.db_name,
        base_url: args.base_url,
        page_names: args.page_names,
        namespace: args.namespace,
        migration_user: args.migration_user,
        migration_timestamp,
        home_topic: args.home_topic,
        format_markup: args.format_markup,
    };

    let stats = MigrationStats::new();
    info!(input = ?options.input, "Starting export pass");
    let start = Instant::now();
    run_export(&options, &stats)?;
    let duration = start.elapsed();
    info!(duration_secs = duration.as_secs_f64(), "Export complete");

    eprintln!();
    eprintln!("=== Summary ===");
    eprintln!("Export time:         {:.2}s", duration.as_secs_f64());
    eprintln!("Pages exported:      {}", stats.exported_pages());
    eprintln!("Revisions exported:  {}", stats.exported_revisions());
    eprintln!("Moves replayed:      {}", stats.moves());
    eprintln!("Moves skipped:       {}", stats.skipped_moves());
    eprintln!("Redirect pages:      {}", stats.redirects());
    eprintln!("Anomalies:           {}", stats.anomaly_count());

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
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Export(args) => run_export_command(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

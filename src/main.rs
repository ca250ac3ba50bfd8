use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use roadnet::discover::discover;
use roadnet::load::{load_folder, DiagnosticCategory, FileStatus, LoadOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "roadnet")]
#[command(about = "Discover scenario configuration folders and import their road networks")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List classified files with their parser, version and data kinds
    Scan(ScanArgs),
    /// Import a folder into the road graph and report diagnostics
    Load(LoadArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Scenario configuration folder
    dir: PathBuf,
}

#[derive(Args)]
struct LoadArgs {
    /// Scenario configuration folder
    dir: PathBuf,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let found = discover(&args.dir)
        .with_context(|| format!("Failed to scan {}", args.dir.display()))?;

    for file in &found {
        match &file.handler {
            Ok(handler) => {
                let version = handler
                    .declared_version()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| "-".to_string());
                println!(
                    "{:<18} {:<8} {:<8} {} {:?}",
                    file.tag.as_str(),
                    handler.parser_name(),
                    version,
                    file.path.display(),
                    handler.extracted_kinds()
                );
            }
            Err(e) => println!(
                "{:<18} {:<8} {:<8} {} ({e})",
                file.tag.as_str(),
                "-",
                "error",
                file.path.display()
            ),
        }
    }
    println!();
    println!("{} matches", found.len());
    Ok(())
}

fn run_load(args: LoadArgs) -> Result<()> {
    let options = LoadOptions {
        threads: args.threads,
    };

    info!(dir = %args.dir.display(), threads = ?options.threads, "Starting import");
    let start = Instant::now();
    let report = load_folder(&args.dir, &options)
        .with_context(|| format!("Failed to import {}", args.dir.display()))?;
    let duration = start.elapsed();

    if args.json {
        let json = serde_json::to_string_pretty(&report.summary())
            .context("Failed to serialize report")?;
        println!("{json}");
        return Ok(());
    }

    for diagnostic in &report.diagnostics {
        println!("{diagnostic}");
    }

    let count = |status: FileStatus| report.files.iter().filter(|f| f.status == status).count();
    let stats = &report.stats;
    println!();
    println!("=== Summary ===");
    println!("Import time:        {:.2}s", duration.as_secs_f64());
    println!();
    println!("Files matched:      {}", stats.files_discovered);
    println!("Files loaded:       {}", count(FileStatus::Loaded));
    println!("Files excluded:     {}", count(FileStatus::Excluded));
    println!("Files failed:       {}", count(FileStatus::Failed));
    println!("Roads:              {}", report.store.road_count());
    println!("Junctions:          {}", report.store.junction_count());
    println!("Duplicates:         {}", stats.duplicates);
    println!("Links resolved:     {}", stats.links_resolved);
    println!("Dangling refs:      {}", stats.dangling_references);
    println!("Coverage issues:    {}", stats.coverage_issues);
    println!(
        "Schema issues:      {}",
        report.diagnostics_in(DiagnosticCategory::Schema).count()
    );
    println!(
        "Roles:              {}",
        report
            .roles
            .keys()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

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
        eprintln!("Failed to set tracing subscriber: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Load(args) => run_load(args),
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

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use kbmigrate_core::archive::{ArchiveReport, archive_output};
use kbmigrate_core::config::{MigrationConfig, load_config};
use kbmigrate_core::fetch::HttpFetcher;
use kbmigrate_core::migrate::{MigrateOptions, MigrateReport, run_migration};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "kbmigrate",
    version,
    about = "Convert a knowledge-base article export into self-contained HTML plus a re-import archive"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "TOML config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Emit reports as JSON")]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Convert the article export and package the result")]
    Migrate(MigrateArgs),
    #[command(about = "Repackage an existing output directory")]
    Archive(ArchiveArgs),
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[arg(long, value_name = "PATH", help = "Input CSV export")]
    input: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Directory to write converted articles into")]
    output_dir: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Archive file to write")]
    archive: Option<PathBuf>,
    #[arg(long, help = "Skip writing the archive")]
    no_archive: bool,
}

#[derive(Debug, Args)]
struct ArchiveArgs {
    #[arg(long, value_name = "PATH", help = "Directory to package")]
    output_dir: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Archive file to write")]
    archive: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("kbmigrate.toml"));
    let config = load_config(&config_path)?;

    match cli.command {
        Some(Commands::Migrate(args)) => run_migrate(&config, args, cli.json),
        Some(Commands::Archive(args)) => run_archive(&config, args, cli.json),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_migrate(config: &MigrationConfig, args: MigrateArgs, json: bool) -> Result<()> {
    let options = MigrateOptions {
        input_csv: args.input.unwrap_or_else(|| config.input_csv()),
        output_dir: args.output_dir.unwrap_or_else(|| config.output_dir()),
    };
    let fetcher = HttpFetcher::new(config)?;
    let report = run_migration(&options, &fetcher)?;

    let archive = if args.no_archive {
        None
    } else {
        let archive_path = args.archive.unwrap_or_else(|| config.archive_path());
        Some(archive_output(&options.output_dir, &archive_path)?)
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "migrate": report,
                "archive": archive,
            }))?
        );
        return Ok(());
    }

    println!("migrate report");
    println!("input: {}", normalize_path(&options.input_csv));
    println!("output_dir: {}", normalize_path(&options.output_dir));
    print_migrate_report(&report);
    if let Some(archive) = archive {
        print_archive_report(&archive);
    }
    Ok(())
}

fn run_archive(config: &MigrationConfig, args: ArchiveArgs, json: bool) -> Result<()> {
    let output_dir = args.output_dir.unwrap_or_else(|| config.output_dir());
    let archive_path = args.archive.unwrap_or_else(|| config.archive_path());
    let report = archive_output(&output_dir, &archive_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("archive report");
    println!("output_dir: {}", normalize_path(&output_dir));
    print_archive_report(&report);
    Ok(())
}

fn print_migrate_report(report: &MigrateReport) {
    println!("articles.total: {}", report.articles_total);
    println!("articles.written: {}", report.articles_written);
    println!("articles.skipped: {}", report.articles_skipped);
    println!("assets.localized: {}", report.assets_localized);
    println!("assets.left_remote: {}", report.assets_left_remote);
    if report.duplicate_directories.is_empty() {
        println!("duplicates: <none>");
    } else {
        for directory in &report.duplicate_directories {
            println!("duplicates.directory: {directory}");
        }
    }
    println!("manifest: {}", normalize_path(&report.manifest_path));
}

fn print_archive_report(report: &ArchiveReport) {
    println!("archive.files: {}", report.files_archived);
    println!("archive.path: {}", normalize_path(&report.archive_path));
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kbmigrate_core=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

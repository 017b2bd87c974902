use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::error;

use modsync_lib::core::mods::{ConfigStore, MultiSourceOrchestrator, Sinks, SourceKind, TracingSink};
use modsync_lib::{SyncResult, SyncSummary};

#[derive(Debug, Parser)]
#[command(name = "modsync", version, about = "Keep a Minecraft mods directory in sync with its configured sources", long_about = None)]
struct Cli {
    /// Path to mods-config.json (defaults to the per-user data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download, replace and clean up mods for one game version
    Sync(TargetArgs),
    /// Report installed and missing mods without downloading
    Scan(TargetArgs),
    /// List configured game versions and entries
    #[command(alias = "ls")]
    List,
}

#[derive(Debug, Args)]
struct TargetArgs {
    #[arg(long, short = 'g')]
    game_version: String,

    #[arg(long, short = 'd')]
    mods_dir: PathBuf,

    /// Restrict to these sources: curseforge, github, modrinth
    #[arg(long = "source")]
    sources: Vec<SourceKind>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl TargetArgs {
    fn selected_sources(&self) -> Vec<SourceKind> {
        if self.sources.is_empty() {
            SourceKind::ORDER.to_vec()
        } else {
            self.sources.clone()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    modsync_lib::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> SyncResult<ExitCode> {
    let path = cli.config.unwrap_or_else(ConfigStore::default_path);
    let store = Arc::new(ConfigStore::load(&path).await?);
    let sink = TracingSink;

    match cli.command {
        Command::Sync(target) => {
            let orchestrator =
                MultiSourceOrchestrator::for_sources(store, &target.selected_sources()).await?;
            let summary = orchestrator
                .run(
                    &target.game_version,
                    &target.mods_dir,
                    Sinks::new(&sink).with_progress(&sink),
                )
                .await;

            if target.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }

            Ok(if summary.all_succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Scan(target) => {
            let orchestrator =
                MultiSourceOrchestrator::for_sources(store, &target.selected_sources()).await?;

            for catalog in orchestrator.catalogs() {
                let report = catalog
                    .scan(&target.game_version, &target.mods_dir, &sink)
                    .await;
                if target.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    continue;
                }

                println!("{}:", catalog.kind());
                for scanned in &report.entries {
                    let status = if scanned.report.is_current() {
                        "installed"
                    } else {
                        "missing"
                    };
                    println!("  {:<10} {}", status, scanned.entry.name);
                    for copy in &scanned.report.stale_copies {
                        println!("  {:<10} {}", "stale", copy);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::List => {
            let config = store.snapshot().await;
            for (game_version, mods) in &config.versions {
                println!("{game_version}");
                for source in SourceKind::ORDER {
                    for entry in mods.entries(source) {
                        let pinned = entry.file_name.as_deref().unwrap_or("-");
                        println!(
                            "  {:<10} {:<24} {:<20} {}",
                            source.label(),
                            entry.name,
                            entry.id,
                            pinned
                        );
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_summary(summary: &SyncSummary) {
    println!("Minecraft {}", summary.game_version);
    for report in &summary.sources {
        let r = &report.result;
        println!(
            "  {:<10} installed {:>3}  downloaded {:>3}  skipped {:>3}  failed {:>3}  cleaned {:>3}  redownloaded {:>3}",
            report.source.label(),
            r.installed_count,
            r.downloaded_count,
            r.skipped_count,
            r.failed_count,
            r.cleaned_count,
            r.redownloaded_count
        );
        if let Some(error) = &r.error {
            println!("             error: {error}");
        }
    }
}

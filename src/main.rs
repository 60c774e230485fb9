//! curator - semi-interactive maintenance for large file hierarchies.
//!
//! Usage:
//!   curator run <config.json>          Analyze, confirm and execute
//!   curator run --yes <config.json>    Same, without prompting
//!   curator plan <config.json>         Analyze and print the plan only
//!   curator scan <config.json>         Scan summary per root
//!   curator --help                     Show help

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use curator_analyze::{
    cleanup, duplicates, orphans, ownership, permissions, reorganize, AccountDb, CleanupPhase,
};
use curator_core::{Action, Config, Operation, Plan, PlanArbiter, RootConfig};
use curator_ops::{AssumeYes, ExecutionSummary, PlanExecutor, StdinConfirmer};
use curator_scan::Scanner;

#[derive(Parser)]
#[command(
    name = "curator",
    version,
    about = "Maintenance for large photo and media archives",
    long_about = "curator scans configured roots for duplicates, orphans, \
                  misplaced and mis-permissioned files, stages a plan of \
                  corrective moves, and executes it after confirmation. \
                  Nothing is ever deleted: every removal is a move into the \
                  configured recycle directory."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze every configured root, confirm, and execute the plan
    Run {
        /// Path to the JSON config file
        config: PathBuf,

        /// Answer yes-to-all instead of prompting
        #[arg(short, long)]
        yes: bool,

        /// Analyze and print the plan, execute nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Analyze and print the plan without executing anything
    Plan {
        /// Path to the JSON config file
        config: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan only: counters and sizes per root
    Scan {
        /// Path to the JSON config file
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Execute { yes: bool },
    DryRun { json: bool },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            yes,
            dry_run,
        } => {
            let mode = if dry_run {
                Mode::DryRun { json: false }
            } else {
                Mode::Execute { yes }
            };
            run_all(&config, mode)
        }
        Command::Plan { config, json } => run_all(&config, Mode::DryRun { json }),
        Command::Scan { config } => scan_all(&config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run the full pipeline for every root. Roots are independent: one
/// failing is reported and the rest still run.
fn run_all(config_path: &Path, mode: Mode) -> Result<()> {
    let config = Config::load(config_path)?;
    let mut failed = 0usize;

    for root in &config.roots {
        info!(root = %root.scan_path.display(), "processing root");
        if let Err(err) = run_root(root, mode) {
            error!(root = %root.scan_path.display(), error = %err, "root failed");
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(eyre!("{failed} root(s) failed"));
    }
    Ok(())
}

/// scan -> analyze -> arbitrate -> confirm/execute -> rescan -> post-cleanup.
fn run_root(root: &RootConfig, mode: Mode) -> Result<()> {
    let scanner = Scanner::new();
    let model = scanner.scan(root)?;
    info!(
        files = model.counters.files_scanned,
        dirs = model.counters.dirs_scanned,
        bytes = model.counters.total_bytes,
        warnings = model.warnings.len(),
        "scan finished"
    );

    let plan = build_plan(&model, root)?;

    match mode {
        Mode::DryRun { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(root, &plan);
            }
            Ok(())
        }
        Mode::Execute { yes } => {
            print_plan(root, &plan);
            if plan.is_empty() {
                println!("Nothing to do for {}", root.scan_path.display());
                return Ok(());
            }

            let summary = execute_plan(&plan, yes);
            print_summary(&summary);

            // Executed moves change the tree; post-cleanup needs a fresh
            // scan to see what they emptied out.
            if root.has_action(Action::PostCleanup) && !summary.cancelled {
                let fresh = scanner.scan(root)?;
                let report = cleanup::analyze(&fresh, root, CleanupPhase::Post);
                if !report.is_empty() {
                    let mut arbiter = PlanArbiter::new();
                    arbiter.claim_destructive(report.into_operations());
                    let post_plan = arbiter.into_plan();
                    print_plan(root, &post_plan);
                    let post_summary = execute_plan(&post_plan, yes);
                    print_summary(&post_summary);
                }
            }
            Ok(())
        }
    }
}

/// Feed enabled analyzers through the arbiter in precedence order.
fn build_plan(model: &curator_core::ScanModel, root: &RootConfig) -> Result<Plan> {
    let mut arbiter = PlanArbiter::new();

    if root.has_action(Action::PreCleanup) {
        let report = cleanup::analyze(model, root, CleanupPhase::Pre);
        info!(
            dirs = report.directories.len(),
            files = report.files.len(),
            bytes = report.bytes,
            "pre-cleanup candidates"
        );
        arbiter.claim_destructive(report.into_operations());
    }

    if root.has_action(Action::Duplicates) {
        let report = duplicates::analyze(model, root);
        info!(
            operations = report.operations.len(),
            dir_groups = report.dir_groups,
            file_groups = report.file_groups,
            unhashable = report.unhashable,
            "duplicate candidates"
        );
        arbiter.claim_destructive(report.operations);
    }

    if root.has_action(Action::Orphans) {
        arbiter.claim_destructive(orphans::analyze(model, root));
    }

    if root.has_action(Action::Reorganize) {
        arbiter.add_cosmetic(reorganize::analyze(model, root));
    }

    if root.has_action(Action::Permissions) {
        arbiter.add_cosmetic(permissions::analyze(model, root)?);
    }

    if root.has_action(Action::Ownership) {
        arbiter.add_cosmetic(ownership::analyze(model, root, &AccountDb::default())?);
    }

    Ok(arbiter.into_plan())
}

fn execute_plan(plan: &Plan, yes: bool) -> ExecutionSummary {
    if yes {
        PlanExecutor::new(AssumeYes).execute(plan)
    } else {
        PlanExecutor::new(StdinConfirmer).execute(plan)
    }
}

fn print_plan(root: &RootConfig, plan: &Plan) {
    println!();
    println!("Plan for {}", root.scan_path.display());
    if plan.is_empty() {
        println!("  (empty)");
        return;
    }
    for kind in plan.kinds() {
        let ops = plan.ops_for(kind);
        let bytes: u64 = ops
            .iter()
            .map(|op| match op {
                Operation::PreCleanup { bytes, .. } | Operation::PostCleanup { bytes, .. } => {
                    *bytes
                }
                _ => 0,
            })
            .sum();
        if bytes > 0 {
            println!(
                "  {kind}: {} operation(s), {} reclaimable",
                ops.len(),
                format_size(bytes)
            );
        } else {
            println!("  {kind}: {} operation(s)", ops.len());
        }
    }
}

fn print_summary(summary: &ExecutionSummary) {
    for (kind, outcome) in &summary.classes {
        println!(
            "  {kind}: {} applied, {} skipped, {} failed",
            outcome.applied, outcome.skipped, outcome.failed
        );
    }
    if summary.total_bytes() > 0 {
        println!("  reclaimed {}", format_size(summary.total_bytes()));
    }
    for err in &summary.errors {
        println!("  failed: {err}");
    }
    if summary.cancelled {
        println!("  cancelled by operator");
    }
}

/// Scan-only summary for every root.
fn scan_all(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;

    for root in &config.roots {
        let scanner = Scanner::new();
        let model = scanner.scan(root)?;
        println!();
        println!("{}", root.scan_path.display());
        println!(
            "  {} files ({} ignored), {} directories, {}",
            model.counters.files_scanned,
            model.counters.files_ignored,
            model.counters.dirs_scanned,
            format_size(model.counters.total_bytes)
        );
        if !model.warnings.is_empty() {
            println!("  {} warning(s) during scan", model.warnings.len());
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

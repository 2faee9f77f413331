use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::core::bundle::{apply_overrides, Bundle};
use crate::core::catalog::DEFAULT_CATALOG_URL;
use crate::core::diff::{DiffEngine, ModInfo};
use crate::core::error::{PackError, PackResult};
use crate::core::meta::{MetaRecord, RecordChanges};
use crate::core::reconcile::{ImportReport, InstallationReconciler, SideSource, StopReason};
use crate::core::state::{AppState, Settings};
use crate::core::validate::{validate_pack, Severity};

#[derive(Debug, Parser)]
#[command(
    name = "packsmith",
    version,
    about = "Keep a modpack's metadata index in sync with its files and the Modrinth catalog"
)]
pub struct Cli {
    /// The pack file; its directory is the pack root
    #[arg(long, global = true, env = "PACKSMITH_PACK_FILE", default_value = "pack.toml")]
    pub pack_file: PathBuf,

    /// Write new metadata records to this folder instead of one derived from the project type
    #[arg(long, global = true)]
    pub meta_folder: Option<String>,

    /// Folder that derived metadata folders are created under
    #[arg(long, global = true, default_value = ".")]
    pub meta_folder_base: String,

    /// Base URL of the catalog API
    #[arg(long, global = true, env = "PACKSMITH_CATALOG_URL", default_value = DEFAULT_CATALOG_URL)]
    pub catalog_url: String,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install every artifact of a bundle (.mrpack) into the pack
    Import {
        bundle: PathBuf,
        /// Take sides from the bundle's env blocks; artifacts supported on neither side are skipped
        #[arg(long)]
        side_from_manifest: bool,
    },
    /// Compare the pack's catalog artifacts with a bundle (.mrpack)
    Diff { bundle: PathBuf },
    /// Change settings of an existing metadata record
    Modify {
        /// Record file stem (e.g. `sodium`) or pack-relative path
        name: String,
        /// client, server or both
        #[arg(long)]
        side: Option<String>,
        #[arg(long)]
        pin: Option<bool>,
        /// Comma separated: macos, linux, windows. Empty clears the list
        #[arg(long, value_delimiter = ',')]
        disabled_client_platforms: Option<Vec<String>>,
        #[arg(long)]
        optional: Option<bool>,
        #[arg(long)]
        optional_description: Option<String>,
        #[arg(long)]
        optional_default: Option<bool>,
    },
    /// Check the pack, its index and its metadata records
    Validate,
    /// Rebuild the index from the files on disk
    Refresh,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings {
            pack_file: self.pack_file.clone(),
            meta_folder: self.meta_folder.clone(),
            meta_folder_base: self.meta_folder_base.clone(),
            catalog_url: self.catalog_url.clone(),
            verbose: self.verbose,
        }
    }
}

pub async fn dispatch(cli: Cli) -> ExitCode {
    let state = match AppState::new(cli.settings()) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Import {
            bundle,
            side_from_manifest,
        } => import(&state, &bundle, side_from_manifest).await,
        Command::Diff { bundle } => diff(&state, &bundle).await,
        Command::Modify {
            name,
            side,
            pin,
            disabled_client_platforms,
            optional,
            optional_description,
            optional_default,
        } => modify(
            &state,
            &name,
            RecordChanges {
                side,
                pin,
                disabled_client_platforms,
                optional,
                optional_description,
                optional_default,
            },
        ),
        Command::Validate => validate(&state),
        Command::Refresh => refresh(&state),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

// ── Import ──────────────────────────────────────────

async fn import(state: &AppState, bundle_path: &Path, side_from_manifest: bool) -> PackResult<ExitCode> {
    let mut pack = state.load_pack()?;
    let mut index = state.load_index(&pack)?;
    let bundle = Bundle::open(bundle_path)?;

    println!("Importing modpack: {}", bundle.manifest.name);
    if let Some(summary) = bundle.manifest.summary.as_deref().filter(|s| !s.is_empty()) {
        println!("Description: {summary}");
    }

    let side_source = if side_from_manifest {
        SideSource::Manifest
    } else {
        SideSource::Project
    };
    let catalog = state.catalog();
    let outcome = {
        let mut reconciler = InstallationReconciler::new(
            &catalog,
            &mut pack,
            &mut index,
            state.install_settings(side_source),
        );
        reconciler.import(&bundle.manifest, shutdown_signal()).await?
    };

    match &outcome.stop {
        StopReason::Completed => {}
        StopReason::Interrupted => {
            println!("Import interrupted. Progress saved: {}", outcome.report);
            return Ok(ExitCode::SUCCESS);
        }
        StopReason::Fault(reason) => {
            println!("Import partially completed: {}", outcome.report);
            eprintln!("Error: {reason}");
            return Ok(ExitCode::FAILURE);
        }
    }

    print_import_summary(&outcome.report);

    if let Err(err) = apply_overrides(&bundle, &mut index) {
        warn!("Failed to copy overrides: {}", err);
    }
    index.write()?;
    pack.update_index_hash(state.hashes.as_ref())?;
    pack.write()?;

    println!("Import completed!");
    let failed = outcome.report.failed();
    if failed > 0 {
        println!("{failed} artifacts failed to install. You may need to install them manually.");
    }
    Ok(ExitCode::SUCCESS)
}

fn print_import_summary(report: &ImportReport) {
    println!("Import summary: {report}");
    if report.unmatched > 0 {
        println!(
            "{} bundle files are not known to the catalog and were left out",
            report.unmatched
        );
    }
    for failure in &report.failures {
        println!("  ! {}: {}", failure.path, failure.reason);
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Cannot listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, saving progress"),
        _ = terminate => info!("Received SIGTERM, saving progress"),
    }
}

// ── Diff ────────────────────────────────────────────

async fn diff(state: &AppState, bundle_path: &Path) -> PackResult<ExitCode> {
    let pack = state.load_pack()?;
    let index = state.load_index(&pack)?;
    let bundle = Bundle::open(bundle_path)?;

    println!(
        "Comparing pack '{}' with bundle: {}\n",
        pack.name,
        bundle_path.display()
    );
    println!("Bundle: {}", bundle.manifest.name);
    if let Some(summary) = bundle.manifest.summary.as_deref().filter(|s| !s.is_empty()) {
        println!("Description: {summary}");
    }
    println!();

    let catalog = state.catalog();
    let report = DiffEngine::new(&catalog)
        .diff(&index, &bundle.manifest)
        .await?;

    print_mods("Missing from current pack", '+', &report.missing);
    print_mods("Extra in current pack", '-', &report.extra);
    print_mods("Version differences", '~', &report.changed);
    if report.total_differences() == 0 {
        println!("No differences found!");
    }

    let sources = &report.local_sources;
    println!("\n=== Summary ===");
    println!("Current pack mods by source:");
    println!("- Modrinth: {}", sources.catalog);
    if sources.curseforge > 0 {
        println!("- CurseForge: {}", sources.curseforge);
    }
    if sources.url > 0 {
        println!("- Direct URLs: {}", sources.url);
    }
    if sources.other > 0 {
        println!("- Other sources: {}", sources.other);
    }
    println!("Total: {} mods\n", sources.total());
    println!("Bundle: {} mods (Modrinth only)\n", report.remote_count);
    println!("Modrinth mod comparison:");
    println!("- Missing from current pack: {}", report.missing.len());
    println!("- Extra in current pack: {}", report.extra.len());
    println!("- Version differences: {}", report.changed.len());
    println!("- Total differences: {}", report.total_differences());
    if !report.unreadable.is_empty() {
        println!("- Unreadable records skipped: {}", report.unreadable.len());
    }
    if sources.not_compared() > 0 {
        println!(
            "\nNote: {} non-Modrinth mods in your pack are not compared",
            sources.not_compared()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn print_mods(title: &str, marker: char, mods: &[ModInfo]) {
    if mods.is_empty() {
        return;
    }
    println!("- {title} ({}):", mods.len());
    for info in mods {
        let detail = if marker == '~' {
            &info.version_id
        } else {
            &info.project_id
        };
        println!("  {marker} {} [{detail}] (side: {})", info.name, info.side);
    }
    println!();
}

// ── Modify ──────────────────────────────────────────

fn modify(state: &AppState, name: &str, changes: RecordChanges) -> PackResult<ExitCode> {
    if changes.is_empty() {
        println!("No changes specified. Use --help to see the available options.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut pack = state.load_pack()?;
    let mut index = state.load_index(&pack)?;
    let rel = index
        .find_meta(name)
        .ok_or_else(|| PackError::ModNotFound(name.to_string()))?;
    let mut record = MetaRecord::load(&index.resolve_path(&rel))?;

    let log = changes.apply(&mut record)?;
    for line in &log {
        println!("{line}");
    }

    let (format, hash) = record.write(state.hashes.as_ref())?;
    index.refresh_entry(&rel, format, &hash, true);
    index.write()?;
    pack.update_index_hash(state.hashes.as_ref())?;
    pack.write()?;

    info!("Rewrote {}", rel);
    println!("Successfully modified {}", record.name);
    Ok(ExitCode::SUCCESS)
}

// ── Validate / Refresh ──────────────────────────────

fn validate(state: &AppState) -> PackResult<ExitCode> {
    let pack = state.load_pack()?;
    let index = state.load_index(&pack)?;

    println!("Validating pack: {}", pack.name);
    if let Some(description) = pack.description.as_deref().filter(|d| !d.is_empty()) {
        println!("Description: {description}");
    }
    println!();

    let report = validate_pack(&pack, &index);
    for issue in &report.issues {
        match issue.severity {
            Severity::Error => println!("  {issue}"),
            Severity::Warning => println!("     {issue}"),
        }
    }

    println!("\n=== Validation Summary ===");
    let (errors, warnings) = (report.errors(), report.warnings());
    if errors == 0 && warnings == 0 {
        println!("Pack validation passed with no issues!");
    } else if errors == 0 {
        println!("Pack validation passed with {warnings} warning(s)");
    } else {
        println!("Pack validation failed with {errors} error(s) and {warnings} warning(s)");
    }
    println!(
        "Files checked: {} total, {} metadata files, {} other files",
        report.files_checked,
        report.meta_files,
        report.files_checked.saturating_sub(report.meta_files)
    );

    if errors > 0 {
        println!("\nFix the ERROR items above, then run 'packsmith refresh' to update the index.");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn refresh(state: &AppState) -> PackResult<ExitCode> {
    let mut pack = state.load_pack()?;
    let mut index = state.load_index(&pack)?;

    let summary = index.refresh()?;
    index.write()?;
    pack.update_index_hash(state.hashes.as_ref())?;
    pack.write()?;

    println!(
        "Index refreshed: {} added, {} updated, {} removed, {} unchanged",
        summary.added, summary.updated, summary.removed, summary.unchanged
    );
    Ok(ExitCode::SUCCESS)
}

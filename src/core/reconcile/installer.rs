use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use super::report::{ImportFailure, ImportOutcome, ImportReport, StopReason};
use crate::core::bundle::{BundleManifest, FileRef};
use crate::core::catalog::{
    best_hash, project_type_folder, select_file, targets_any_loader, CatalogClient,
    RateLimitRetry, VersionRef,
};
use crate::core::error::{PackError, PackResult};
use crate::core::index::Index;
use crate::core::meta::{
    slugify_name, Download, MetaRecord, ModrinthUpdate, Side, UpdateSource, META_EXTENSION,
};
use crate::core::pack::Pack;
use crate::core::side::{resolve, resolve_project};

pub const DEFAULT_CHECKPOINT_EVERY: usize = 10;

/// Digest the bundle manifest is looked up by.
const LOOKUP_ALGORITHM: &str = "sha512";

/// Where an artifact's side comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideSource {
    /// Project-level catalog data. Never skips an artifact.
    #[default]
    Project,
    /// The `env` block of the bundle manifest. May skip an artifact.
    Manifest,
}

#[derive(Debug, Clone)]
pub struct InstallSettings {
    /// Forces the folder records are written to.
    pub meta_folder: Option<String>,
    pub meta_folder_base: String,
    pub checkpoint_every: usize,
    pub retry: RateLimitRetry,
    pub side_source: SideSource,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            meta_folder: None,
            meta_folder_base: ".".to_string(),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            retry: RateLimitRetry::default(),
            side_source: SideSource::default(),
        }
    }
}

struct PlannedInstall<'m> {
    file: &'m FileRef,
    version: VersionRef,
}

/// Installs a bundle's artifacts into a pack, one at a time.
///
/// The reconciler owns the index for the whole batch. Progress is persisted
/// every `checkpoint_every` successful installs and once more whenever the
/// batch stops, whether it completed, was interrupted or faulted.
pub struct InstallationReconciler<'a> {
    catalog: &'a dyn CatalogClient,
    pack: &'a mut Pack,
    index: &'a mut Index,
    settings: InstallSettings,
    dirty: bool,
}

impl<'a> InstallationReconciler<'a> {
    pub fn new(
        catalog: &'a dyn CatalogClient,
        pack: &'a mut Pack,
        index: &'a mut Index,
        settings: InstallSettings,
    ) -> Self {
        Self {
            catalog,
            pack,
            index,
            settings,
            dirty: false,
        }
    }

    /// Install every artifact of `manifest` the catalog recognizes.
    ///
    /// `shutdown` resolving stops the batch between two installs. Only a
    /// failing batch lookup or a failing final checkpoint is an `Err`;
    /// everything else is reported through the outcome.
    pub async fn import<S>(
        &mut self,
        manifest: &BundleManifest,
        shutdown: S,
    ) -> PackResult<ImportOutcome>
    where
        S: Future<Output = ()>,
    {
        let hashes = manifest.hashes(LOOKUP_ALGORITHM);
        if hashes.is_empty() {
            info!("No files with {} hashes found in the bundle", LOOKUP_ALGORITHM);
            return Ok(ImportOutcome {
                report: ImportReport::new(0),
                stop: StopReason::Completed,
            });
        }

        let resolved = self
            .catalog
            .lookup_by_hashes(&hashes, LOOKUP_ALGORITHM)
            .await
            .map_err(|err| match err {
                PackError::Lookup { .. } => err,
                other => PackError::Lookup {
                    source: Box::new(other),
                },
            })?;

        let mut plan = Vec::new();
        for hash in &hashes {
            let found = resolved
                .get(hash)
                .zip(manifest.file_for_hash(LOOKUP_ALGORITHM, hash));
            match found {
                Some((version, file)) => plan.push(PlannedInstall {
                    file,
                    version: version.clone(),
                }),
                None => debug!("No catalog match for hash {}", short_hash(hash)),
            }
        }

        let mut report = ImportReport::new(plan.len());
        report.unmatched = hashes.len() - plan.len();
        info!("Found {} artifacts to install", plan.len());

        let mut installed = self.installed_project_ids();
        info!("Found {} already installed catalog projects", installed.len());

        let stop = {
            let batch = AssertUnwindSafe(self.install_all(&plan, &mut installed, &mut report))
                .catch_unwind();
            tokio::select! {
                result = batch => match result {
                    Ok(Ok(())) => StopReason::Completed,
                    Ok(Err(err)) => StopReason::Fault(err.to_string()),
                    Err(payload) => StopReason::Fault(panic_message(payload.as_ref())),
                },
                _ = shutdown => StopReason::Interrupted,
            }
        };

        match &stop {
            StopReason::Completed => {}
            StopReason::Interrupted => warn!("Import interrupted, saving progress"),
            StopReason::Fault(reason) => error!("Import stopped by a fault: {}", reason),
        }
        self.checkpoint()?;

        Ok(ImportOutcome { report, stop })
    }

    /// Catalog project IDs already recorded in the pack.
    pub fn installed_project_ids(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        for (path, record) in self.index.meta_records() {
            match record {
                Ok(record) => {
                    if let Some(update) = record.modrinth() {
                        if !update.project_id.is_empty() {
                            ids.insert(update.project_id.clone());
                        }
                    }
                }
                Err(err) => warn!("Skipping unreadable record {}: {}", path, err),
            }
        }
        ids
    }

    /// Persist the index and the pack hash if anything changed since the
    /// last call. Returns whether anything was written.
    pub fn checkpoint(&mut self) -> PackResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.index.write()?;
        self.pack.update_index_hash(self.index.hashes())?;
        self.pack.write()?;
        self.dirty = false;
        info!("Saved progress ({} entries in index)", self.index.len());
        Ok(true)
    }

    async fn install_all(
        &mut self,
        plan: &[PlannedInstall<'_>],
        installed: &mut HashSet<String>,
        report: &mut ImportReport,
    ) -> PackResult<()> {
        let every = self.settings.checkpoint_every.max(1);

        for (position, item) in plan.iter().enumerate() {
            let project_id = &item.version.project_id;
            if installed.contains(project_id) {
                info!("Skipping already installed project (project ID: {})", project_id);
                report.skipped += 1;
                continue;
            }

            let side = match self.settings.side_source {
                SideSource::Project => None,
                SideSource::Manifest => {
                    let env = item.file.env_or_unknown();
                    let resolution = resolve(env.client, env.server);
                    for warning in &resolution.warnings {
                        warn!("{}: {}", item.file.path, warning);
                    }
                    match resolution.decision.side() {
                        Some(side) => Some(side),
                        None => {
                            info!("Skipping {}: supported on neither side", item.file.path);
                            report.unsupported += 1;
                            continue;
                        }
                    }
                }
            };

            debug!("Processing {}/{}: {}", position + 1, plan.len(), item.file.path);
            match self.install_one(item, side).await {
                Ok(()) => {
                    report.installed += 1;
                    installed.insert(project_id.clone());
                    if report.installed % every == 0 {
                        info!("Checkpoint after {} installations", report.installed);
                        self.checkpoint()?;
                    }
                }
                Err(err) => {
                    warn!(
                        "Failed to install {} (version ID: {}): {}",
                        item.file.path, item.version.version_id, err
                    );
                    report.failures.push(ImportFailure {
                        path: item.file.path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn install_one(
        &mut self,
        item: &PlannedInstall<'_>,
        side: Option<Side>,
    ) -> PackResult<()> {
        let project_id = &item.version.project_id;
        let catalog = self.catalog;
        let project = self
            .settings
            .retry
            .run(project_id, || catalog.get_project(project_id))
            .await?;

        let side = match side {
            Some(side) => side,
            None => {
                let (side, warnings) = resolve_project(project.client_side, project.server_side);
                for warning in warnings {
                    warn!("{}: {}", project.title, warning);
                }
                side
            }
        };

        let version = catalog.get_version(&item.version.version_id).await?;
        let pack_loaders = self.pack.compatible_loaders();
        if project.project_type == "mod" && !targets_any_loader(&version, &pack_loaders) {
            warn!(
                "{} version {} targets {:?}, which this pack does not use",
                project.title, version.id, version.loaders
            );
        }
        let file = select_file(&version)?;
        let (algorithm, hash) = best_hash(file)
            .ok_or_else(|| PackError::Other(format!("file {} has no hash", file.filename)))?;

        let folder = match &self.settings.meta_folder {
            Some(folder) => folder.clone(),
            None => project_type_folder(
                &project.project_type,
                &version.loaders,
                self.pack.datapack_folder(),
            )?,
        };
        let slug = project
            .slug
            .clone()
            .filter(|slug| !slug.is_empty())
            .unwrap_or_else(|| slugify_name(&project.title));
        let rel = record_path(&self.settings.meta_folder_base, &folder, &slug);

        info!(
            "Installing {} (version ID: {}) with side: {}",
            project.title, version.id, side
        );

        let mut record = MetaRecord::new(
            project.title.clone(),
            file.filename.clone(),
            Download::new(file.url.clone(), algorithm, hash),
        )
        .with_side(side)
        .with_update(UpdateSource::Modrinth(ModrinthUpdate {
            project_id: project.id.clone(),
            installed_version: version.id.clone(),
        }));
        record.set_meta_path(self.index.resolve_path(&rel));

        // No await between the record write and the index update.
        let (format, record_hash) = record.write(self.index.hashes())?;
        self.index.refresh_entry(&rel, format, &record_hash, true);
        self.dirty = true;
        Ok(())
    }
}

fn record_path(base: &str, folder: &str, slug: &str) -> String {
    let file_name = format!("{slug}{META_EXTENSION}");
    base.split(['/', '\\'])
        .chain(folder.split(['/', '\\']))
        .chain(std::iter::once(file_name.as_str()))
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic with a non-string payload".to_string()
    }
}

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::core::bundle::BundleManifest;
use crate::core::catalog::CatalogClient;
use crate::core::error::PackResult;
use crate::core::index::Index;
use crate::core::side::resolve_project;

const LOOKUP_ALGORITHM: &str = "sha512";

/// One artifact reduced to what the comparison needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModInfo {
    pub project_id: String,
    /// For changed entries this reads `old → new`.
    pub version_id: String,
    pub name: String,
    pub path: String,
    pub side: String,
}

/// How many local records came from each kind of source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceTally {
    pub catalog: usize,
    pub curseforge: usize,
    /// No update source at all.
    pub url: usize,
    pub other: usize,
}

impl SourceTally {
    pub fn total(&self) -> usize {
        self.catalog + self.curseforge + self.url + self.other
    }

    /// Records left out of the comparison.
    pub fn not_compared(&self) -> usize {
        self.curseforge + self.url + self.other
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalMods {
    pub mods: BTreeMap<String, ModInfo>,
    pub sources: SourceTally,
    /// Records that could not be loaded.
    pub unreadable: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// In the bundle, not in the pack.
    pub missing: Vec<ModInfo>,
    /// In the pack, not in the bundle.
    pub extra: Vec<ModInfo>,
    /// In both at different versions.
    pub changed: Vec<ModInfo>,
    pub local_sources: SourceTally,
    pub remote_count: usize,
    pub unreadable: Vec<String>,
}

impl DiffReport {
    pub fn total_differences(&self) -> usize {
        self.missing.len() + self.extra.len() + self.changed.len()
    }
}

/// Compares the catalog-sourced part of a pack with a bundle manifest.
/// Never writes anything.
pub struct DiffEngine<'a> {
    catalog: &'a dyn CatalogClient,
}

impl<'a> DiffEngine<'a> {
    pub fn new(catalog: &'a dyn CatalogClient) -> Self {
        Self { catalog }
    }

    pub async fn diff(&self, index: &Index, manifest: &BundleManifest) -> PackResult<DiffReport> {
        let local = Self::local_mods(index);
        let remote = self.remote_mods(manifest).await?;
        let mut report = Self::compare(&local.mods, &remote);
        report.local_sources = local.sources;
        report.remote_count = remote.len();
        report.unreadable = local.unreadable;
        info!(
            "Diff: {} missing, {} extra, {} changed",
            report.missing.len(),
            report.extra.len(),
            report.changed.len()
        );
        Ok(report)
    }

    /// Catalog-sourced records of the pack, keyed by project ID.
    pub fn local_mods(index: &Index) -> LocalMods {
        let mut local = LocalMods::default();

        for (path, record) in index.meta_records() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    warn!("Skipping invalid record {}: {}", path, err);
                    local.unreadable.push(path);
                    continue;
                }
            };

            if let Some(update) = record.modrinth().filter(|u| !u.project_id.is_empty()) {
                let side = record
                    .side()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| record.side.clone());
                local.mods.insert(
                    update.project_id.clone(),
                    ModInfo {
                        project_id: update.project_id.clone(),
                        version_id: update.installed_version.clone(),
                        name: record.name.clone(),
                        path,
                        side,
                    },
                );
                local.sources.catalog += 1;
                continue;
            }

            if record.update_source("curseforge").is_some() {
                local.sources.curseforge += 1;
            } else if record.update.is_empty() {
                local.sources.url += 1;
            } else {
                local.sources.other += 1;
            }
        }

        local
    }

    /// Bundle artifacts the catalog recognizes, keyed by project ID.
    ///
    /// One batched hash lookup, then one batched project fetch.
    pub async fn remote_mods(
        &self,
        manifest: &BundleManifest,
    ) -> PackResult<BTreeMap<String, ModInfo>> {
        let mut mods = BTreeMap::new();
        let hashes = manifest.hashes(LOOKUP_ALGORITHM);
        if hashes.is_empty() {
            return Ok(mods);
        }

        let resolved = self
            .catalog
            .lookup_by_hashes(&hashes, LOOKUP_ALGORITHM)
            .await?;

        let mut project_ids = Vec::new();
        let mut seen = HashSet::new();
        let mut first_version = BTreeMap::new();
        for hash in &hashes {
            let Some(version) = resolved.get(hash) else {
                continue;
            };
            if seen.insert(version.project_id.clone()) {
                project_ids.push(version.project_id.clone());
                let path = manifest
                    .file_for_hash(LOOKUP_ALGORITHM, hash)
                    .map(|file| file.path.clone())
                    .unwrap_or_default();
                first_version.insert(version.project_id.clone(), (version.version_id.clone(), path));
            }
        }

        let projects = self.catalog.get_projects(&project_ids).await?;
        for project in projects {
            let Some((version_id, path)) = first_version.get(&project.id) else {
                debug!("Catalog returned unrequested project {}", project.id);
                continue;
            };
            let (side, _) = resolve_project(project.client_side, project.server_side);
            mods.insert(
                project.id.clone(),
                ModInfo {
                    project_id: project.id.clone(),
                    version_id: version_id.clone(),
                    name: project.title.clone(),
                    path: path.clone(),
                    side: side.to_string(),
                },
            );
        }

        Ok(mods)
    }

    /// Set difference by project ID, every list sorted by display name.
    pub fn compare(
        local: &BTreeMap<String, ModInfo>,
        remote: &BTreeMap<String, ModInfo>,
    ) -> DiffReport {
        let mut report = DiffReport::default();

        for (project_id, info) in remote {
            if !local.contains_key(project_id) {
                report.missing.push(info.clone());
            }
        }

        for (project_id, current) in local {
            match remote.get(project_id) {
                None => report.extra.push(current.clone()),
                Some(target) if target.version_id != current.version_id => {
                    report.changed.push(ModInfo {
                        version_id: format!("{} → {}", current.version_id, target.version_id),
                        ..current.clone()
                    });
                }
                Some(_) => {}
            }
        }

        for list in [&mut report.missing, &mut report.extra, &mut report.changed] {
            list.sort_by(|a, b| a.name.cmp(&b.name));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bundle::FileRef;
    use crate::core::catalog::{ProjectRecord, VersionRecord, VersionRef};
    use crate::core::error::PackError;
    use crate::core::hash::{DefaultHashProvider, HashFormat};
    use crate::core::meta::{
        CurseForgeUpdate, Download, GitHubUpdate, MetaRecord, ModrinthUpdate, UpdateSource,
    };
    use crate::core::side::SideSupport;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeCatalog {
        lookup: HashMap<String, VersionRef>,
        projects: HashMap<String, ProjectRecord>,
        lookups: AtomicUsize,
        project_batches: AtomicUsize,
    }

    impl FakeCatalog {
        fn add(&mut self, hash: &str, version: &str, project: &str, title: &str) {
            self.lookup.insert(
                hash.to_string(),
                VersionRef {
                    version_id: version.to_string(),
                    project_id: project.to_string(),
                },
            );
            self.projects.insert(
                project.to_string(),
                ProjectRecord {
                    id: project.to_string(),
                    title: title.to_string(),
                    slug: None,
                    project_type: "mod".into(),
                    client_side: SideSupport::Required,
                    server_side: SideSupport::Unsupported,
                },
            );
        }
    }

    #[async_trait]
    impl CatalogClient for FakeCatalog {
        async fn lookup_by_hashes(
            &self,
            hashes: &[String],
            _algorithm: &str,
        ) -> PackResult<HashMap<String, VersionRef>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(hashes
                .iter()
                .filter_map(|h| self.lookup.get(h).map(|v| (h.clone(), v.clone())))
                .collect())
        }

        async fn get_project(&self, id: &str) -> PackResult<ProjectRecord> {
            Err(PackError::Other(format!("unexpected single fetch of {id}")))
        }

        async fn get_projects(&self, ids: &[String]) -> PackResult<Vec<ProjectRecord>> {
            self.project_batches.fetch_add(1, Ordering::SeqCst);
            Ok(ids.iter().filter_map(|id| self.projects.get(id)).cloned().collect())
        }

        async fn get_version(&self, id: &str) -> PackResult<VersionRecord> {
            Err(PackError::Other(format!("unexpected version fetch of {id}")))
        }
    }

    fn manifest(hashes: &[&str]) -> BundleManifest {
        BundleManifest {
            format_version: 1,
            game: "minecraft".into(),
            version_id: "1".into(),
            name: "Target".into(),
            summary: None,
            files: hashes
                .iter()
                .map(|h| FileRef {
                    path: format!("mods/{h}.jar"),
                    hashes: BTreeMap::from([("sha512".to_string(), h.to_string())]),
                    env: None,
                    downloads: Vec::new(),
                    file_size: 0,
                })
                .collect(),
            dependencies: BTreeMap::new(),
        }
    }

    fn add_record(index: &mut Index, rel: &str, record: MetaRecord) {
        let mut record = record;
        record.set_meta_path(index.resolve_path(rel));
        let (format, hash) = record.write(index.hashes()).unwrap();
        index.refresh_entry(rel, format, &hash, true);
    }

    fn modrinth_record(name: &str, project: &str, version: &str) -> MetaRecord {
        MetaRecord::new(name, format!("{name}.jar"), Download::new("https://x", "sha1", "aa"))
            .with_update(UpdateSource::Modrinth(ModrinthUpdate {
                project_id: project.into(),
                installed_version: version.into(),
            }))
    }

    fn empty_index(dir: &tempfile::TempDir) -> Index {
        Index::new(
            dir.path().join("index.toml"),
            dir.path().to_path_buf(),
            HashFormat::Sha256,
            Arc::new(DefaultHashProvider),
        )
    }

    #[tokio::test]
    async fn installed_project_at_same_version_and_missing_project() {
        let mut catalog = FakeCatalog::default();
        catalog.add("H1", "versionA", "projectP", "Pancake");
        catalog.add("H2", "versionB", "projectQ", "Quark");

        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(&dir);
        add_record(&mut index, "mods/pancake.pw.toml", modrinth_record("Pancake", "projectP", "versionA"));

        let engine = DiffEngine::new(&catalog);
        let report = engine.diff(&index, &manifest(&["H1", "H2"])).await.unwrap();

        assert_eq!(report.extra, Vec::new());
        assert_eq!(report.changed, Vec::new());
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].project_id, "projectQ");
        assert_eq!(report.missing[0].side, "client");
        assert_eq!(report.remote_count, 2);
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.project_batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_versions_and_extras_sorted_by_name() {
        let mut catalog = FakeCatalog::default();
        catalog.add("H1", "v2", "p1", "Zinc");
        catalog.add("H2", "v9", "p2", "Apple");

        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(&dir);
        add_record(&mut index, "mods/zinc.pw.toml", modrinth_record("Zinc", "p1", "v1"));
        add_record(&mut index, "mods/apple.pw.toml", modrinth_record("Apple", "p2", "v8"));
        add_record(&mut index, "mods/moss.pw.toml", modrinth_record("Moss", "p3", "v1"));
        add_record(&mut index, "mods/beet.pw.toml", modrinth_record("Beet", "p4", "v1"));

        let report = DiffEngine::new(&catalog)
            .diff(&index, &manifest(&["H1", "H2"]))
            .await
            .unwrap();

        let changed: Vec<_> = report
            .changed
            .iter()
            .map(|m| (m.name.as_str(), m.version_id.as_str()))
            .collect();
        assert_eq!(changed, vec![("Apple", "v8 → v9"), ("Zinc", "v1 → v2")]);
        let extra: Vec<_> = report.extra.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(extra, vec!["Beet", "Moss"]);
    }

    #[tokio::test]
    async fn running_twice_is_identical_and_writes_nothing() {
        let mut catalog = FakeCatalog::default();
        catalog.add("H1", "v2", "p1", "Zinc");

        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(&dir);
        add_record(&mut index, "mods/zinc.pw.toml", modrinth_record("Zinc", "p1", "v1"));
        index.write().unwrap();
        let before = std::fs::read(dir.path().join("index.toml")).unwrap();
        let record_before = std::fs::read(dir.path().join("mods/zinc.pw.toml")).unwrap();

        let engine = DiffEngine::new(&catalog);
        let first = engine.diff(&index, &manifest(&["H1"])).await.unwrap();
        let second = engine.diff(&index, &manifest(&["H1"])).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(dir.path().join("index.toml")).unwrap(), before);
        assert_eq!(
            std::fs::read(dir.path().join("mods/zinc.pw.toml")).unwrap(),
            record_before
        );
    }

    #[test]
    fn local_sources_are_tallied() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(&dir);
        add_record(&mut index, "mods/a.pw.toml", modrinth_record("A", "p1", "v1"));
        add_record(
            &mut index,
            "mods/b.pw.toml",
            MetaRecord::new("B", "b.jar", Download::new("https://x", "sha1", "aa")).with_update(
                UpdateSource::CurseForge(CurseForgeUpdate {
                    project_id: 1,
                    file_id: 2,
                }),
            ),
        );
        add_record(
            &mut index,
            "mods/c.pw.toml",
            MetaRecord::new("C", "c.jar", Download::new("https://x", "sha1", "aa")),
        );
        add_record(
            &mut index,
            "mods/d.pw.toml",
            MetaRecord::new("D", "d.jar", Download::new("https://x", "sha1", "aa")).with_update(
                UpdateSource::GitHub(GitHubUpdate {
                    slug: "o/r".into(),
                    tag: None,
                    branch: None,
                    regex: None,
                }),
            ),
        );
        std::fs::write(dir.path().join("mods/e.pw.toml"), "not = [valid").unwrap();
        index.refresh_file("mods/e.pw.toml").unwrap();

        let local = DiffEngine::local_mods(&index);
        assert_eq!(
            local.sources,
            SourceTally {
                catalog: 1,
                curseforge: 1,
                url: 1,
                other: 1
            }
        );
        assert_eq!(local.sources.not_compared(), 3);
        assert_eq!(local.mods.len(), 1);
        assert_eq!(local.unreadable, vec!["mods/e.pw.toml"]);
        assert_eq!(local.mods["p1"].side, "both");
    }

    #[test]
    fn catalog_record_without_project_id_counts_as_other_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(&dir);
        add_record(&mut index, "mods/a.pw.toml", modrinth_record("A", "", "v1"));

        let local = DiffEngine::local_mods(&index);
        assert!(local.mods.is_empty());
        assert_eq!(
            local.sources,
            SourceTally {
                catalog: 0,
                curseforge: 0,
                url: 0,
                other: 1
            }
        );
        assert_eq!(local.sources.total(), 1);
        assert_eq!(local.sources.not_compared(), 1);
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use super::ignore::IgnoreRules;
use crate::core::error::{PackError, PackResult};
use crate::core::hash::{HashFormat, HashProvider};
use crate::core::meta::{MetaRecord, META_EXTENSION};

/// One tracked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash_format: HashFormat,
    pub hash: String,
    pub alias: Option<String>,
    /// The path is a metadata record, not a downloaded artifact.
    pub meta_file: bool,
    /// Installers must not overwrite this file once it exists.
    pub preserve: bool,
}

/// What a refresh-from-disk changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

#[derive(Serialize, Deserialize)]
struct IndexDocument {
    #[serde(rename = "hash-format")]
    hash_format: HashFormat,
    #[serde(default)]
    files: Vec<IndexFileDocument>,
}

#[derive(Serialize, Deserialize)]
struct IndexFileDocument {
    file: String,
    hash: String,
    #[serde(rename = "hash-format", default, skip_serializing_if = "Option::is_none")]
    hash_format: Option<HashFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alias: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    metafile: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    preserve: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Authoritative mapping from pack-relative path to content hash.
///
/// Entries are kept sorted so the persisted form is deterministic.
pub struct Index {
    hash_format: HashFormat,
    entries: BTreeMap<String, IndexEntry>,
    index_file: PathBuf,
    pack_root: PathBuf,
    /// Paths that are never tracked (the pack file, the index itself).
    excluded: BTreeSet<String>,
    hashes: Arc<dyn HashProvider>,
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("hash_format", &self.hash_format)
            .field("entries", &self.entries.len())
            .field("index_file", &self.index_file)
            .field("pack_root", &self.pack_root)
            .finish()
    }
}

impl Index {
    /// Empty index that will be written to `index_file`.
    pub fn new(
        index_file: PathBuf,
        pack_root: PathBuf,
        hash_format: HashFormat,
        hashes: Arc<dyn HashProvider>,
    ) -> Self {
        let mut index = Self {
            hash_format,
            entries: BTreeMap::new(),
            index_file,
            pack_root,
            excluded: BTreeSet::new(),
            hashes,
        };
        if let Ok(own) = index.relative_path(&index.index_file.clone()) {
            index.excluded.insert(own);
        }
        index
    }

    /// Load the persisted index. A missing or malformed file is an error.
    pub fn load(
        index_file: PathBuf,
        pack_root: PathBuf,
        hashes: Arc<dyn HashProvider>,
    ) -> PackResult<Self> {
        let raw = std::fs::read_to_string(&index_file)
            .map_err(|e| PackError::io(&index_file, e))?;
        let document: IndexDocument =
            toml::from_str(&raw).map_err(|e| PackError::parse(&index_file, e))?;

        let mut index = Self::new(index_file, pack_root, document.hash_format, hashes);
        for file in document.files {
            let key = normalize_relative(&file.file);
            index.entries.insert(
                key,
                IndexEntry {
                    hash_format: file.hash_format.unwrap_or(document.hash_format),
                    hash: file.hash,
                    alias: file.alias,
                    meta_file: file.metafile,
                    preserve: file.preserve,
                },
            );
        }

        debug!("Loaded index {:?} with {} entries", index.index_file, index.len());
        Ok(index)
    }

    /// Rewrite the whole index.
    ///
    /// The content goes to a sibling temp file first and is renamed over the
    /// target, so a crash leaves either the old or the new index.
    pub fn write(&self) -> PackResult<()> {
        let document = IndexDocument {
            hash_format: self.hash_format,
            files: self
                .entries
                .iter()
                .map(|(file, entry)| IndexFileDocument {
                    file: file.clone(),
                    hash: entry.hash.clone(),
                    hash_format: (entry.hash_format != self.hash_format)
                        .then_some(entry.hash_format),
                    alias: entry.alias.clone(),
                    metafile: entry.meta_file,
                    preserve: entry.preserve,
                })
                .collect(),
        };
        let encoded = toml::to_string(&document)?;

        if let Some(parent) = self.index_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
            }
        }

        let file_name = self
            .index_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "index.toml".to_string());
        let staging = self.index_file.with_file_name(format!("{file_name}.tmp"));
        std::fs::write(&staging, encoded).map_err(|e| PackError::io(&staging, e))?;
        std::fs::rename(&staging, &self.index_file)
            .map_err(|e| PackError::io(&self.index_file, e))?;

        debug!("Wrote index {:?} ({} entries)", self.index_file, self.len());
        Ok(())
    }

    // ── Paths ───────────────────────────────────────────

    /// Join a pack-relative path onto the pack root.
    pub fn resolve_path(&self, relative_path: &str) -> PathBuf {
        let mut path = self.pack_root.clone();
        for part in relative_path.split(['/', '\\']) {
            if !part.is_empty() && part != "." {
                path.push(part);
            }
        }
        path
    }

    /// Inverse of [`Index::resolve_path`] for paths under the pack root.
    pub fn relative_path(&self, path: &Path) -> PackResult<String> {
        let stripped = path.strip_prefix(&self.pack_root).map_err(|_| {
            PackError::Other(format!(
                "{:?} is outside the pack root {:?}",
                path, self.pack_root
            ))
        })?;

        let mut parts = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
                Component::CurDir => {}
                _ => {
                    return Err(PackError::Other(format!(
                        "{path:?} cannot be expressed relative to the pack root"
                    )))
                }
            }
        }
        Ok(parts.join("/"))
    }

    /// Never track `relative_path`, even if it exists on disk.
    pub fn exclude(&mut self, relative_path: &str) {
        let key = normalize_relative(relative_path);
        self.entries.remove(&key);
        self.excluded.insert(key);
    }

    // ── Entries ─────────────────────────────────────────

    /// Insert or overwrite an entry. The preserve flag of an existing entry
    /// is kept.
    pub fn refresh_entry(
        &mut self,
        relative_path: &str,
        hash_format: HashFormat,
        hash: &str,
        is_meta_file: bool,
    ) {
        let key = normalize_relative(relative_path);
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.hash_format = hash_format;
                entry.hash = hash.to_string();
                entry.meta_file = is_meta_file;
            }
            None => {
                self.entries.insert(
                    key,
                    IndexEntry {
                        hash_format,
                        hash: hash.to_string(),
                        alias: None,
                        meta_file: is_meta_file,
                        preserve: false,
                    },
                );
            }
        }
    }

    /// Recompute one entry from the file currently on disk.
    pub fn refresh_file(&mut self, relative_path: &str) -> PackResult<()> {
        let key = normalize_relative(relative_path);
        let format = self
            .entries
            .get(&key)
            .map_or(self.hash_format, |e| e.hash_format);
        let hash = self.hashes.hash_file(format, &self.resolve_path(&key))?;
        let is_meta = key.ends_with(META_EXTENSION);
        self.refresh_entry(&key, format, &hash, is_meta);
        Ok(())
    }

    /// Bring the whole index in line with the pack root on disk.
    ///
    /// Preserved entries survive even when their file is gone.
    pub fn refresh(&mut self) -> PackResult<RefreshSummary> {
        let rules = IgnoreRules::load(&self.pack_root)?;
        let mut summary = RefreshSummary::default();
        let mut seen = BTreeSet::new();

        for item in WalkDir::new(&self.pack_root).min_depth(1).sort_by_file_name() {
            let item = item.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                match e.into_io_error() {
                    Some(source) => PackError::io(path, source),
                    None => PackError::Other(format!("filesystem loop at {path:?}")),
                }
            })?;
            if !item.file_type().is_file() {
                continue;
            }

            let rel = self.relative_path(item.path())?;
            if self.excluded.contains(&rel) || rules.is_ignored(&rel) {
                continue;
            }

            let existing = self.entries.get(&rel);
            let format = existing.map_or(self.hash_format, |e| e.hash_format);
            let hash = self.hashes.hash_file(format, item.path())?;
            let is_meta = rel.ends_with(META_EXTENSION);

            match existing {
                Some(entry) if entry.hash.eq_ignore_ascii_case(&hash) && entry.meta_file == is_meta => {
                    summary.unchanged += 1
                }
                Some(_) => summary.updated += 1,
                None => summary.added += 1,
            }
            self.refresh_entry(&rel, format, &hash, is_meta);
            seen.insert(rel);
        }

        let before = self.entries.len();
        self.entries
            .retain(|path, entry| entry.preserve || seen.contains(path));
        summary.removed = before - self.entries.len();

        debug!(
            "Index refresh: {} added, {} updated, {} removed",
            summary.added, summary.updated, summary.removed
        );
        Ok(summary)
    }

    /// Check that the entry's hash still matches the file on disk.
    pub fn verify_entry(&self, relative_path: &str) -> PackResult<bool> {
        let key = normalize_relative(relative_path);
        let entry = self
            .entries
            .get(&key)
            .ok_or_else(|| PackError::Other(format!("'{key}' is not tracked by the index")))?;
        let actual = self
            .hashes
            .hash_file(entry.hash_format, &self.resolve_path(&key))?;
        Ok(actual.eq_ignore_ascii_case(&entry.hash))
    }

    pub fn get(&self, relative_path: &str) -> Option<&IndexEntry> {
        self.entries.get(&normalize_relative(relative_path))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Metadata records ────────────────────────────────

    /// Lazily load every metadata record the index tracks.
    ///
    /// A broken record yields an `Err` item instead of ending the sequence.
    /// Call again to start over.
    pub fn meta_records(&self) -> impl Iterator<Item = (String, PackResult<MetaRecord>)> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.meta_file)
            .map(move |(rel, _)| (rel.clone(), MetaRecord::load(&self.resolve_path(rel))))
    }

    pub fn meta_file_count(&self) -> usize {
        self.entries.values().filter(|e| e.meta_file).count()
    }

    /// Find a metadata record by its file stem (`sodium` for
    /// `mods/sodium.pw.toml`) or by its relative path.
    pub fn find_meta(&self, name: &str) -> Option<String> {
        let wanted = normalize_relative(name);
        self.entries
            .iter()
            .filter(|(_, entry)| entry.meta_file)
            .map(|(rel, _)| rel)
            .find(|rel| {
                if **rel == wanted {
                    return true;
                }
                let file = rel.rsplit('/').next().unwrap_or(rel.as_str());
                file.strip_suffix(META_EXTENSION) == Some(wanted.as_str())
            })
            .cloned()
    }

    // ── Accessors ───────────────────────────────────────

    pub fn hash_format(&self) -> HashFormat {
        self.hash_format
    }

    pub fn hashes(&self) -> &dyn HashProvider {
        self.hashes.as_ref()
    }

    pub fn pack_root(&self) -> &Path {
        &self.pack_root
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }
}

fn normalize_relative(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::DefaultHashProvider;
    use crate::core::meta::Download;
    use pretty_assertions::assert_eq;

    fn empty_index(root: &Path) -> Index {
        Index::new(
            root.join("index.toml"),
            root.to_path_buf(),
            HashFormat::Sha256,
            Arc::new(DefaultHashProvider),
        )
    }

    fn write_file(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn resolve_and_relative_are_inverse() {
        let dir = tempfile::tempdir().unwrap();
        let index = empty_index(dir.path());

        let abs = index.resolve_path("mods/sodium.pw.toml");
        assert_eq!(abs, dir.path().join("mods").join("sodium.pw.toml"));
        assert_eq!(index.relative_path(&abs).unwrap(), "mods/sodium.pw.toml");
        assert!(index.relative_path(Path::new("/elsewhere/x")).is_err());
    }

    #[test]
    fn write_then_load_keeps_entries_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(dir.path());
        index.refresh_entry("mods/zeta.pw.toml", HashFormat::Sha256, "bb", true);
        index.refresh_entry("config/a.txt", HashFormat::Sha1, "aa", false);
        index.write().unwrap();

        let text = std::fs::read_to_string(dir.path().join("index.toml")).unwrap();
        let config_at = text.find("config/a.txt").unwrap();
        let zeta_at = text.find("mods/zeta.pw.toml").unwrap();
        assert!(config_at < zeta_at);
        assert_eq!(text.matches("hash-format").count(), 2, "{text}");
        assert!(!dir.path().join("index.toml.tmp").exists());

        let loaded = Index::load(
            dir.path().join("index.toml"),
            dir.path().to_path_buf(),
            Arc::new(DefaultHashProvider),
        )
        .unwrap();
        let entries: Vec<_> = loaded.entries().map(|(k, v)| (k.clone(), v.clone())).collect();
        let expected: Vec<_> = index.entries().map(|(k, v)| (k.clone(), v.clone())).collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn refresh_entry_keeps_preserve_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(dir.path());
        index.refresh_entry("config/keep.txt", HashFormat::Sha256, "aa", false);
        index.entries.get_mut("config/keep.txt").unwrap().preserve = true;

        index.refresh_entry("config/keep.txt", HashFormat::Sha256, "bb", false);
        let entry = index.get("config/keep.txt").unwrap();
        assert_eq!(entry.hash, "bb");
        assert!(entry.preserve);
    }

    #[test]
    fn refresh_tracks_disk_state() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(root, "config/options.txt", "fov=90");
        write_file(root, "mods/sodium.pw.toml", "name = 'x'");
        write_file(root, "exports/old.mrpack", "zip");
        write_file(root, "pack.toml", "name = 'p'");

        let mut index = empty_index(root);
        index.exclude("pack.toml");
        index.refresh_entry("mods/gone.pw.toml", HashFormat::Sha256, "aa", true);
        index.refresh_entry("saves/kept.dat", HashFormat::Sha256, "aa", false);
        index.entries.get_mut("saves/kept.dat").unwrap().preserve = true;

        let summary = index.refresh().unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(summary.removed, 1);

        assert!(index.get("mods/sodium.pw.toml").unwrap().meta_file);
        assert!(!index.get("config/options.txt").unwrap().meta_file);
        assert!(index.get("exports/old.mrpack").is_none());
        assert!(index.get("pack.toml").is_none());
        assert!(index.get("saves/kept.dat").is_some());
        assert!(index.verify_entry("config/options.txt").unwrap());

        write_file(root, "config/options.txt", "fov=110");
        assert!(!index.verify_entry("config/options.txt").unwrap());
        let again = index.refresh().unwrap();
        assert_eq!(again.updated, 1);
        assert_eq!(again.unchanged, 1);
    }

    #[test]
    fn meta_records_skip_over_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(dir.path());

        let mut good = MetaRecord::new("Good", "good.jar", Download::new("u", "sha1", "00"));
        good.set_meta_path(index.resolve_path("mods/good.pw.toml"));
        let (format, hash) = good.write(index.hashes()).unwrap();
        index.refresh_entry("mods/good.pw.toml", format, &hash, true);

        write_file(dir.path(), "mods/bad.pw.toml", "this is = = not toml");
        index.refresh_file("mods/bad.pw.toml").unwrap();
        index.refresh_entry("mods/missing.pw.toml", HashFormat::Sha256, "00", true);

        let results: Vec<_> = index.meta_records().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|(_, r)| r.is_ok()).count(), 1);
        // restartable
        assert_eq!(index.meta_records().count(), 3);
    }

    #[test]
    fn find_meta_by_stem_or_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = empty_index(dir.path());
        index.refresh_entry("mods/sodium.pw.toml", HashFormat::Sha256, "aa", true);
        index.refresh_entry("mods/sodium.jar", HashFormat::Sha256, "bb", false);

        assert_eq!(index.find_meta("sodium").as_deref(), Some("mods/sodium.pw.toml"));
        assert_eq!(
            index.find_meta("mods/sodium.pw.toml").as_deref(),
            Some("mods/sodium.pw.toml")
        );
        assert_eq!(index.find_meta("iris"), None);
    }
}

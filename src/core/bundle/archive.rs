use std::io::{Read, Seek};
use std::path::{Component, Path};

use tracing::{debug, warn};

use super::manifest::BundleManifest;
use crate::core::error::{PackError, PackResult};

pub const MANIFEST_FILE: &str = "modrinth.index.json";

/// Entries under this prefix are copied verbatim into the pack root.
pub const OVERRIDES_PREFIX: &str = "overrides/";

/// One override entry, with its path relative to the overrides folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub path: String,
    pub bytes: Vec<u8>,
    pub is_dir: bool,
    /// Unix permission bits recorded in the archive, if any.
    pub mode: Option<u32>,
}

/// A distributable pack archive, read fully into memory.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub manifest: BundleManifest,
    pub overrides: Vec<BundleEntry>,
}

impl Bundle {
    pub fn open(path: &Path) -> PackResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| PackError::io(path, e))?;
        Self::from_reader(file, path)
    }

    /// `origin` is only used in error messages.
    pub fn from_reader<R: Read + Seek>(reader: R, origin: &Path) -> PackResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut manifest = None;
        let mut overrides = Vec::new();

        for i in 0..archive.len() {
            let mut zipped = archive.by_index(i)?;
            let name = zipped.name().to_string();

            if name == MANIFEST_FILE {
                let mut raw = Vec::new();
                zipped
                    .read_to_end(&mut raw)
                    .map_err(|e| PackError::io(origin, e))?;
                let parsed = BundleManifest::from_json(&raw)
                    .map_err(|e| PackError::parse(origin.join(MANIFEST_FILE), e))?;
                manifest = Some(parsed);
                continue;
            }

            let Some(rest) = name.strip_prefix(OVERRIDES_PREFIX) else {
                continue;
            };
            let rel = rest.trim_end_matches('/');
            if rel.is_empty() {
                continue;
            }
            if zipped.enclosed_name().is_none() || !is_contained(rel) {
                warn!("Skipping override entry that escapes the pack: {}", name);
                continue;
            }

            let is_dir = zipped.is_dir();
            let mut bytes = Vec::new();
            if !is_dir {
                zipped
                    .read_to_end(&mut bytes)
                    .map_err(|e| PackError::io(origin, e))?;
            }
            overrides.push(BundleEntry {
                path: rel.to_string(),
                bytes,
                is_dir,
                mode: zipped.unix_mode(),
            });
        }

        let manifest = manifest.ok_or_else(|| {
            PackError::parse(origin, format!("{MANIFEST_FILE} not found in bundle"))
        })?;
        debug!(
            "Opened bundle '{}' ({} files, {} overrides)",
            manifest.name,
            manifest.files.len(),
            overrides.len()
        );
        Ok(Self {
            manifest,
            overrides,
        })
    }
}

/// True when `rel` stays inside whatever directory it is joined onto.
pub(crate) fn is_contained(rel: &str) -> bool {
    let path = Path::new(rel);
    !rel.starts_with('/')
        && !rel.starts_with('\\')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && !rel.split(['/', '\\']).any(|part| part == "..")
}

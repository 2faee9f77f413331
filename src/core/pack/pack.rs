use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{PackError, PackResult};
use crate::core::hash::{HashFormat, HashProvider};
use crate::core::index::Index;

pub const DEFAULT_DATAPACK_FOLDER: &str = "datapacks";

/// Where the index lives and the hash it had when last written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackIndexRef {
    pub file: String,
    #[serde(rename = "hash-format")]
    pub hash_format: HashFormat,
    #[serde(default)]
    pub hash: String,
}

impl Default for PackIndexRef {
    fn default() -> Self {
        Self {
            file: "index.toml".to_string(),
            hash_format: HashFormat::Sha256,
            hash: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackOptions {
    #[serde(
        rename = "datapack-folder",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub datapack_folder: Option<String>,
    /// Keys this tool does not interpret, written back untouched.
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// The top-level `pack.toml` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    #[serde(skip)]
    pack_file: PathBuf,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "pack-format", default, skip_serializing_if = "Option::is_none")]
    pub pack_format: Option<String>,
    #[serde(default)]
    pub index: PackIndexRef,
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "options_are_empty")]
    pub options: PackOptions,
}

fn options_are_empty(options: &PackOptions) -> bool {
    options.datapack_folder.is_none() && options.extra.is_empty()
}

impl Pack {
    pub fn new(pack_file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            pack_file: pack_file.into(),
            name: name.into(),
            author: None,
            version: None,
            description: None,
            pack_format: None,
            index: PackIndexRef::default(),
            versions: BTreeMap::new(),
            options: PackOptions::default(),
        }
    }

    pub fn load(pack_file: &Path) -> PackResult<Self> {
        let raw =
            std::fs::read_to_string(pack_file).map_err(|e| PackError::io(pack_file, e))?;
        let mut pack: Pack = toml::from_str(&raw).map_err(|e| PackError::parse(pack_file, e))?;
        pack.pack_file = pack_file.to_path_buf();
        debug!("Loaded pack '{}' from {:?}", pack.name, pack_file);
        Ok(pack)
    }

    pub fn write(&self) -> PackResult<()> {
        let encoded = toml::to_string(self)?;
        std::fs::write(&self.pack_file, encoded).map_err(|e| PackError::io(&self.pack_file, e))
    }

    pub fn pack_file(&self) -> &Path {
        &self.pack_file
    }

    /// Directory containing the pack file; every relative path resolves here.
    pub fn pack_root(&self) -> PathBuf {
        match self.pack_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.pack_root().join(&self.index.file)
    }

    /// Load the index this pack points at, creating an empty one in memory
    /// when the file does not exist yet.
    pub fn load_index(&self, hashes: Arc<dyn HashProvider>) -> PackResult<Index> {
        let index_path = self.index_path();
        let mut index = if index_path.exists() {
            Index::load(index_path, self.pack_root(), hashes)?
        } else {
            debug!("No index at {:?}, starting empty", index_path);
            Index::new(index_path, self.pack_root(), self.index.hash_format, hashes)
        };
        if let Some(file_name) = self.pack_file.file_name() {
            index.exclude(&file_name.to_string_lossy());
        }
        Ok(index)
    }

    /// Rehash the written index file into `[index].hash`.
    pub fn update_index_hash(&mut self, hashes: &dyn HashProvider) -> PackResult<()> {
        let hash = hashes.hash_file(self.index.hash_format, &self.index_path())?;
        self.index.hash = hash;
        Ok(())
    }

    pub fn minecraft_version(&self) -> Option<&str> {
        self.versions.get("minecraft").map(String::as_str)
    }

    /// Loader names artifacts may target. Quilt runs fabric mods and
    /// NeoForge runs forge mods.
    pub fn compatible_loaders(&self) -> Vec<String> {
        let mut loaders = Vec::new();
        for name in self.versions.keys() {
            match name.as_str() {
                "minecraft" => {}
                "quilt" => loaders.extend(["quilt".to_string(), "fabric".to_string()]),
                "neoforge" => loaders.extend(["neoforge".to_string(), "forge".to_string()]),
                other => loaders.push(other.to_string()),
            }
        }
        loaders.sort();
        loaders.dedup();
        loaders
    }

    pub fn datapack_folder(&self) -> &str {
        self.options
            .datapack_folder
            .as_deref()
            .filter(|folder| !folder.is_empty())
            .unwrap_or(DEFAULT_DATAPACK_FOLDER)
    }
}

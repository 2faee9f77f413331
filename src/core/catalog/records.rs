use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{PackError, PackResult};
use crate::core::side::SideSupport;

const PLUGIN_LOADERS: [&str; 9] = [
    "bukkit",
    "spigot",
    "paper",
    "purpur",
    "sponge",
    "bungeecord",
    "waterfall",
    "velocity",
    "folia",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub client_side: SideSupport,
    #[serde(default)]
    pub server_side: SideSupport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub loaders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    #[serde(default)]
    pub primary: bool,
}

/// What a hash lookup resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRef {
    #[serde(rename = "id")]
    pub version_id: String,
    pub project_id: String,
}

/// The file to install from a version: the primary one, else the first.
pub fn select_file(version: &VersionRecord) -> PackResult<&FileRecord> {
    version
        .files
        .iter()
        .find(|file| file.primary)
        .or_else(|| version.files.first())
        .ok_or_else(|| PackError::NoCompatibleFile {
            version_id: version.id.clone(),
        })
}

/// Preferred `(algorithm, hash)` of a file: sha1, then sha512, then whatever
/// else it declares in name order.
pub fn best_hash(file: &FileRecord) -> Option<(&str, &str)> {
    ["sha1", "sha512"]
        .iter()
        .find_map(|alg| file.hashes.get_key_value(*alg))
        .or_else(|| file.hashes.iter().next())
        .filter(|(_, hash)| !hash.is_empty())
        .map(|(alg, hash)| (alg.as_str(), hash.as_str()))
}

/// Whether a version runs on at least one of `loaders`. An empty list on
/// either side is taken as no constraint.
pub fn targets_any_loader(version: &VersionRecord, loaders: &[String]) -> bool {
    loaders.is_empty()
        || version.loaders.is_empty()
        || version.loaders.iter().any(|l| loaders.contains(l))
}

/// Folder, relative to the meta folder base, where a project's record goes.
pub fn project_type_folder(
    project_type: &str,
    loaders: &[String],
    datapack_folder: &str,
) -> PackResult<String> {
    let only = |name: &str| loaders.len() == 1 && loaders[0] == name;

    match project_type {
        "resourcepack" => Ok("resourcepacks".to_string()),
        "shader" if only("canvas") => Ok("resourcepacks".to_string()),
        "shader" => Ok("shaderpacks".to_string()),
        "datapack" => Ok(datapack_folder.to_string()),
        "plugin" => Ok("plugins".to_string()),
        "mod" if only("datapack") => Ok(datapack_folder.to_string()),
        "mod"
            if !loaders.is_empty()
                && loaders.iter().all(|l| PLUGIN_LOADERS.contains(&l.as_str())) =>
        {
            Ok("plugins".to_string())
        }
        "mod" => Ok("mods".to_string()),
        other => Err(PackError::UnsupportedProjectType(other.to_string())),
    }
}

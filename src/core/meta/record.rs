use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::error::{PackError, PackResult};
use crate::core::hash::{HashFormat, HashProvider};

/// File extension that marks a metadata record.
pub const META_EXTENSION: &str = ".pw.toml";

/// Platforms a client download may be disabled on.
pub const VALID_CLIENT_PLATFORMS: [&str; 3] = ["macos", "linux", "windows"];

pub const MODE_URL: &str = "url";

const KNOWN_UPDATE_SOURCES: [&str; 3] = ["modrinth", "curseforge", "github"];

/// Where an artifact runs. An empty `side` on disk means [`Side::Both`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
    Both,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
            Side::Both => "both",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = PackError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        validate_side(raw)?;
        match normalize_side(raw).as_str() {
            "client" => Ok(Side::Client),
            "server" => Ok(Side::Server),
            _ => Ok(Side::Both),
        }
    }
}

/// How the artifact file itself is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Download {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(
        rename = "disabled-client-platforms",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub disabled_client_platforms: Vec<String>,
    #[serde(rename = "hash-format")]
    pub hash_format: String,
    pub hash: String,
    /// Empty means [`MODE_URL`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

impl Download {
    pub fn new(url: impl Into<String>, hash_format: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            disabled_client_platforms: Vec::new(),
            hash_format: hash_format.into(),
            hash: hash.into(),
            mode: String::new(),
        }
    }

    pub fn mode(&self) -> &str {
        if self.mode.is_empty() {
            MODE_URL
        } else {
            &self.mode
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModrinthUpdate {
    #[serde(rename = "mod-id")]
    pub project_id: String,
    #[serde(rename = "version")]
    pub installed_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurseForgeUpdate {
    #[serde(rename = "project-id")]
    pub project_id: u32,
    #[serde(rename = "file-id")]
    pub file_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUpdate {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// Per-source update metadata, persisted as `[update.<source>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSource {
    Modrinth(ModrinthUpdate),
    CurseForge(CurseForgeUpdate),
    GitHub(GitHubUpdate),
}

impl UpdateSource {
    pub fn source_name(&self) -> &'static str {
        match self {
            UpdateSource::Modrinth(_) => "modrinth",
            UpdateSource::CurseForge(_) => "curseforge",
            UpdateSource::GitHub(_) => "github",
        }
    }
}

/// Optional-install settings. Absent entirely when every field is default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModOption {
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,
}

impl ModOption {
    pub fn is_default(&self) -> bool {
        !self.optional && self.description.is_empty() && !self.default
    }
}

/// Metadata for one artifact, stored as a `*.pw.toml` file.
///
/// The record's storage path is its identity; two records describe the same
/// artifact iff they live at the same path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    #[serde(skip)]
    meta_path: PathBuf,
    pub name: String,
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub side: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pin: bool,
    pub download: Download,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_updates",
        deserialize_with = "deserialize_updates"
    )]
    pub update: Vec<UpdateSource>,
    #[serde(default, skip_serializing_if = "option_is_default")]
    pub option: Option<ModOption>,
}

impl MetaRecord {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>, download: Download) -> Self {
        Self {
            meta_path: PathBuf::new(),
            name: name.into(),
            file_name: file_name.into(),
            side: String::new(),
            pin: false,
            download,
            update: Vec::new(),
            option: None,
        }
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side.as_str().to_string();
        self
    }

    pub fn with_update(mut self, update: UpdateSource) -> Self {
        self.update.retain(|u| u.source_name() != update.source_name());
        self.update.push(update);
        self
    }

    /// Load a record from disk. Unknown `[update.*]` sources are rejected.
    pub fn load(path: &Path) -> PackResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| PackError::io(path, e))?;
        let table: toml::Table = raw.parse().map_err(|e| PackError::parse(path, e))?;

        if let Some(update) = table.get("update").and_then(toml::Value::as_table) {
            if let Some(unknown) = update
                .keys()
                .find(|name| !KNOWN_UPDATE_SOURCES.contains(&name.as_str()))
            {
                return Err(PackError::UnknownUpdateSource {
                    path: path.to_path_buf(),
                    source_name: unknown.clone(),
                });
            }
        }

        let mut record: MetaRecord = toml::Value::Table(table)
            .try_into()
            .map_err(|e| PackError::parse(path, e))?;
        record.meta_path = path.to_path_buf();
        Ok(record)
    }

    /// Write the record to its meta path, creating parent directories.
    ///
    /// Returns the hash of the bytes written, so callers can refresh the
    /// index without reading the file back.
    pub fn write(&self, hashes: &dyn HashProvider) -> PackResult<(HashFormat, String)> {
        let encoded = toml::to_string(self)?;

        if let Some(parent) = self.meta_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
            }
        }
        std::fs::write(&self.meta_path, encoded.as_bytes())
            .map_err(|e| PackError::io(&self.meta_path, e))?;

        let format = HashFormat::Sha256;
        Ok((format, hashes.hash_bytes(format, encoded.as_bytes())))
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    pub fn set_meta_path(&mut self, path: impl Into<PathBuf>) {
        self.meta_path = path.into();
    }

    /// Parsed side; an empty side means both.
    pub fn side(&self) -> PackResult<Side> {
        if self.side.trim().is_empty() {
            return Ok(Side::Both);
        }
        self.side.parse()
    }

    pub fn update_source(&self, name: &str) -> Option<&UpdateSource> {
        self.update.iter().find(|u| u.source_name() == name)
    }

    pub fn modrinth(&self) -> Option<&ModrinthUpdate> {
        self.update.iter().find_map(|u| match u {
            UpdateSource::Modrinth(data) => Some(data),
            _ => None,
        })
    }

    /// Drop the option block once all of its fields are back to default.
    pub fn normalize_option(&mut self) -> bool {
        if self.option.as_ref().is_some_and(ModOption::is_default) {
            self.option = None;
            return true;
        }
        false
    }
}

/// Check a user supplied side value.
pub fn validate_side(side: &str) -> PackResult<()> {
    let side = normalize_side(side);
    if side.is_empty() {
        return Err(PackError::Validation("side cannot be empty".into()));
    }
    if ["client", "server", "both"].contains(&side.as_str()) {
        return Ok(());
    }
    Err(PackError::Validation(format!(
        "invalid side '{side}'. Valid values are: client, server, both"
    )))
}

pub fn normalize_side(side: &str) -> String {
    side.trim().to_string()
}

/// Check every non-empty platform against [`VALID_CLIENT_PLATFORMS`].
pub fn validate_client_platforms(platforms: &[String]) -> PackResult<()> {
    for platform in platforms {
        let platform = platform.trim().to_lowercase();
        if platform.is_empty() {
            continue;
        }
        if !VALID_CLIENT_PLATFORMS.contains(&platform.as_str()) {
            return Err(PackError::Validation(format!(
                "invalid platform '{platform}'. Valid platforms are: {}",
                VALID_CLIENT_PLATFORMS.join(", ")
            )));
        }
    }
    Ok(())
}

/// Trim, lowercase and dedupe platforms, dropping empty and unknown ones.
pub fn normalize_client_platforms(platforms: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for platform in platforms {
        let platform = platform.trim().to_lowercase();
        if VALID_CLIENT_PLATFORMS.contains(&platform.as_str()) && !normalized.contains(&platform) {
            normalized.push(platform);
        }
    }
    normalized
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn option_is_default(option: &Option<ModOption>) -> bool {
    option.as_ref().map_or(true, ModOption::is_default)
}

fn serialize_updates<S>(updates: &[UpdateSource], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(updates.len()))?;
    for update in updates {
        match update {
            UpdateSource::Modrinth(data) => map.serialize_entry(update.source_name(), data)?,
            UpdateSource::CurseForge(data) => map.serialize_entry(update.source_name(), data)?,
            UpdateSource::GitHub(data) => map.serialize_entry(update.source_name(), data)?,
        }
    }
    map.end()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateTables {
    modrinth: Option<ModrinthUpdate>,
    curseforge: Option<CurseForgeUpdate>,
    github: Option<GitHubUpdate>,
}

fn deserialize_updates<'de, D>(deserializer: D) -> Result<Vec<UpdateSource>, D::Error>
where
    D: Deserializer<'de>,
{
    let tables = UpdateTables::deserialize(deserializer)?;
    let mut updates = Vec::new();
    if let Some(data) = tables.modrinth {
        updates.push(UpdateSource::Modrinth(data));
    }
    if let Some(data) = tables.curseforge {
        updates.push(UpdateSource::CurseForge(data));
    }
    if let Some(data) = tables.github {
        updates.push(UpdateSource::GitHub(data));
    }
    Ok(updates)
}

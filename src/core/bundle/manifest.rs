use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::side::SideSupport;

/// `modrinth.index.json`: the manifest at the root of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub format_version: u32,
    pub game: String,
    pub version_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub path: String,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<FileEnv>,
    #[serde(default)]
    pub downloads: Vec<String>,
    #[serde(default)]
    pub file_size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEnv {
    #[serde(default)]
    pub client: SideSupport,
    #[serde(default)]
    pub server: SideSupport,
}

impl BundleManifest {
    pub fn from_json(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }

    /// Every distinct digest under `algorithm`, in file order.
    pub fn hashes(&self, algorithm: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .filter_map(|file| file.hashes.get(algorithm))
            .filter(|hash| seen.insert(hash.as_str()))
            .cloned()
            .collect()
    }

    pub fn file_for_hash(&self, algorithm: &str, hash: &str) -> Option<&FileRef> {
        self.files
            .iter()
            .find(|file| file.hashes.get(algorithm).map(String::as_str) == Some(hash))
    }
}

impl FileRef {
    /// Client and server signals; a missing `env` block is unknown on both.
    pub fn env_or_unknown(&self) -> FileEnv {
        self.env.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"{
        "formatVersion": 1,
        "game": "minecraft",
        "versionId": "1.0.0",
        "name": "Skyward",
        "files": [
            {
                "path": "mods/sodium.jar",
                "hashes": {"sha1": "s1", "sha512": "h1"},
                "env": {"client": "required", "server": "unsupported"},
                "downloads": ["https://cdn.example/sodium.jar"],
                "fileSize": 1024
            },
            {
                "path": "mods/lithium.jar",
                "hashes": {"sha512": "h2"},
                "downloads": []
            },
            {
                "path": "mods/lithium-copy.jar",
                "hashes": {"sha512": "h2"}
            },
            {
                "path": "mods/nohash.jar"
            }
        ],
        "dependencies": {"minecraft": "1.20.1", "fabric-loader": "0.15.0"}
    }"#;

    #[test]
    fn parses_and_lists_hashes_in_order() {
        let manifest = BundleManifest::from_json(MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.name, "Skyward");
        assert_eq!(manifest.summary, None);
        assert_eq!(manifest.hashes("sha512"), vec!["h1", "h2"]);
        assert_eq!(manifest.dependencies["minecraft"], "1.20.1");

        let sodium = manifest.file_for_hash("sha512", "h1").unwrap();
        assert_eq!(sodium.file_size, 1024);
        assert_eq!(sodium.env_or_unknown().server, SideSupport::Unsupported);

        let lithium = manifest.file_for_hash("sha512", "h2").unwrap();
        assert_eq!(lithium.path, "mods/lithium.jar");
        assert_eq!(lithium.env_or_unknown(), FileEnv::default());
    }
}

use std::path::PathBuf;

use crate::core::catalog::DEFAULT_CATALOG_URL;

/// Invocation-wide settings, resolved from flags and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub pack_file: PathBuf,
    pub meta_folder: Option<String>,
    pub meta_folder_base: String,
    pub catalog_url: String,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pack_file: PathBuf::from("pack.toml"),
            meta_folder: None,
            meta_folder_base: ".".to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            verbose: false,
        }
    }
}

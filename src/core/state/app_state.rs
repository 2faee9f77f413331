use std::sync::Arc;

use reqwest::Client;

use super::settings::Settings;
use crate::core::catalog::{ModrinthClient, RateLimitRetry};
use crate::core::error::PackResult;
use crate::core::hash::{DefaultHashProvider, HashProvider};
use crate::core::http::build_http_client;
use crate::core::index::Index;
use crate::core::pack::Pack;
use crate::core::reconcile::{InstallSettings, SideSource, DEFAULT_CHECKPOINT_EVERY};

/// Collaborators shared by every command of one invocation.
pub struct AppState {
    pub settings: Settings,
    pub http_client: Client,
    pub hashes: Arc<dyn HashProvider>,
}

impl AppState {
    pub fn new(settings: Settings) -> PackResult<Self> {
        let http_client = build_http_client()?;
        Ok(Self {
            settings,
            http_client,
            hashes: Arc::new(DefaultHashProvider),
        })
    }

    pub fn catalog(&self) -> ModrinthClient {
        ModrinthClient::new(self.http_client.clone(), self.settings.catalog_url.clone())
    }

    pub fn load_pack(&self) -> PackResult<Pack> {
        Pack::load(&self.settings.pack_file)
    }

    pub fn load_index(&self, pack: &Pack) -> PackResult<Index> {
        pack.load_index(self.hashes.clone())
    }

    pub fn install_settings(&self, side_source: SideSource) -> InstallSettings {
        InstallSettings {
            meta_folder: self
                .settings
                .meta_folder
                .clone()
                .filter(|folder| !folder.is_empty()),
            meta_folder_base: self.settings.meta_folder_base.clone(),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            retry: RateLimitRetry::default(),
            side_source,
        }
    }
}

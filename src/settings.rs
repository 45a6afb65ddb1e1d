//! Settings view: server config, blocklists, redirects
//!
//! Loaded once when the tab is activated. No polling.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::Api;
use crate::collection::{Blocklists, Redirects};
use crate::error::RequestError;
use crate::models::{BlocklistEntry, Config, EntityId, NewBlocklist, NewRedirect, RedirectEntry};

pub const CONFIG_PATH: &str = "/api/config";

#[derive(Debug, Default)]
struct ConfigState {
    /// Last copy fetched from the server
    baseline: Option<Config>,
    /// Local edits, submitted as a whole
    draft: Config,
}

/// Read/update of the single config resource.
///
/// Field validation (port ranges, empty secret) is left to the caller;
/// the server receives exactly what the draft holds.
pub struct ConfigController {
    api: Api,
    state: RwLock<ConfigState>,
}

impl ConfigController {
    pub fn new(api: Api) -> Self {
        Self {
            api,
            state: RwLock::new(ConfigState::default()),
        }
    }

    /// Fetch the config, replacing both the baseline and the draft
    pub async fn load(&self) -> Result<Config, RequestError> {
        let config: Config = self.api.get(CONFIG_PATH).await?;
        let mut state = self.state.write();
        state.baseline = Some(config.clone());
        state.draft = config.clone();
        debug!("Config loaded: dns_port={} api_port={}", config.dns_port, config.api_port);
        Ok(config)
    }

    /// PUT the full object. On success it becomes the new baseline; on
    /// failure the draft and baseline are left as they were.
    pub async fn save(&self, draft: &Config) -> Result<(), RequestError> {
        self.api.put(CONFIG_PATH, draft).await?;
        let mut state = self.state.write();
        state.baseline = Some(draft.clone());
        state.draft = draft.clone();
        info!("Config saved");
        Ok(())
    }

    /// Submit the current draft
    pub async fn save_draft(&self) -> Result<(), RequestError> {
        let draft = self.draft();
        self.save(&draft).await
    }

    pub fn draft(&self) -> Config {
        self.state.read().draft.clone()
    }

    pub fn baseline(&self) -> Option<Config> {
        self.state.read().baseline.clone()
    }

    /// Edit the draft in place
    pub fn update_draft(&self, edit: impl FnOnce(&mut Config)) {
        edit(&mut self.state.write().draft);
    }

    pub fn set_draft(&self, draft: Config) {
        self.state.write().draft = draft;
    }

    /// Draft differs from what the server last reported
    pub fn is_dirty(&self) -> bool {
        let state = self.state.read();
        match &state.baseline {
            Some(baseline) => *baseline != state.draft,
            None => state.draft != Config::default(),
        }
    }
}

/// Everything on the Settings tab
pub struct SettingsView {
    pub config: ConfigController,
    pub blocklists: Blocklists,
    pub redirects: Redirects,
}

impl SettingsView {
    pub fn new(api: Api) -> Arc<Self> {
        Arc::new(Self {
            config: ConfigController::new(api.clone()),
            blocklists: Blocklists::new(api.clone()),
            redirects: Redirects::new(api),
        })
    }

    /// Load config, blocklists and redirects, stopping at the first failure
    pub async fn load_all(&self) -> Result<(), RequestError> {
        self.config.load().await?;
        self.blocklists.refresh().await?;
        self.redirects.refresh().await?;
        Ok(())
    }

    pub async fn add_blocklist(&self, url: impl Into<String>) -> Result<Arc<Vec<BlocklistEntry>>, RequestError> {
        self.blocklists
            .create_and_refresh(&NewBlocklist { url: url.into() })
            .await
    }

    pub async fn remove_blocklist(&self, id: &EntityId) -> Result<Arc<Vec<BlocklistEntry>>, RequestError> {
        self.blocklists.remove_and_refresh(id).await
    }

    pub async fn add_redirect(
        &self,
        domain: impl Into<String>,
        dns: impl Into<String>,
    ) -> Result<Arc<Vec<RedirectEntry>>, RequestError> {
        let draft = NewRedirect {
            domain: domain.into(),
            dns: dns.into(),
        };
        self.redirects.create_and_refresh(&draft).await
    }

    pub async fn remove_redirect(&self, id: &EntityId) -> Result<Arc<Vec<RedirectEntry>>, RequestError> {
        self.redirects.remove_and_refresh(id).await
    }
}

//! services/client/src/state.rs
//!
//! Wires the adapters together. `ClientState` is built once from `Config` and
//! handed to whatever drives the client (the CLI, or a UI shell).

use std::sync::Arc;

use crate::adapters::{
    FileSessionStorage, HttpAuthAdapter, HttpScenarioAdapter, HttpStoryAdapter, HttpTransport,
};
use crate::config::Config;
use crate::error::ClientError;
use decipher_core::navigation::{GuardPolicy, Navigator};
use decipher_core::ports::{ScenarioService, SessionStorage, StoryService};
use decipher_core::session::SessionStore;
use decipher_core::wizard::StoryWizard;

/// The shared client state, created once at startup.
#[derive(Clone)]
pub struct ClientState {
    pub config: Arc<Config>,
    pub session: Arc<SessionStore>,
    pub stories: Arc<dyn StoryService>,
    pub scenarios: Arc<dyn ScenarioService>,
    pub storage: Arc<dyn SessionStorage>,
}

impl ClientState {
    /// Builds the HTTP adapters and a file-backed session store.
    pub fn from_config(config: Config) -> Result<Self, ClientError> {
        let path = config
            .session_path
            .clone()
            .unwrap_or_else(FileSessionStorage::default_path);
        let storage: Arc<dyn SessionStorage> = Arc::new(FileSessionStorage::new(path));
        Self::with_storage(config, storage)
    }

    /// Same as [`ClientState::from_config`] but with caller-provided storage.
    pub fn with_storage(
        config: Config,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, ClientError> {
        let http = HttpTransport::new(&config.api_url, config.request_timeout)?;

        let auth = Arc::new(HttpAuthAdapter::new(http.clone()));
        let session = Arc::new(SessionStore::new(auth, storage.clone()));
        let stories = Arc::new(HttpStoryAdapter::new(http.clone(), storage.clone()));
        let scenarios = Arc::new(HttpScenarioAdapter::new(http, storage.clone()));

        Ok(Self {
            config: Arc::new(config),
            session,
            stories,
            scenarios,
            storage,
        })
    }

    /// A fresh wizard using the configured story model.
    pub fn wizard(&self) -> StoryWizard {
        StoryWizard::new(self.stories.clone(), self.config.story_model.clone())
    }

    pub fn navigator(&self, location: &str) -> Navigator {
        Navigator::new(location, GuardPolicy::default())
    }
}

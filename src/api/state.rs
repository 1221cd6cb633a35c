use std::sync::Arc;

use crate::{
    config::Config,
    db::{Cache, MemoryStore, Repository},
    models::WatchPolicy,
    services::providers::MetadataProvider,
};

/// Tunables shared by every request
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub genre_page_limit: u32,
    pub policy: WatchPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            genre_page_limit: config.genre_page_limit,
            policy: WatchPolicy {
                completion_ratio: config.completion_ratio,
                continue_watching_cap_seconds: config.continue_watching_cap_seconds,
            },
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub cache: Option<Cache>,
    pub metadata: Option<Arc<dyn MetadataProvider>>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, settings: Settings) -> Self {
        Self {
            repo,
            cache: None,
            metadata: None,
            settings,
        }
    }

    /// Empty in-memory store with default settings and no collaborators
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Settings::default())
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metadata(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(provider);
        self
    }

    pub fn repo(&self) -> &dyn Repository {
        self.repo.as_ref()
    }
}

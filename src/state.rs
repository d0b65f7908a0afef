use axum::extract::FromRef;

use crate::{config::Config, quiz::SessionRegistry, store::Stores};

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub sessions: SessionRegistry,
    pub config: Config,
}

impl AppState {
    pub fn new(stores: Stores, config: Config) -> Self {
        Self {
            stores,
            sessions: SessionRegistry::new(),
            config,
        }
    }
}

impl FromRef<AppState> for Stores {
    fn from_ref(state: &AppState) -> Self {
        state.stores.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

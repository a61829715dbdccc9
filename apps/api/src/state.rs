use std::sync::Arc;

use crate::config::Config;
use crate::sync::SyncController;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the single session; every route reads or mutates it through here.
    pub sync: Arc<SyncController>,
    pub config: Config,
}

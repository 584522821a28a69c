use std::sync::Arc;

use movies_auth::token::TokenManager;
use movies_dal::Pool;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool, tokens: TokenManager) -> Self {
        AppState {
            state: Arc::new(AppStateInner {
                app_config,
                pool,
                tokens,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.state.tokens
    }
}

// Validation context of `Garde` extractors
impl axum::extract::FromRef<AppState> for () {
    fn from_ref(_: &AppState) -> Self {}
}

struct AppStateInner {
    pool: Pool,
    app_config: AppConfig,
    tokens: TokenManager,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            default_page_size: 100,
        }
    }
}

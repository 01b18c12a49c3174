use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::reviews::ReviewStore;
use crate::database::tours::TourStore;
use crate::database::users::UserStore;
use crate::services::email::Mailer;
use crate::token::TokenService;

/// Shared per-request context. Configuration is resolved once at startup
/// and handed to each collaborator explicitly; nothing here mutates after
/// construction.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub tokens: TokenService,
    pub mailer: Arc<Mailer>,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig, mailer: Mailer) -> Self {
        let tokens = TokenService::new(&config.security);
        Self {
            db,
            config: Arc::new(config),
            tokens,
            mailer: Arc::new(mailer),
        }
    }

    pub fn tours(&self) -> TourStore {
        TourStore::new(self.db.clone())
    }

    pub fn users(&self) -> UserStore {
        UserStore::new(self.db.clone())
    }

    pub fn reviews(&self) -> ReviewStore {
        ReviewStore::new(self.db.clone())
    }
}

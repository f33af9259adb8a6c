use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::storage::{ImageStore, S3ImageStore};
use crate::users::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub jwt: Arc<JwtKeys>,
    pub storage: Arc<dyn ImageStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        // A bad signing key must stop the process before it serves anything.
        let jwt = Arc::new(JwtKeys::from_config(&config.jwt).context("jwt configuration")?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let storage = Arc::new(
            S3ImageStore::connect(&config.storage)
                .await
                .context("object storage")?,
        ) as Arc<dyn ImageStore>;

        Ok(Self::from_parts(
            Arc::new(PgUserStore::new(db)),
            jwt,
            storage,
            config,
        ))
    }

    pub fn from_parts(
        users: Arc<dyn UserStore>,
        jwt: Arc<JwtKeys>,
        storage: Arc<dyn ImageStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users,
            jwt,
            storage,
            config,
        }
    }

    /// State backed by in-memory user and object stores. The concrete
    /// handles are returned too so tests can inspect them.
    #[cfg(test)]
    pub fn fake() -> (
        Self,
        Arc<crate::users::memory::MemoryUserStore>,
        Arc<crate::storage::MemoryImageStore>,
    ) {
        let config = Arc::new(AppConfig::for_tests());
        let jwt = Arc::new(JwtKeys::from_config(&config.jwt).expect("test jwt config"));
        let users = Arc::new(crate::users::memory::MemoryUserStore::new());
        let storage = Arc::new(crate::storage::MemoryImageStore::default());
        let state = Self::from_parts(
            users.clone() as Arc<dyn UserStore>,
            jwt,
            storage.clone() as Arc<dyn ImageStore>,
            config,
        );
        (state, users, storage)
    }
}

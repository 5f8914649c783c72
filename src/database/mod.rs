//! Persistence of subscribers.
//! `Store` is the only thing the web layer talks to, it hides which backend is in use.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    config::{AppConfig, StoreBackend},
    web::types::NewSubscriber,
};

// ###################################
// ->   STRUCTS
// ###################################
/// What happened to a call to `Store::insert_or_ignore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A subscriber with the same email already exists, nothing was written.
    AlreadySubscribed,
}

/// A subscriber as it is stored.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SubscriberRecord {
    pub email: String,
    pub source: String,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
    pub subscribed_at: DateTime<Utc>,
}

impl SubscriberRecord {
    pub fn from_new(subscriber: &NewSubscriber, subscribed_at: DateTime<Utc>) -> Self {
        SubscriberRecord {
            email: subscriber.email.as_ref().to_string(),
            source: subscriber.source.clone(),
            ip_hash: subscriber.ip_hash.clone(),
            user_agent: subscriber.user_agent.clone(),
            subscribed_at,
        }
    }
}

/// The persistence collaborator.
/// Cheaply cloneable, both backends share their state between clones.
#[derive(Clone, Debug)]
pub enum Store {
    Postgres(PgStore),
    Memory(MemoryStore),
}

// ###################################
// ->   IMPLS
// ###################################
impl Store {
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let store = match config.store_config.backend {
            StoreBackend::Postgres => {
                let pg_store = PgStore::init(&config.db_config).await?;
                if config.store_config.migrate_on_start {
                    pg_store.migrate().await?;
                }
                Store::Postgres(pg_store)
            }
            StoreBackend::Memory => Store::Memory(MemoryStore::default()),
        };
        info!("{:<20} - {:?}", "store backend", config.store_config.backend);

        Ok(store)
    }

    /// Atomically writes the subscriber if no subscriber with the same email exists.
    /// A duplicate is not an error and never touches the stored record.
    pub async fn insert_or_ignore(&self, subscriber: &NewSubscriber) -> Result<InsertOutcome> {
        match self {
            Store::Postgres(pg) => pg.insert_or_ignore(subscriber).await,
            Store::Memory(mem) => mem.insert_or_ignore(subscriber),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<SubscriberRecord>> {
        match self {
            Store::Postgres(pg) => pg.find_by_email(email).await,
            Store::Memory(mem) => mem.find_by_email(email),
        }
    }

    pub async fn count(&self) -> Result<i64> {
        match self {
            Store::Postgres(pg) => pg.count().await,
            Store::Memory(mem) => mem.count(),
        }
    }
}

// ###################################
// ->   ERROR
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create db pool: {0}")]
    FailToCreatePool(String),
    #[error("in-memory store lock was poisoned")]
    MemoryStorePoisoned,
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("sqlx migration error: {0}")]
    SqlxMigrate(#[from] sqlx::migrate::MigrateError),
}

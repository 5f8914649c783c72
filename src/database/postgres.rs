use std::time::Duration;

use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{Error, InsertOutcome, Result, SubscriberRecord};
use crate::{config::DbConfig, web::types::NewSubscriber};

/// Subscribers live in the `subscribers` table, `UNIQUE(email)` does the deduplication.
#[derive(Clone, Debug)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn init(db_config: &DbConfig) -> Result<Self> {
        info!("{:<20} - Initializing the DB pool", "init_db");
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_millis(500))
            .connect_with(db_config.connection_options())
            .await
            .map_err(|ex| Error::FailToCreatePool(ex.to_string()))?;

        Ok(Self::from_pool(db_pool))
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("{:<20} - Running migrations", "migrate_db");
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }

    #[tracing::instrument(name = "Inserting subscriber into postgres", skip_all)]
    pub async fn insert_or_ignore(&self, subscriber: &NewSubscriber) -> Result<InsertOutcome> {
        let query_result = sqlx::query(
            r#"
        INSERT INTO subscribers (id, email, source, ip_hash, user_agent, subscribed_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO NOTHING
    "#,
        )
        .bind(Uuid::new_v4())
        .bind(subscriber.email.as_ref())
        .bind(&subscriber.source)
        .bind(subscriber.ip_hash.as_deref())
        .bind(subscriber.user_agent.as_deref())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        // ON CONFLICT DO NOTHING reports 0 affected rows for a duplicate.
        let outcome = if query_result.rows_affected() == 0 {
            InsertOutcome::AlreadySubscribed
        } else {
            InsertOutcome::Inserted
        };

        Ok(outcome)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<SubscriberRecord>> {
        let record = sqlx::query_as::<_, SubscriberRecord>(
            r#"SELECT email, source, ip_hash, user_agent, subscribed_at FROM subscribers
    WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscribers")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}

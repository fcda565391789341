use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use ws_common::lifecycle::{expiry_for, INITIAL_STATE};
use ws_common::token::new_subscription_id;
use ws_common::{ContentUpdate, Subscription, SubscriptionState};
use ws_config::DatabaseConfig;

use crate::{Result, StoreError, SubscriptionStore};

const SUBSCRIPTION_COLUMNS: &str =
    "subscription_id, hub_url, topic_url, secret, state, last_modified, expires_at";

const UPDATE_COLUMNS: &str = "subscription_id, hub_url, topic_url, timestamp, content_type, content";

/// SQLite-backed subscription store
pub struct SqliteSubscriptionStore {
    pool: Pool<Sqlite>,
}

impl SqliteSubscriptionStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open a pool for `config` and wrap it. Does not create the schema.
    ///
    /// In-memory databases are limited to a single connection, since every
    /// connection would otherwise see its own empty database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(config.create_if_missing)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
        let max_connections = if in_memory { 1 } else { config.max_connections };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            // Closing the only connection discards the database
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        info!(url = %config.url, max_connections, "Connected to subscription database");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(column: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidRow(format!("{} out of range: {}", column, millis)))
}

/// Current time at the precision the store persists
fn now_millis() -> i64 {
    to_millis(Utc::now())
}

fn conflict(subscription: &Subscription, to: SubscriptionState) -> StoreError {
    StoreError::StateConflict {
        id: subscription.id.clone(),
        from: subscription.state,
        to,
    }
}

fn parse_subscription(row: &SqliteRow) -> Result<Subscription> {
    let state: String = row.try_get("state")?;
    let state = SubscriptionState::from_str(&state)
        .map_err(|e| StoreError::InvalidRow(e.to_string()))?;

    let expires_at = match row.try_get::<Option<i64>, _>("expires_at")? {
        Some(ms) => Some(from_millis("expires_at", ms)?),
        None => None,
    };

    Ok(Subscription {
        id: row.try_get("subscription_id")?,
        hub_url: row.try_get("hub_url")?,
        topic_url: row.try_get("topic_url")?,
        secret: row.try_get("secret")?,
        state,
        last_modified: from_millis("last_modified", row.try_get("last_modified")?)?,
        expires_at,
    })
}

fn parse_update(row: &SqliteRow) -> Result<ContentUpdate> {
    Ok(ContentUpdate {
        subscription_id: row.try_get("subscription_id")?,
        hub_url: row.try_get("hub_url")?,
        topic_url: row.try_get("topic_url")?,
        timestamp: from_millis("timestamp", row.try_get("timestamp")?)?,
        content_type: row.try_get("content_type")?,
        content: row.try_get("content")?,
    })
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                subscription_id TEXT PRIMARY KEY,
                hub_url TEXT NOT NULL,
                topic_url TEXT NOT NULL,
                secret TEXT,
                state TEXT NOT NULL CHECK (state IN
                    ('subscribing', 'subscribed', 'denied', 'unsubscribing', 'unsubscribed')),
                last_modified INTEGER NOT NULL,
                expires_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_subscriptions_hub_topic
            ON subscriptions (hub_url, topic_url)
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Several deliveries may share a millisecond
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS updates (
                update_id INTEGER PRIMARY KEY AUTOINCREMENT,
                subscription_id TEXT NOT NULL,
                hub_url TEXT NOT NULL,
                topic_url TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                content_type TEXT NOT NULL,
                content BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_updates_subscription
            ON updates (subscription_id, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("SQLite subscription schema initialized");
        Ok(())
    }

    async fn create(&self, hub_url: &str, topic_url: &str) -> Result<Subscription> {
        let now = now_millis();
        let subscription = Subscription {
            id: new_subscription_id(),
            hub_url: hub_url.to_string(),
            topic_url: topic_url.to_string(),
            secret: None,
            state: INITIAL_STATE,
            last_modified: from_millis("last_modified", now)?,
            expires_at: None,
        };

        sqlx::query(&format!(
            "INSERT INTO subscriptions ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(&subscription.id)
        .bind(&subscription.hub_url)
        .bind(&subscription.topic_url)
        .bind(&subscription.secret)
        .bind(subscription.state.as_str())
        .bind(now)
        .bind(None::<i64>)
        .execute(&self.pool)
        .await?;

        debug!(
            subscription_id = %subscription.id,
            hub = %hub_url,
            topic = %topic_url,
            "Subscription created"
        );
        counter!("websub_store_subscriptions_created_total").increment(1);
        Ok(subscription)
    }

    async fn read(&self, id: &str) -> Result<Subscription> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE subscription_id = ?",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => parse_subscription(&row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn find_by_hub_and_topic(
        &self,
        hub_url: &str,
        topic_url: &str,
    ) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE hub_url = ? AND topic_url = ? ORDER BY last_modified, subscription_id",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(hub_url)
        .bind(topic_url)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_subscription).collect()
    }

    async fn change_state(
        &self,
        subscription: &mut Subscription,
        new_state: SubscriptionState,
        allowed: &[SubscriptionState],
        lease_seconds: Option<u64>,
    ) -> Result<()> {
        if allowed.is_empty() {
            return Err(conflict(subscription, new_state));
        }

        let now = now_millis();
        let expires_at = expiry_for(new_state, lease_seconds, from_millis("now", now)?)
            .map(to_millis);

        let placeholders = vec!["?"; allowed.len()].join(", ");
        let sql = format!(
            r#"
            UPDATE subscriptions
            SET state = ?, last_modified = MAX(last_modified, ?), expires_at = ?
            WHERE subscription_id = ? AND state IN ({})
            RETURNING last_modified
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(new_state.as_str())
            .bind(now)
            .bind(expires_at)
            .bind(&subscription.id);
        for state in allowed {
            query = query.bind(state.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;

        match rows.len() {
            0 => {
                warn!(
                    subscription_id = %subscription.id,
                    snapshot_state = %subscription.state,
                    target = %new_state,
                    "State transition rejected"
                );
                counter!(
                    "websub_store_transitions_total",
                    "target" => new_state.as_str(),
                    "outcome" => "conflict"
                )
                .increment(1);
                Err(conflict(subscription, new_state))
            }
            1 => {
                let last_modified: i64 = rows[0].try_get("last_modified")?;
                let expires_at = match expires_at {
                    Some(ms) => Some(from_millis("expires_at", ms)?),
                    None => None,
                };

                debug!(
                    subscription_id = %subscription.id,
                    from = %subscription.state,
                    to = %new_state,
                    "State transition applied"
                );
                counter!(
                    "websub_store_transitions_total",
                    "target" => new_state.as_str(),
                    "outcome" => "applied"
                )
                .increment(1);

                subscription.state = new_state;
                subscription.last_modified = from_millis("last_modified", last_modified)?;
                subscription.expires_at = expires_at;
                Ok(())
            }
            n => {
                error!(
                    subscription_id = %subscription.id,
                    rows = n,
                    "Conditional update matched more than one subscription"
                );
                panic!(
                    "subscription id {} is not unique: conditional update matched {} rows",
                    subscription.id, n
                );
            }
        }
    }

    async fn append_update(
        &self,
        subscription: &Subscription,
        content_type: &str,
        content: &[u8],
    ) -> Result<ContentUpdate> {
        let now = now_millis();

        sqlx::query(&format!(
            "INSERT INTO updates ({}) VALUES (?, ?, ?, ?, ?, ?)",
            UPDATE_COLUMNS
        ))
        .bind(&subscription.id)
        .bind(&subscription.hub_url)
        .bind(&subscription.topic_url)
        .bind(now)
        .bind(content_type)
        .bind(content)
        .execute(&self.pool)
        .await?;

        debug!(
            subscription_id = %subscription.id,
            content_type = %content_type,
            bytes = content.len(),
            "Content update stored"
        );
        counter!("websub_store_updates_appended_total").increment(1);

        Ok(ContentUpdate {
            subscription_id: subscription.id.clone(),
            hub_url: subscription.hub_url.clone(),
            topic_url: subscription.topic_url.clone(),
            timestamp: from_millis("timestamp", now)?,
            content_type: content_type.to_string(),
            content: content.to_vec(),
        })
    }

    async fn list_updates(&self, subscription_id: &str) -> Result<Vec<ContentUpdate>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM updates WHERE subscription_id = ? ORDER BY update_id",
            UPDATE_COLUMNS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_update).collect()
    }
}

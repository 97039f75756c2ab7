//! SqliteQueueStore - durable queue store on sqlx/sqlite.
//!
//! Schema lives in `migrations/` and is applied on open. Rows only ever hold
//! `pending`, `completed` or `failed`; the in-flight marker stays in memory.
//! Every status change is one conditional `UPDATE` guarded by the status and
//! retry count the change was computed from.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use ulid::Ulid;

use super::processing::ProcessingCell;
use crate::domain::{
    EventId, EventPayload, EventStatus, EventType, NewEvent, QueuedEvent, StatusTransition,
    StoreError,
};
use crate::ports::{
    Clock, IdGenerator, ProcessingFlag, QueueCounts, QueueStore, SystemClock, UlidGenerator,
};

const SELECT_EVENT: &str = r#"
    SELECT id, event_type, payload, status, retry_count, max_retries,
           created_at, updated_at, last_error
    FROM queued_events
"#;

pub struct SqliteQueueStore {
    pool: SqlitePool,
    processing: ProcessingCell,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl SqliteQueueStore {
    /// Open (creating if needed) a database file and bring its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!(path = %path.as_ref().display(), "opened queue database");
        Self::from_pool(pool, Arc::new(SystemClock)).await
    }

    /// A private in-memory database. Contents vanish with the store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // one connection that never idles out, or the database goes with it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool, Arc::new(SystemClock)).await
    }

    pub async fn from_pool(pool: SqlitePool, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;

        // delivered before a crash, removal never happened
        let purged = sqlx::query("DELETE FROM queued_events WHERE status = 'completed'")
            .execute(&pool)
            .await?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "removed completed events left by a previous run");
        }

        Ok(Self {
            pool,
            processing: ProcessingCell::default(),
            ids: Arc::new(UlidGenerator::new(clock.clone())),
            clock,
        })
    }

    /// Replace the clock used for `created_at`/`updated_at` and id timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(clock.clone()));
        self.clock = clock;
        self
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch(&self, id: EventId) -> Result<Option<QueuedEvent>, StoreError> {
        let sql = format!("{SELECT_EVENT} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.as_ulid().to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_event).transpose()
    }

    async fn list(&self, status: EventStatus) -> Result<Vec<QueuedEvent>, StoreError> {
        let sql = format!("{SELECT_EVENT} WHERE status = ?1 ORDER BY created_at ASC, id ASC");
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event = self.processing.overlay(row_to_event(row)?);
            if event.status == status {
                events.push(event);
            }
        }
        Ok(events)
    }
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    // fixed-width, so text order is time order
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn row_to_event(row: SqliteRow) -> Result<QueuedEvent, StoreError> {
    let raw_id: String = row.try_get("id")?;
    let corrupt = |reason: String| StoreError::Corrupt {
        id: raw_id.clone(),
        reason,
    };

    let id = Ulid::from_string(&raw_id)
        .map(EventId::from_ulid)
        .map_err(|e| corrupt(format!("bad id: {e}")))?;

    let event_type: String = row.try_get("event_type")?;
    let event_type = EventType::parse(&event_type)
        .ok_or_else(|| corrupt(format!("unknown event type {event_type:?}")))?;

    let payload: String = row.try_get("payload")?;
    let payload: EventPayload =
        serde_json::from_str(&payload).map_err(|e| corrupt(format!("bad payload: {e}")))?;
    if payload.event_type() != event_type {
        return Err(corrupt(format!(
            "payload is {} but row says {event_type}",
            payload.event_type()
        )));
    }

    let status: String = row.try_get("status")?;
    let status =
        EventStatus::parse(&status).ok_or_else(|| corrupt(format!("unknown status {status:?}")))?;

    let count = |column: &str| -> Result<u32, StoreError> {
        let value: i64 = row.try_get(column)?;
        u32::try_from(value).map_err(|_| corrupt(format!("{column} out of range: {value}")))
    };
    let retry_count = count("retry_count")?;
    let max_retries = count("max_retries")?;

    let ts = |column: &str| -> Result<DateTime<Utc>, StoreError> {
        let value: String = row.try_get(column)?;
        DateTime::parse_from_rfc3339(&value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("bad {column}: {e}")))
    };
    let created_at = ts("created_at")?;
    let updated_at = ts("updated_at")?;

    Ok(QueuedEvent {
        id,
        event_type,
        payload,
        status,
        retry_count,
        max_retries,
        created_at,
        updated_at,
        last_error: row.try_get("last_error")?,
    })
}

fn status_count(status: &str, n: i64) -> Result<usize, StoreError> {
    usize::try_from(n).map_err(|_| StoreError::Corrupt {
        id: format!("status:{status}"),
        reason: format!("count out of range: {n}"),
    })
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn add_event(&self, event: NewEvent) -> Result<EventId, StoreError> {
        let id = self.ids.generate_event_id();
        let record = QueuedEvent::new(id, event, self.clock.now());
        let payload = serde_json::to_string(&record.payload)?;

        sqlx::query(
            r#"
            INSERT INTO queued_events (
                id, event_type, payload, status, retry_count, max_retries,
                created_at, updated_at, last_error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)
            "#,
        )
        .bind(id.as_ulid().to_string())
        .bind(record.event_type.as_str())
        .bind(payload)
        .bind(record.status.as_str())
        .bind(i64::from(record.retry_count))
        .bind(i64::from(record.max_retries))
        .bind(encode_ts(record.created_at))
        .bind(encode_ts(record.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_pending_events(&self) -> Result<Vec<QueuedEvent>, StoreError> {
        self.list(EventStatus::Pending).await
    }

    async fn get_failed_events(&self) -> Result<Vec<QueuedEvent>, StoreError> {
        self.list(EventStatus::Failed).await
    }

    async fn get_event(&self, id: EventId) -> Result<Option<QueuedEvent>, StoreError> {
        Ok(self
            .fetch(id)
            .await?
            .map(|event| self.processing.overlay(event)))
    }

    async fn update_event_status(
        &self,
        id: EventId,
        transition: StatusTransition,
    ) -> Result<(), StoreError> {
        let stored = self.fetch(id).await?.ok_or(StoreError::NotFound(id))?;
        let (stored_status, stored_retries) = (stored.status, stored.retry_count);

        let mut event = self.processing.overlay(stored);
        let from = event.status;
        event.apply(&transition, self.clock.now())?;

        if transition == StatusTransition::Processing {
            self.processing.mark_in_flight(id);
            return Ok(());
        }

        let durable = event.durable();
        let updated = sqlx::query(
            r#"
            UPDATE queued_events
            SET status = ?1,
                retry_count = ?2,
                last_error = ?3,
                updated_at = ?4
            WHERE id = ?5 AND status = ?6 AND retry_count = ?7
            "#,
        )
        .bind(durable.status.as_str())
        .bind(i64::from(durable.retry_count))
        .bind(durable.last_error.as_deref())
        .bind(encode_ts(durable.updated_at))
        .bind(id.as_ulid().to_string())
        .bind(stored_status.as_str())
        .bind(i64::from(stored_retries))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated != 1 {
            // another writer moved the row between our read and write
            return Err(StoreError::InvalidTransition {
                id,
                from,
                to: transition.to_status(),
            });
        }

        self.processing.settle(id);
        Ok(())
    }

    async fn remove_event(&self, id: EventId) -> Result<(), StoreError> {
        let removed = sqlx::query("DELETE FROM queued_events WHERE id = ?1 AND status = 'completed'")
            .bind(id.as_ulid().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if removed == 1 {
            return Ok(());
        }
        match self.get_event(id).await? {
            None => Err(StoreError::NotFound(id)),
            Some(event) => Err(StoreError::NotCompleted {
                id,
                status: event.status,
            }),
        }
    }

    async fn set_processing_flag(
        &self,
        active: bool,
        event_id: Option<EventId>,
    ) -> Result<(), StoreError> {
        self.processing.set(active, event_id);
        Ok(())
    }

    async fn processing_flag(&self) -> Result<ProcessingFlag, StoreError> {
        Ok(self.processing.get())
    }

    async fn try_acquire_processing(&self) -> Result<bool, StoreError> {
        Ok(self.processing.try_acquire())
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM queued_events GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let n = status_count(&status, row.try_get("n")?)?;
            match EventStatus::parse(&status) {
                Some(EventStatus::Pending) => counts.pending = n,
                Some(EventStatus::Failed) => counts.failed = n,
                Some(_) => {}
                None => {
                    return Err(StoreError::Corrupt {
                        id: format!("status:{status}"),
                        reason: format!("{n} rows with unknown status"),
                    });
                }
            }
        }

        let flag = self.processing.get();
        if flag.event_id.is_some() {
            // the in-flight row is still `pending` on disk
            counts.pending = counts.pending.saturating_sub(1);
        }
        counts.processing = flag.active;
        Ok(counts)
    }
}

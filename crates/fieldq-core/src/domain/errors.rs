//! エラー型と運用上の分類

use thiserror::Error;

use super::ids::EventId;
use super::state::EventStatus;

/// processor が失敗をどう扱うか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 後のパスでリトライ
    Transient,
    /// リトライしても無駄。即 `Failed`
    Permanent,
    /// 永続化の境界自体が壊れた。現在の操作を中断する
    Infrastructure,
}

/// Queue store の失敗。握りつぶさない（ここで write を失うとユーザー操作が消える）
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Database(String),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event {0} not found")]
    NotFound(EventId),

    #[error("event {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: EventId,
        from: EventStatus,
        to: EventStatus,
    },

    #[error("event {id} is {status}; only completed events can be removed")]
    NotCompleted { id: EventId, status: EventStatus },

    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Infrastructure
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Database(format!("migration: {err}"))
    }
}

/// Failure reported by a domain operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    /// The server answered with an error status. Retried like any transient failure.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The collaborator knows this payload will never be accepted.
    #[error("rejected: {message}")]
    Rejected { message: String },
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::Rejected { .. } => ErrorKind::Permanent,
            _ => ErrorKind::Transient,
        }
    }
}

/// Event Manager への送信の失敗
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// 直接送信が失敗し、キューへのフォールバック書き込みも失敗した
    #[error("could not queue event after delivery failure ({delivery}): {source}")]
    Store {
        delivery: DeliveryError,
        #[source]
        source: StoreError,
    },

    /// 意図的に遅延させた enqueue を永続化できなかった
    #[error("could not queue event: {0}")]
    Persist(#[from] StoreError),
}

/// 処理パスを中断させた失敗
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("queue store failure during pass: {0}")]
    Store(#[from] StoreError),
}

/// OS のバックグラウンド実行機構の失敗
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackgroundError {
    #[error("background execution unavailable: {0}")]
    Unavailable(String),

    #[error("background registration failed: {0}")]
    Registration(String),
}

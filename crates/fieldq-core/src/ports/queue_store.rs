//! QueueStore port - キューイベントの永続ストア（唯一の真実の源）
//!
//! # 契約
//! - すべてのメソッドは完了するか `StoreError` を返す。
//!   書けていない write を書けたように見せてはいけない
//! - `update_event_status` は 1 回の atomic な write。並行する読み手には
//!   遷移前か遷移後のどちらかしか見えない
//! - `Processing` は永続化しない。processing flag はプロセスローカルなので、
//!   再起動後は配送途中だったイベントも `Pending` として読み出される

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{EventId, NewEvent, QueuedEvent, StatusTransition, StoreError};

/// プロセス全体で共有する「パス実行中」マーカー
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingFlag {
    pub active: bool,
    /// 配送中のイベント（あれば）
    pub event_id: Option<EventId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub failed: usize,
    pub processing: bool,
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// 新しい `Pending` イベントを永続化して ID を返す
    async fn add_event(&self, event: NewEvent) -> Result<EventId, StoreError>;

    /// `Pending` のイベントを古い順に返す（読み取りのみ）
    ///
    /// 同じ `created_at` のイベントは ID 順 = 追加順
    async fn get_pending_events(&self) -> Result<Vec<QueuedEvent>, StoreError>;

    /// オペレータ確認用に残している終端失敗イベント（古い順）
    async fn get_failed_events(&self) -> Result<Vec<QueuedEvent>, StoreError>;

    /// 1 件取得。flag が指しているイベントは `Processing` として返す
    async fn get_event(&self, id: EventId) -> Result<Option<QueuedEvent>, StoreError>;

    /// 遷移を 1 つ atomic に適用
    async fn update_event_status(
        &self,
        id: EventId,
        transition: StatusTransition,
    ) -> Result<(), StoreError>;

    /// `Completed` のイベントを削除
    async fn remove_event(&self, id: EventId) -> Result<(), StoreError>;

    /// `Failed` のイベントをリトライ回数をリセットして `Pending` に戻す
    async fn retry_failed_event(&self, id: EventId) -> Result<(), StoreError> {
        self.update_event_status(id, StatusTransition::ManualRetry)
            .await
    }

    /// パスの実行状態と配送中イベントを記録
    async fn set_processing_flag(
        &self,
        active: bool,
        event_id: Option<EventId>,
    ) -> Result<(), StoreError>;

    async fn processing_flag(&self) -> Result<ProcessingFlag, StoreError>;

    /// flag が空いていれば atomic に取得。`false` は他のパスが保持中
    async fn try_acquire_processing(&self) -> Result<bool, StoreError>;

    async fn counts(&self) -> Result<QueueCounts, StoreError>;
}

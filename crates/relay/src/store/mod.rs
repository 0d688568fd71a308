pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::turn_log::Role;

pub use memory::MemoryStore;

/// A finalized utterance, durable and immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    /// Assigned by the store on insert.
    pub id: Uuid,
    /// Session partition key; all participants in one call share one id.
    pub session_id: String,
    /// Originating participant, used for echo suppression.
    pub speaker_id: String,
    pub source_text: String,
    /// Insertion timestamp, used only for ordering/display.
    pub created_at: DateTime<Utc>,
}

/// A transcript to insert; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewTranscript {
    pub session_id: String,
    pub speaker_id: String,
    pub source_text: String,
}

/// A durable conversation-history entry.
///
/// History entries live outside the session-partitioned notification stream:
/// they are readable by late joiners and history views but never delivered
/// to insert subscribers. Keeping them out of the stream is what prevents a
/// participant's synthesized agent utterances from being re-translated by
/// everyone else in a loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub session_id: String,
    pub speaker_id: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A history entry to insert; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub session_id: String,
    pub speaker_id: String,
    pub role: Role,
    pub text: String,
}

/// A request to translate one transcript into one target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub transcript_id: Uuid,
    pub target_language: String,
}

/// Change notification for a transcript insert.
///
/// Carries ids only. Subscribers must fetch the full record; the payload is
/// never trusted to be complete.
#[derive(Debug, Clone)]
pub struct InsertNotification {
    pub transcript_id: Uuid,
    pub session_id: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("insert rejected: {0}")]
    Insert(String),
    #[error("subscription failed: {0}")]
    Subscribe(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The durable, session-shared append+subscribe store.
///
/// Consumed as an opaque collaborator: this pipeline only ever inserts,
/// fetches by id, and subscribes to session-scoped insert notifications.
/// Records are never updated or deleted here.
#[async_trait]
pub trait TranscriptStore: Send + Sync + 'static {
    async fn insert_transcript(&self, new: NewTranscript) -> StoreResult<TranscriptRecord>;

    /// Must only be called with the id of a transcript that was successfully
    /// inserted; a request must never reference a nonexistent transcript.
    async fn insert_translation_request(
        &self,
        request: TranslationRequest,
    ) -> StoreResult<TranslationRequest>;

    /// Inserts a conversation-history entry. History inserts never produce
    /// insert notifications.
    async fn insert_history(&self, entry: NewHistoryEntry) -> StoreResult<HistoryRecord>;

    async fn find_transcript(&self, id: Uuid) -> StoreResult<TranscriptRecord>;

    /// Opens a notification stream for transcript inserts in one session.
    /// Dropping the receiver unsubscribes.
    async fn subscribe_inserts(
        &self,
        session_id: &str,
    ) -> StoreResult<broadcast::Receiver<InsertNotification>>;
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::{
    HistoryRecord, InsertNotification, NewHistoryEntry, NewTranscript, StoreError, StoreResult,
    TranscriptRecord, TranscriptStore, TranslationRequest,
};

const CHANNEL_CAPACITY: usize = 256;

/// In-process `TranscriptStore` over a per-session broadcast channel.
///
/// Used by the integration tests and by embedders that run without a remote
/// store. The failure switches let callers exercise the partial-failure
/// contracts of the relay (transcript insert rejected, or request insert
/// rejected after the transcript succeeded).
pub struct MemoryStore {
    transcripts: Mutex<HashMap<Uuid, TranscriptRecord>>,
    requests: Mutex<Vec<TranslationRequest>>,
    history: Mutex<Vec<HistoryRecord>>,
    /// session_id -> insert notification channel.
    channels: DashMap<String, broadcast::Sender<InsertNotification>>,
    fail_transcript_inserts: AtomicBool,
    fail_request_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            transcripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            channels: DashMap::new(),
            fail_transcript_inserts: AtomicBool::new(false),
            fail_request_inserts: AtomicBool::new(false),
        }
    }

    /// Rejects all subsequent transcript inserts while `fail` is set.
    pub fn fail_transcript_inserts(&self, fail: bool) {
        self.fail_transcript_inserts.store(fail, Ordering::SeqCst);
    }

    /// Rejects all subsequent translation-request inserts while `fail` is set.
    pub fn fail_request_inserts(&self, fail: bool) {
        self.fail_request_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn transcript_count(&self) -> usize {
        self.transcripts.lock().len()
    }

    pub fn translation_requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().clone()
    }

    /// History entries for one session, oldest first.
    pub fn session_history(&self, session_id: &str) -> Vec<HistoryRecord> {
        self.history
            .lock()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Transcripts for one session, oldest first.
    pub fn session_transcripts(&self, session_id: &str) -> Vec<TranscriptRecord> {
        let mut records: Vec<TranscriptRecord> = self
            .transcripts
            .lock()
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    fn channel(&self, session_id: &str) -> broadcast::Sender<InsertNotification> {
        self.channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn insert_transcript(&self, new: NewTranscript) -> StoreResult<TranscriptRecord> {
        if self.fail_transcript_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Insert("transcript inserts disabled".into()));
        }

        let record = TranscriptRecord {
            id: Uuid::new_v4(),
            session_id: new.session_id,
            speaker_id: new.speaker_id,
            source_text: new.source_text,
            created_at: Utc::now(),
        };
        self.transcripts.lock().insert(record.id, record.clone());

        // Delivery is best-effort; a session with no subscribers is fine.
        let notification = InsertNotification {
            transcript_id: record.id,
            session_id: record.session_id.clone(),
        };
        if self.channel(&record.session_id).send(notification).is_err() {
            debug!(session_id = %record.session_id, "No insert subscribers");
        }

        Ok(record)
    }

    async fn insert_translation_request(
        &self,
        request: TranslationRequest,
    ) -> StoreResult<TranslationRequest> {
        if self.fail_request_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Insert("translation-request inserts disabled".into()));
        }
        if !self.transcripts.lock().contains_key(&request.transcript_id) {
            return Err(StoreError::Insert(format!(
                "unknown transcript {}",
                request.transcript_id
            )));
        }
        self.requests.lock().push(request.clone());
        Ok(request)
    }

    async fn insert_history(&self, entry: NewHistoryEntry) -> StoreResult<HistoryRecord> {
        let record = HistoryRecord {
            id: Uuid::new_v4(),
            session_id: entry.session_id,
            speaker_id: entry.speaker_id,
            role: entry.role,
            text: entry.text,
            created_at: Utc::now(),
        };
        self.history.lock().push(record.clone());
        Ok(record)
    }

    async fn find_transcript(&self, id: Uuid) -> StoreResult<TranscriptRecord> {
        self.transcripts
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn subscribe_inserts(
        &self,
        session_id: &str,
    ) -> StoreResult<broadcast::Receiver<InsertNotification>> {
        Ok(self.channel(session_id).subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifications_are_scoped_to_the_session() {
        let store = MemoryStore::new();
        let mut s1 = store.subscribe_inserts("s1").await.unwrap();
        let mut s2 = store.subscribe_inserts("s2").await.unwrap();

        store
            .insert_transcript(NewTranscript {
                session_id: "s1".into(),
                speaker_id: "A".into(),
                source_text: "hello".into(),
            })
            .await
            .unwrap();

        let note = s1.recv().await.unwrap();
        assert_eq!(note.session_id, "s1");
        assert!(s2.try_recv().is_err(), "other session must see nothing");
    }

    #[tokio::test]
    async fn history_inserts_do_not_notify() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe_inserts("s1").await.unwrap();

        store
            .insert_history(NewHistoryEntry {
                session_id: "s1".into(),
                speaker_id: "B".into(),
                role: crate::turn_log::Role::Agent,
                text: "Bonjour".into(),
            })
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(store.session_history("s1").len(), 1);
    }

    #[tokio::test]
    async fn request_insert_requires_existing_transcript() {
        let store = MemoryStore::new();
        let err = store
            .insert_translation_request(TranslationRequest {
                transcript_id: Uuid::new_v4(),
                target_language: "de".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Insert(_)));
    }

    #[tokio::test]
    async fn fetch_by_id_round_trips() {
        let store = MemoryStore::new();
        let record = store
            .insert_transcript(NewTranscript {
                session_id: "s1".into(),
                speaker_id: "A".into(),
                source_text: "hello".into(),
            })
            .await
            .unwrap();

        let fetched = store.find_transcript(record.id).await.unwrap();
        assert_eq!(fetched.source_text, "hello");
        assert_eq!(fetched.speaker_id, "A");

        assert!(matches!(
            store.find_transcript(Uuid::new_v4()).await,
            Err(StoreError::NotFound)
        ));
    }
}

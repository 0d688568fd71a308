use std::sync::Arc;

use tracing::{debug, warn};

use crate::store::{
    HistoryRecord, NewHistoryEntry, NewTranscript, TranscriptRecord, TranscriptStore,
    TranslationRequest,
};
use crate::turn_log::Role;

/// Metadata accompanying a transcript published for translation.
#[derive(Debug, Clone)]
pub struct TranslationMetadata {
    /// Source language tag; `"auto"` when the recognizer detects it.
    pub source_lang: String,
    pub target_lang: String,
    pub target_locale: String,
    pub speaker_style: String,
    pub speaker_id: String,
    pub session_id: String,
}

/// A transcript and its translation request, both durably inserted.
#[derive(Debug, Clone)]
pub struct PublishedTranslation {
    pub transcript: TranscriptRecord,
    pub request: TranslationRequest,
}

/// Publishes finalized utterances to the durable store.
///
/// Delivery is best-effort: a failed insert is a dropped utterance, logged
/// and never retried. The speaker naturally repeats; blocking the
/// conversation would cost more than the duplicated effort.
pub struct TranscriptRelay {
    store: Arc<dyn TranscriptStore>,
}

impl TranscriptRelay {
    pub fn new(store: Arc<dyn TranscriptStore>) -> Self {
        Self { store }
    }

    /// Durably logs a finalized utterance into the conversation history.
    /// No-op on empty/whitespace text.
    ///
    /// History entries sit outside the session-scoped notification stream,
    /// so nothing logged here ever re-enters the translation path.
    pub async fn publish_final(
        &self,
        role: Role,
        text: &str,
        speaker_id: &str,
        session_id: &str,
    ) -> Option<HistoryRecord> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        match self
            .store
            .insert_history(NewHistoryEntry {
                session_id: session_id.to_string(),
                speaker_id: speaker_id.to_string(),
                role,
                text: text.to_string(),
            })
            .await
        {
            Ok(record) => {
                debug!(%session_id, history_id = %record.id, "Utterance logged to history");
                Some(record)
            }
            Err(e) => {
                warn!(%session_id, %e, "History insert failed, utterance dropped");
                None
            }
        }
    }

    /// Durably logs a finalized utterance and registers a translation
    /// request for it.
    ///
    /// The transcript is inserted first; if that fails, no request is
    /// created (a request must never reference a nonexistent transcript).
    /// If the request insert fails afterwards, the transcript stays as a
    /// durable log entry but no translation happens for it — an accepted
    /// partial state.
    pub async fn publish_for_translation(
        &self,
        text: &str,
        meta: &TranslationMetadata,
    ) -> Option<PublishedTranslation> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let transcript = match self
            .store
            .insert_transcript(NewTranscript {
                session_id: meta.session_id.clone(),
                speaker_id: meta.speaker_id.clone(),
                source_text: text.to_string(),
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!(session_id = %meta.session_id, %e, "Transcript insert failed, utterance dropped");
                return None;
            }
        };

        let request = match self
            .store
            .insert_translation_request(TranslationRequest {
                transcript_id: transcript.id,
                target_language: meta.target_lang.clone(),
            })
            .await
        {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    transcript_id = %transcript.id,
                    %e,
                    "Translation request insert failed; transcript logged but not translated"
                );
                return None;
            }
        };

        debug!(
            transcript_id = %transcript.id,
            target_lang = %request.target_language,
            "Transcript queued for translation"
        );
        Some(PublishedTranslation { transcript, request })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn meta() -> TranslationMetadata {
        TranslationMetadata {
            source_lang: "auto".into(),
            target_lang: "de".into(),
            target_locale: "de-DE".into(),
            speaker_style: "neutral, clear".into(),
            speaker_id: "A".into(),
            session_id: "s1".into(),
        }
    }

    #[tokio::test]
    async fn whitespace_only_text_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let relay = TranscriptRelay::new(store.clone());

        assert!(relay.publish_final(Role::User, "   ", "A", "s1").await.is_none());
        assert!(relay.publish_for_translation("\n\t", &meta()).await.is_none());
        assert_eq!(store.transcript_count(), 0);
        assert!(store.session_history("s1").is_empty());
    }

    #[tokio::test]
    async fn publish_final_writes_history_only() {
        let store = Arc::new(MemoryStore::new());
        let relay = TranscriptRelay::new(store.clone());

        let record = relay
            .publish_final(Role::Agent, "Bonjour tout le monde.", "B", "s1")
            .await
            .unwrap();
        assert_eq!(record.role, Role::Agent);
        assert_eq!(record.text, "Bonjour tout le monde.");
        assert_eq!(store.transcript_count(), 0, "history must not create transcripts");
    }

    #[tokio::test]
    async fn publish_for_translation_inserts_both_records() {
        let store = Arc::new(MemoryStore::new());
        let relay = TranscriptRelay::new(store.clone());

        let published = relay
            .publish_for_translation("  Hold on a sec.  ", &meta())
            .await
            .unwrap();
        assert_eq!(published.transcript.source_text, "Hold on a sec.");
        assert_eq!(published.request.transcript_id, published.transcript.id);
        assert_eq!(published.request.target_language, "de");
        assert_eq!(store.translation_requests().len(), 1);
    }

    #[tokio::test]
    async fn transcript_failure_creates_no_request() {
        let store = Arc::new(MemoryStore::new());
        store.fail_transcript_inserts(true);
        let relay = TranscriptRelay::new(store.clone());

        assert!(relay.publish_for_translation("hello", &meta()).await.is_none());
        assert_eq!(store.transcript_count(), 0);
        assert!(store.translation_requests().is_empty());
    }

    #[tokio::test]
    async fn request_failure_keeps_the_transcript() {
        let store = Arc::new(MemoryStore::new());
        store.fail_request_inserts(true);
        let relay = TranscriptRelay::new(store.clone());

        assert!(relay.publish_for_translation("hello", &meta()).await.is_none());
        assert_eq!(store.transcript_count(), 1);
        assert!(store.translation_requests().is_empty());
    }
}

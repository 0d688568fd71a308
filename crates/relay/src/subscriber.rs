use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::SettingsProvider;
use crate::generative::GenerativeClient;
use crate::languages;
use crate::prompt::{TranslationPromptParams, build_translation_prompt};
use crate::store::{InsertNotification, StoreResult, TranscriptStore};
use crate::task::AbortOnDrop;

/// Listens to the session's transcript-insert stream and forwards every
/// other participant's utterance to the generative client as a text-only
/// translation prompt.
///
/// Lifecycle follows the generative connection: subscribed while connected,
/// inactive otherwise. Re-subscribing always unsubscribes first so a session
/// or connection change never double-delivers.
pub struct TranslationSubscriber {
    store: Arc<dyn TranscriptStore>,
    client: Arc<dyn GenerativeClient>,
    settings: Arc<SettingsProvider>,
    active: Mutex<Option<AbortOnDrop>>,
}

impl TranslationSubscriber {
    pub fn new(
        store: Arc<dyn TranscriptStore>,
        client: Arc<dyn GenerativeClient>,
        settings: Arc<SettingsProvider>,
    ) -> Self {
        Self {
            store,
            client,
            settings,
            active: Mutex::new(None),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Opens the session-scoped insert subscription and starts delivering.
    pub async fn subscribe(&self) -> StoreResult<()> {
        self.unsubscribe();

        let session_id = self.settings.snapshot().session_id.clone();
        let mut rx = self.store.subscribe_inserts(&session_id).await?;
        info!(%session_id, "Translation subscriber started");

        let store = Arc::clone(&self.store);
        let client = Arc::clone(&self.client);
        let settings = Arc::clone(&self.settings);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(note) => {
                        Self::handle_notification(&*store, &*client, &settings, note).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Missed translations are dropped utterances, not
                        // errors; the speaker repeats.
                        warn!(skipped, "Insert notifications lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Insert channel closed, subscriber exiting");
        });

        *self.active.lock() = Some(AbortOnDrop(task));
        Ok(())
    }

    /// Stops delivery. Must be called before the generative connection is
    /// considered closed, so no notification arrives with nowhere to go.
    pub fn unsubscribe(&self) {
        if self.active.lock().take().is_some() {
            debug!("Translation subscriber stopped");
        }
    }

    async fn handle_notification(
        store: &dyn TranscriptStore,
        client: &dyn GenerativeClient,
        settings: &SettingsProvider,
        note: InsertNotification,
    ) {
        let snapshot = settings.snapshot();
        if note.session_id != snapshot.session_id {
            // Settings moved to another session after we subscribed.
            return;
        }

        // The notification payload is not trusted to be complete; always
        // fetch the full record.
        let record = match store.find_transcript(note.transcript_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(transcript_id = %note.transcript_id, %e, "Transcript fetch failed, discarding");
                return;
            }
        };

        // Echo suppression: never re-translate our own speech.
        if record.speaker_id == snapshot.speaker_id {
            debug!(transcript_id = %record.id, "Skipping own speech");
            return;
        }

        let text = record.source_text.trim();
        if text.is_empty() {
            debug!(transcript_id = %record.id, "No source text, discarding");
            return;
        }

        let lang = languages::resolve_label(&snapshot.language);
        let prompt = build_translation_prompt(&TranslationPromptParams {
            source_lang: "auto",
            target_lang: lang.code,
            target_locale: lang.locale,
            speaker_style: &snapshot.speaker_style,
            text,
        });

        debug!(
            transcript_id = %record.id,
            target_lang = %lang.code,
            "Forwarding translation prompt"
        );
        if let Err(e) = client.send_text(vec![prompt]).await {
            warn!(transcript_id = %record.id, %e, "Failed to forward translation prompt");
        }
    }
}

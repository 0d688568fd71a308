use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::SettingsProvider;
use crate::generative::{GenerativeClient, GenerativeEvent};
use crate::relay::TranscriptRelay;
use crate::task::AbortOnDrop;
use crate::turn_log::{ConversationLog, Role};

/// Merges the generative client's streamed response into the conversation
/// log as agent turns.
///
/// The underlying stream delivers all deltas of a logical turn before that
/// turn's completion signal; the bridge trusts that order and merges
/// monotonically, never reordering. On completion it settles the agent tail
/// and durably logs the finished utterance so late joiners and history
/// views see it.
pub struct GenerativeStreamBridge {
    log: Arc<ConversationLog>,
    relay: Arc<TranscriptRelay>,
    settings: Arc<SettingsProvider>,
    task: Mutex<Option<AbortOnDrop>>,
}

impl GenerativeStreamBridge {
    pub fn new(
        log: Arc<ConversationLog>,
        relay: Arc<TranscriptRelay>,
        settings: Arc<SettingsProvider>,
    ) -> Self {
        Self {
            log,
            relay,
            settings,
            task: Mutex::new(None),
        }
    }

    /// Starts consuming the client's inbound event stream. A previous
    /// consumer task is dropped first.
    pub fn start(&self, client: &dyn GenerativeClient) {
        self.stop();

        let mut rx = client.subscribe();
        let log = Arc::clone(&self.log);
        let relay = Arc::clone(&self.relay);
        let settings = Arc::clone(&self.settings);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => Self::apply(&log, &relay, &settings, event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Generative events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Generative event stream closed, bridge exiting");
        });

        *self.task.lock() = Some(AbortOnDrop(task));
    }

    pub fn stop(&self) {
        self.task.lock().take();
    }

    async fn apply(
        log: &ConversationLog,
        relay: &TranscriptRelay,
        settings: &SettingsProvider,
        event: GenerativeEvent,
    ) {
        match event {
            GenerativeEvent::OutputTextDelta { text, is_final } => {
                log.merge_agent(&text, is_final, Vec::new());
            }
            GenerativeEvent::Content { parts, grounding } => {
                let delta = parts
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if delta.is_empty() && grounding.is_empty() {
                    return;
                }
                log.merge_agent(&delta, false, grounding);
            }
            GenerativeEvent::TurnComplete => {
                let Some(tail) = log.tail() else { return };
                if tail.role != Role::Agent || tail.is_final {
                    return;
                }
                if let Some(turn) = log.finalize_tail()
                    && !turn.text.trim().is_empty()
                {
                    let snapshot = settings.snapshot();
                    relay
                        .publish_final(
                            Role::Agent,
                            &turn.text,
                            &snapshot.speaker_id,
                            &snapshot.session_id,
                        )
                        .await;
                }
            }
        }
    }
}

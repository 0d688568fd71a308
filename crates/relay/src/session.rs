use std::sync::Arc;

use tracing::info;

use crate::bridge::GenerativeStreamBridge;
use crate::capture::{AudioLevelSource, SpeechCaptureAdapter, SpeechRecognizer};
use crate::config::{RelaySettings, SettingsProvider};
use crate::generative::{GenerativeClient, GenerativeConfig};
use crate::languages;
use crate::prompt;
use crate::relay::TranscriptRelay;
use crate::store::TranscriptStore;
use crate::subscriber::TranslationSubscriber;
use crate::turn_log::ConversationLog;

/// Session root: owns the single conversation log and wires the capture,
/// relay, subscriber and bridge components around the shared collaborators.
pub struct RelaySession {
    log: Arc<ConversationLog>,
    settings: Arc<SettingsProvider>,
    client: Arc<dyn GenerativeClient>,
    capture: SpeechCaptureAdapter,
    subscriber: TranslationSubscriber,
    bridge: GenerativeStreamBridge,
}

impl RelaySession {
    pub fn new(
        store: Arc<dyn TranscriptStore>,
        recognizer: Arc<dyn SpeechRecognizer>,
        levels: Arc<dyn AudioLevelSource>,
        client: Arc<dyn GenerativeClient>,
        settings: RelaySettings,
    ) -> Self {
        let settings = Arc::new(SettingsProvider::new(settings));
        let log = Arc::new(ConversationLog::new());
        let relay = Arc::new(TranscriptRelay::new(store.clone()));

        let capture = SpeechCaptureAdapter::new(
            recognizer,
            levels,
            Arc::clone(&log),
            Arc::clone(&relay),
            Arc::clone(&settings),
        );
        let subscriber =
            TranslationSubscriber::new(store, Arc::clone(&client), Arc::clone(&settings));
        let bridge =
            GenerativeStreamBridge::new(Arc::clone(&log), Arc::clone(&relay), Arc::clone(&settings));

        Self {
            log,
            settings,
            client,
            capture,
            subscriber,
            bridge,
        }
    }

    /// The session's conversation log (single source of truth for captions).
    pub fn log(&self) -> &Arc<ConversationLog> {
        &self.log
    }

    pub fn settings(&self) -> &Arc<SettingsProvider> {
        &self.settings
    }

    /// Connects the generative side: applies the configuration derived from
    /// the current settings snapshot, starts the bridge, then subscribes to
    /// the session's transcript stream. Safe to call again after a settings
    /// change; the subscriber unsubscribes before re-subscribing.
    pub async fn connect(&self) -> anyhow::Result<()> {
        let snapshot = self.settings.snapshot();
        let lang = languages::resolve_label(&snapshot.language);

        self.client
            .configure(GenerativeConfig {
                voice: snapshot.voice.clone(),
                system_instruction: prompt::translator_system_instruction(lang),
                tools: Vec::new(),
                output_transcription_enabled: true,
            })
            .await?;

        self.bridge.start(&*self.client);
        self.subscriber.subscribe().await?;

        info!(
            session_id = %snapshot.session_id,
            language = %snapshot.language,
            "Relay session connected"
        );
        Ok(())
    }

    /// Disconnects the generative side. The subscriber is torn down first so
    /// no notification arrives after the connection is considered closed.
    pub fn disconnect(&self) {
        self.subscriber.unsubscribe();
        self.bridge.stop();
        info!("Relay session disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.subscriber.is_subscribed()
    }

    /// Enables or disables local speech capture.
    pub async fn set_capturing(&self, on: bool) {
        self.capture.set_capturing(on).await;
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_capturing()
    }

    /// Audio-level samples for visualization while capturing.
    pub fn audio_levels(&self) -> Option<Vec<u8>> {
        self.capture.audio_levels()
    }

    /// Applies new settings and, if connected, re-applies the generative
    /// configuration and subscription so later events see the new snapshot.
    pub async fn update_settings(&self, settings: RelaySettings) -> anyhow::Result<()> {
        self.settings.update(settings);
        if self.is_connected() {
            self.connect().await?;
        }
        Ok(())
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SettingsProvider;
use crate::languages;
use crate::relay::{TranscriptRelay, TranslationMetadata};
use crate::task::AbortOnDrop;
use crate::turn_log::{ConversationLog, Role};

/// A recognized text segment from the continuous recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A not-yet-finalized hypothesis. Each interim event carries the full
    /// current hypothesis, not a delta.
    Interim(String),
    /// A finalized utterance.
    Final(String),
}

/// An open recognition session. The channel closes when the session
/// terminates, whether intentionally or on its own (device, network,
/// silence timeout).
pub struct RecognitionStream {
    pub events: mpsc::Receiver<RecognizerEvent>,
}

/// The continuous speech-recognition substrate.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Opens a continuous recognition session.
    async fn start(&self) -> anyhow::Result<RecognitionStream>;

    /// Human-readable recognizer name.
    fn name(&self) -> &str;
}

/// A raw audio-level analysis tap for visualization. Dropping it releases
/// the underlying hardware handle.
pub trait AudioLevelTap: Send {
    /// Current frequency-bin magnitudes.
    fn level_samples(&self) -> Vec<u8>;
}

/// Acquires audio-level taps. Independent of the recognition session; the
/// two resources have independent lifecycles tied to the same capture flag.
#[async_trait]
pub trait AudioLevelSource: Send + Sync + 'static {
    async fn acquire(&self) -> anyhow::Result<Box<dyn AudioLevelTap>>;
}

struct CaptureState {
    task: Option<AbortOnDrop>,
    tap: Option<Box<dyn AudioLevelTap>>,
}

/// Wraps the continuous recognition session with keep-alive restart.
///
/// The underlying session may terminate on its own at any time; the capture
/// loop restarts it as long as the capture flag is still set. The flag is
/// read at event time, never captured at subscription time, so disabling
/// capture synchronously wins over a racing restart. Interim results are
/// merged into the conversation log; finals are merged, then relayed for
/// translation and history logging.
pub struct SpeechCaptureAdapter {
    recognizer: Arc<dyn SpeechRecognizer>,
    levels: Arc<dyn AudioLevelSource>,
    log: Arc<ConversationLog>,
    relay: Arc<TranscriptRelay>,
    settings: Arc<SettingsProvider>,
    should_capture: Arc<AtomicBool>,
    state: Mutex<CaptureState>,
}

impl SpeechCaptureAdapter {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        levels: Arc<dyn AudioLevelSource>,
        log: Arc<ConversationLog>,
        relay: Arc<TranscriptRelay>,
        settings: Arc<SettingsProvider>,
    ) -> Self {
        Self {
            recognizer,
            levels,
            log,
            relay,
            settings,
            should_capture: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(CaptureState {
                task: None,
                tap: None,
            }),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.should_capture.load(Ordering::SeqCst)
    }

    /// Enables or disables capture.
    ///
    /// Disabling clears the flag before anything else, so no restart can
    /// fire afterwards, then drops the capture task and the audio tap.
    pub async fn set_capturing(&self, on: bool) {
        if !on {
            self.should_capture.store(false, Ordering::SeqCst);
            let mut state = self.state.lock();
            state.task = None;
            state.tap = None;
            debug!("Speech capture disabled");
            return;
        }

        if self.should_capture.swap(true, Ordering::SeqCst) {
            return;
        }

        // Visualization tap failure never blocks recognition.
        let tap = match self.levels.acquire().await {
            Ok(tap) => Some(tap),
            Err(e) => {
                warn!(%e, "Audio level tap unavailable");
                None
            }
        };

        let task = tokio::spawn(Self::capture_loop(
            Arc::clone(&self.recognizer),
            Arc::clone(&self.log),
            Arc::clone(&self.relay),
            Arc::clone(&self.settings),
            Arc::clone(&self.should_capture),
        ));

        let mut state = self.state.lock();
        state.tap = tap;
        state.task = Some(AbortOnDrop(task));
    }

    /// Current audio-level samples for visualization, if the tap is held.
    pub fn audio_levels(&self) -> Option<Vec<u8>> {
        self.state.lock().tap.as_ref().map(|t| t.level_samples())
    }

    async fn capture_loop(
        recognizer: Arc<dyn SpeechRecognizer>,
        log: Arc<ConversationLog>,
        relay: Arc<TranscriptRelay>,
        settings: Arc<SettingsProvider>,
        should_capture: Arc<AtomicBool>,
    ) {
        info!(recognizer = %recognizer.name(), "Speech capture started");

        'run: while should_capture.load(Ordering::SeqCst) {
            let mut stream = match recognizer.start().await {
                Ok(stream) => stream,
                Err(e) => {
                    // Capability unavailable (permissions, unsupported
                    // environment): capture stays off, no retry storm.
                    warn!(%e, "Recognition session failed to start");
                    break 'run;
                }
            };

            while let Some(event) = stream.events.recv().await {
                // Read the flag at event time: a stop that raced this loop
                // must win.
                if !should_capture.load(Ordering::SeqCst) {
                    break 'run;
                }
                match event {
                    RecognizerEvent::Interim(text) => log.merge_user(&text, false),
                    RecognizerEvent::Final(text) => {
                        log.merge_user(&text, true);
                        Self::relay_final(&relay, &settings, &text).await;
                    }
                }
            }

            // Unsolicited termination; the loop condition re-checks the flag
            // and reopens the session if capture is still enabled.
            debug!("Recognition session ended");
        }

        debug!("Speech capture loop exiting");
    }

    /// Publishes a finalized local utterance: once for translation and once
    /// into the history log. Both are best-effort.
    async fn relay_final(relay: &TranscriptRelay, settings: &SettingsProvider, text: &str) {
        let snapshot = settings.snapshot();
        let lang = languages::resolve_label(&snapshot.language);

        let meta = TranslationMetadata {
            source_lang: "auto".to_string(),
            target_lang: lang.code.to_string(),
            target_locale: lang.locale.to_string(),
            speaker_style: snapshot.speaker_style.clone(),
            speaker_id: snapshot.speaker_id.clone(),
            session_id: snapshot.session_id.clone(),
        };
        relay.publish_for_translation(text, &meta).await;
        relay
            .publish_final(Role::User, text, &snapshot.speaker_id, &snapshot.session_id)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelaySettings;
    use crate::store::MemoryStore;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Recognizer that hands out scripted sessions and counts starts.
    struct ScriptedRecognizer {
        starts: AtomicUsize,
        script: Vec<Vec<RecognizerEvent>>,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<Vec<RecognizerEvent>>) -> Self {
            Self {
                starts: AtomicUsize::new(0),
                script,
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for ScriptedRecognizer {
        async fn start(&self) -> anyhow::Result<RecognitionStream> {
            let session = self.starts.fetch_add(1, Ordering::SeqCst);
            let scripted = self.script.get(session).cloned();
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                let Some(events) = scripted else {
                    // Script exhausted: stay open so the adapter idles
                    // instead of restart-spinning for the rest of the test.
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    drop(tx);
                    return;
                };
                for event in events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                // Sender drops here: unsolicited termination.
            });
            Ok(RecognitionStream { events: rx })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct NullTap;
    impl AudioLevelTap for NullTap {
        fn level_samples(&self) -> Vec<u8> {
            vec![0; 128]
        }
    }

    struct NullLevelSource;
    #[async_trait]
    impl AudioLevelSource for NullLevelSource {
        async fn acquire(&self) -> anyhow::Result<Box<dyn AudioLevelTap>> {
            Ok(Box::new(NullTap))
        }
    }

    fn adapter_with(
        recognizer: Arc<ScriptedRecognizer>,
    ) -> (SpeechCaptureAdapter, Arc<ConversationLog>, Arc<MemoryStore>) {
        let log = Arc::new(ConversationLog::new());
        let store = Arc::new(MemoryStore::new());
        let relay = Arc::new(TranscriptRelay::new(store.clone()));
        let settings = Arc::new(SettingsProvider::new(RelaySettings {
            session_id: "s1".into(),
            speaker_id: "A".into(),
            ..RelaySettings::default()
        }));
        let adapter = SpeechCaptureAdapter::new(
            recognizer,
            Arc::new(NullLevelSource),
            log.clone(),
            relay,
            settings,
        );
        (adapter, log, store)
    }

    #[tokio::test]
    async fn interims_then_final_settle_into_one_turn() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![vec![
            RecognizerEvent::Interim("Hold".into()),
            RecognizerEvent::Interim("Hold on a".into()),
            RecognizerEvent::Final("Hold on a sec.".into()),
        ]]));
        let (adapter, log, store) = adapter_with(recognizer);

        adapter.set_capturing(true).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        adapter.set_capturing(false).await;

        let settled: Vec<_> = log.turns().into_iter().filter(|t| t.is_final).collect();
        assert_eq!(settled.len(), 1, "one settled turn, not one per interim");
        assert_eq!(settled[0].text, "Hold on a sec.");

        assert_eq!(store.transcript_count(), 1);
        assert_eq!(store.session_history("s1").len(), 1);
    }

    #[tokio::test]
    async fn session_termination_restarts_while_enabled() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            vec![RecognizerEvent::Final("first".into())],
            vec![RecognizerEvent::Final("second".into())],
        ]));
        let (adapter, log, _store) = adapter_with(recognizer.clone());

        adapter.set_capturing(true).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        adapter.set_capturing(false).await;

        assert!(
            recognizer.starts.load(Ordering::SeqCst) >= 2,
            "expected keep-alive restart after unsolicited termination"
        );
        let texts: Vec<_> = log.turns().into_iter().map(|t| t.text).collect();
        assert!(texts.contains(&"first".to_string()));
        assert!(texts.contains(&"second".to_string()));
    }

    #[tokio::test]
    async fn disabling_capture_stops_restarts() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            vec![RecognizerEvent::Final("first".into())],
            vec![RecognizerEvent::Final("second".into())],
            vec![RecognizerEvent::Final("third".into())],
        ]));
        let (adapter, _log, _store) = adapter_with(recognizer.clone());

        adapter.set_capturing(true).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        adapter.set_capturing(false).await;
        let starts_at_stop = recognizer.starts.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            recognizer.starts.load(Ordering::SeqCst),
            starts_at_stop,
            "no session may start after capture is disabled"
        );
        assert!(!adapter.is_capturing());
        assert!(adapter.audio_levels().is_none(), "tap released on disable");
    }

    #[tokio::test]
    async fn failed_session_start_leaves_capture_off_without_retry() {
        struct FailingRecognizer;
        #[async_trait]
        impl SpeechRecognizer for FailingRecognizer {
            async fn start(&self) -> anyhow::Result<RecognitionStream> {
                anyhow::bail!("permission denied")
            }
            fn name(&self) -> &str {
                "failing"
            }
        }

        let log = Arc::new(ConversationLog::new());
        let store = Arc::new(MemoryStore::new());
        let relay = Arc::new(TranscriptRelay::new(store.clone()));
        let settings = Arc::new(SettingsProvider::new(RelaySettings::default()));
        let adapter = SpeechCaptureAdapter::new(
            Arc::new(FailingRecognizer),
            Arc::new(NullLevelSource),
            log.clone(),
            relay,
            settings,
        );

        adapter.set_capturing(true).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(log.is_empty());
        assert_eq!(store.transcript_count(), 0);
    }
}

pub mod bridge;
pub mod capture;
pub mod config;
pub mod generative;
pub mod languages;
pub mod prompt;
pub mod relay;
pub mod session;
pub mod store;
pub mod subscriber;
pub mod turn_log;

mod task;

pub use bridge::GenerativeStreamBridge;
pub use capture::{AudioLevelSource, AudioLevelTap, RecognizerEvent, SpeechCaptureAdapter, SpeechRecognizer};
pub use config::{RelaySettings, SettingsProvider};
pub use generative::{GenerativeClient, GenerativeConfig, GenerativeEvent};
pub use relay::{PublishedTranslation, TranscriptRelay, TranslationMetadata};
pub use session::RelaySession;
pub use store::{
    HistoryRecord, InsertNotification, NewHistoryEntry, NewTranscript, StoreError, StoreResult,
    TranscriptRecord, TranscriptStore, TranslationRequest,
};
pub use turn_log::{ConversationLog, ConversationTurn, GroundingRef, Role};

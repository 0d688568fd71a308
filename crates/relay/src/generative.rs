use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::turn_log::GroundingRef;

/// Events arriving on the generative client's inbound stream.
///
/// Deltas for one logical turn are delivered before that turn's
/// `TurnComplete`; the bridge trusts stream order and merges monotonically.
#[derive(Debug, Clone)]
pub enum GenerativeEvent {
    /// Transcription of synthesized output audio.
    OutputTextDelta { text: String, is_final: bool },
    /// A model content chunk: text parts plus any grounding references.
    Content {
        parts: Vec<String>,
        grounding: Vec<GroundingRef>,
    },
    /// The current logical turn is complete.
    TurnComplete,
}

/// A tool the generative client may call, declared as opaque JSON.
pub type ToolDeclaration = serde_json::Value;

/// Session configuration for the generative client.
///
/// There is deliberately no input-audio-transcription switch: the client's
/// own audio output must never be fed back as new input, so input
/// transcription stays disabled and all source text reaches the client as
/// text-only prompts.
#[derive(Debug, Clone)]
pub struct GenerativeConfig {
    pub voice: String,
    pub system_instruction: String,
    pub tools: Vec<ToolDeclaration>,
    /// Transcribe synthesized output audio back into text events.
    pub output_transcription_enabled: bool,
}

/// The bidirectional streaming translation/speech-synthesis collaborator.
#[async_trait]
pub trait GenerativeClient: Send + Sync + 'static {
    /// Applies session configuration. Called before any prompt is sent and
    /// again whenever the participant's settings change.
    async fn configure(&self, config: GenerativeConfig) -> anyhow::Result<()>;

    /// Sends text-only message parts. Audio is never attached here.
    async fn send_text(&self, parts: Vec<String>) -> anyhow::Result<()>;

    /// Subscribes to the inbound event stream.
    fn subscribe(&self) -> broadcast::Receiver<GenerativeEvent>;
}

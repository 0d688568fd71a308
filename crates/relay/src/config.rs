use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration for one participant's relay pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Session partition key; all participants in one call share one id.
    pub session_id: String,
    /// This participant's id, used for echo suppression.
    pub speaker_id: String,
    /// Display label of the participant's target language (see `languages`).
    pub language: String,
    /// Prebuilt voice name for synthesized output.
    pub voice: String,
    /// Style cues embedded in every translation request.
    pub speaker_style: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            session_id: "demo-session-v1".to_string(),
            speaker_id: Uuid::new_v4().to_string(),
            language: "English".to_string(),
            voice: "Aoede".to_string(),
            speaker_style: "neutral, clear".to_string(),
        }
    }
}

impl RelaySettings {
    /// Loads settings from the environment (`ORBIT__SESSION_ID`,
    /// `ORBIT__LANGUAGE`, ...) on top of the defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Config::try_from(&RelaySettings::default())?)
            .add_source(
                config::Environment::with_prefix("ORBIT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

/// Hands out immutable settings snapshots.
///
/// Every asynchronous event handler reads a snapshot at the moment it runs
/// rather than consulting mutable global state, so a settings change never
/// tears a half-processed event.
pub struct SettingsProvider {
    current: RwLock<Arc<RelaySettings>>,
}

impl SettingsProvider {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Returns the current immutable snapshot.
    pub fn snapshot(&self) -> Arc<RelaySettings> {
        self.current.read().clone()
    }

    /// Replaces the settings. In-flight events keep the snapshot they
    /// already read; later events observe the new one.
    pub fn update(&self, settings: RelaySettings) {
        *self.current.write() = Arc::new(settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_stable_across_update() {
        let provider = SettingsProvider::new(RelaySettings {
            language: "French".into(),
            ..RelaySettings::default()
        });

        let before = provider.snapshot();
        provider.update(RelaySettings {
            language: "German".into(),
            ..RelaySettings::default()
        });

        assert_eq!(before.language, "French");
        assert_eq!(provider.snapshot().language, "German");
    }
}

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// A citation attached to generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingRef {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// One contiguous utterance by one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub is_final: bool,
    /// Agent-role only; accumulated across partial updates.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub grounding: Vec<GroundingRef>,
}

/// Append-only, in-memory conversation log backing the on-screen captions.
///
/// Invariant: at any point the log is a fully settled history plus at most
/// one pending turn at the tail. Settled turns are never mutated. One
/// instance is owned by the session root and shared by reference with the
/// capture and bridge tasks.
pub struct ConversationLog {
    turns: Mutex<Vec<ConversationTurn>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(Vec::new()),
        }
    }

    /// Appends a new tail turn. A still-pending tail is settled first so
    /// the single-pending-tail invariant holds.
    pub fn append_turn(
        &self,
        role: Role,
        text: impl Into<String>,
        is_final: bool,
        grounding: Vec<GroundingRef>,
    ) {
        let mut turns = self.turns.lock();
        if let Some(tail) = turns.last_mut()
            && !tail.is_final
        {
            tail.is_final = true;
        }
        turns.push(ConversationTurn {
            role,
            text: text.into(),
            is_final,
            grounding,
        });
    }

    /// Merges a recognizer hypothesis into the pending user tail.
    ///
    /// Interim recognizer results are not cumulative — each carries the full
    /// current hypothesis — so the tail text is replaced, not appended.
    /// Falls back to appending a new user turn when the tail is missing,
    /// settled, or not user-role.
    pub fn merge_user(&self, text: &str, is_final: bool) {
        {
            let mut turns = self.turns.lock();
            if let Some(tail) = turns.last_mut()
                && tail.role == Role::User
                && !tail.is_final
            {
                tail.text = text.to_string();
                tail.is_final = is_final;
                return;
            }
        }
        self.append_turn(Role::User, text, is_final, Vec::new());
    }

    /// Merges a generative delta into the pending agent tail.
    ///
    /// Generative output arrives incrementally, so the delta is appended and
    /// grounding references are concatenated. Falls back to appending a new
    /// agent turn when the tail is missing, settled, or not agent-role.
    pub fn merge_agent(&self, delta: &str, is_final: bool, grounding: Vec<GroundingRef>) {
        {
            let mut turns = self.turns.lock();
            if let Some(tail) = turns.last_mut()
                && tail.role == Role::Agent
                && !tail.is_final
            {
                tail.text.push_str(delta);
                tail.grounding.extend(grounding);
                tail.is_final = is_final;
                return;
            }
        }
        self.append_turn(Role::Agent, delta, is_final, grounding);
    }

    /// Settles the pending tail. Returns the turn only when a transition
    /// actually happened; idempotent on an already-settled tail.
    pub fn finalize_tail(&self) -> Option<ConversationTurn> {
        let mut turns = self.turns.lock();
        let tail = turns.last_mut()?;
        if tail.is_final {
            return None;
        }
        tail.is_final = true;
        Some(tail.clone())
    }

    /// Clone of the current tail turn.
    pub fn tail(&self) -> Option<ConversationTurn> {
        self.turns.lock().last().cloned()
    }

    /// Snapshot of all turns, oldest first.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.turns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.lock().is_empty()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

use serde::{Deserialize, Serialize};

/// Progress of one reflection request, broadcast to the session's SSE
/// subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    Started { session_id: String, moods: Vec<String> },
    AttemptFailed { session_id: String, attempt: u32, error: String },
    DuplicateRejected { session_id: String, attempt: u32 },
    Accepted { session_id: String, attempt: u32, message: String },
    FellBack { session_id: String, message: String },
}

impl GenerationEvent {
    pub fn session_id(&self) -> &str {
        match self {
            GenerationEvent::Started { session_id, .. }
            | GenerationEvent::AttemptFailed { session_id, .. }
            | GenerationEvent::DuplicateRejected { session_id, .. }
            | GenerationEvent::Accepted { session_id, .. }
            | GenerationEvent::FellBack { session_id, .. } => session_id,
        }
    }
}

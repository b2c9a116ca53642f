use serde::Serialize;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backoff::retry_delay_ms;
use crate::config::{GenerationConfig, RetryCfg};
use crate::events::GenerationEvent;
use crate::history::SessionHistory;
use crate::prompts;
use crate::providers::{GenerationError, TextGenerator};

pub const DEFAULT_MESSAGE: &str = "Every moment is a chance to begin again. You are stronger than you know.";
pub const FALLBACK_MESSAGE: &str =
    "Today is a new opportunity. Your strength is always greater than your challenges.";
pub const NO_SELECTION_WARNING: &str = "Please select at least one mood to generate an inspiration.";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionSource {
    Generated,
    Fallback,
    Default,
}

/// What the caller displays. Always present, whatever happened upstream.
#[derive(Debug, Clone, Serialize)]
pub struct Reflection {
    pub message: String,
    pub source: ReflectionSource,
    pub attempts: u32,
    pub attempt_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_phrases: Vec<String>,
}

impl Reflection {
    fn default_message() -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            source: ReflectionSource::Default,
            attempts: 0,
            attempt_errors: Vec::new(),
            warning: Some(NO_SELECTION_WARNING.to_string()),
            key_phrases: Vec::new(),
        }
    }

    fn fallback(attempts: u32, failures: &[AttemptFailure]) -> Self {
        Self {
            message: FALLBACK_MESSAGE.to_string(),
            source: ReflectionSource::Fallback,
            attempts,
            attempt_errors: describe_failures(failures),
            warning: None,
            key_phrases: Vec::new(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttemptFailure {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("duplicate of a recent message")]
    Duplicate,
}

fn describe_failures(failures: &[AttemptFailure]) -> Vec<String> {
    failures
        .iter()
        .enumerate()
        .filter(|(_, f)| matches!(f, AttemptFailure::Generation(_)))
        .map(|(i, f)| format!("Attempt {} failed: {}", i + 1, f))
        .collect()
}

/// Runs `op` until it succeeds or `max_attempts` is used up, sleeping
/// `pause(n)` before retry `n`. Returns the value with the 1-based attempt
/// that produced it, or every failure in order.
pub async fn retry_bounded<T, E, F, Fut>(
    max_attempts: u32,
    mut pause: impl FnMut(u32) -> Duration,
    mut op: F,
) -> Result<(T, u32), Vec<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = Vec::new();
    for attempt in 1..=max_attempts.max(1) {
        if attempt > 1 {
            let d = pause(attempt - 1);
            if !d.is_zero() {
                tokio::time::sleep(d).await;
            }
        }
        match op(attempt).await {
            Ok(v) => return Ok((v, attempt)),
            Err(e) => failures.push(e),
        }
    }
    Err(failures)
}

pub struct Orchestrator {
    generator: Arc<dyn TextGenerator>,
    generation: GenerationConfig,
    content: GenerationConfig,
    retry: RetryCfg,
    events: Option<broadcast::Sender<GenerationEvent>>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        generation: GenerationConfig,
        content: GenerationConfig,
        retry: RetryCfg,
    ) -> Self {
        Self { generator, generation, content, retry, events: None }
    }

    pub fn with_events(mut self, tx: broadcast::Sender<GenerationEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn generator(&self) -> &dyn TextGenerator { self.generator.as_ref() }

    pub fn content_config(&self) -> &GenerationConfig { &self.content }

    fn emit(&self, ev: GenerationEvent) {
        if let Some(tx) = &self.events {
            // no subscribers is fine
            let _ = tx.send(ev);
        }
    }

    fn pause(&self) -> impl FnMut(u32) -> Duration + '_ {
        move |n| Duration::from_millis(retry_delay_ms(&self.retry, n))
    }

    /// Generates a reflection for the session's selected moods, commits it to
    /// `history` when accepted, and falls back to a fixed message otherwise.
    pub async fn reflect(&self, session_id: &str, history: &mut SessionHistory) -> Reflection {
        let tags = history.selected_tags();
        let Some(prompt) = prompts::build_reflection_prompt(&tags, &history.recent_key_phrases()) else {
            info!(session_id, "no mood selected, serving default message");
            return Reflection::default_message();
        };

        self.emit(GenerationEvent::Started { session_id: session_id.to_string(), moods: tags.clone() });

        let snapshot: &SessionHistory = history;
        let outcome = retry_bounded(self.retry.max_attempts, self.pause(), |attempt| {
            let prompt = prompt.as_str();
            async move {
                let result = self.attempt(prompt, snapshot).await;
                match &result {
                    Err(AttemptFailure::Generation(e)) => {
                        warn!(session_id, attempt, error = %e, "generation attempt failed");
                        self.emit(GenerationEvent::AttemptFailed {
                            session_id: session_id.to_string(),
                            attempt,
                            error: e.to_string(),
                        });
                    }
                    Err(AttemptFailure::Duplicate) => {
                        debug!(session_id, attempt, "candidate rejected as duplicate");
                        self.emit(GenerationEvent::DuplicateRejected { session_id: session_id.to_string(), attempt });
                    }
                    Ok(_) => {}
                }
                result
            }
        })
        .await;

        match outcome {
            Ok((text, attempt)) => {
                let key_phrases = history.record_accepted(&text);
                info!(session_id, attempt, "reflection accepted");
                self.emit(GenerationEvent::Accepted {
                    session_id: session_id.to_string(),
                    attempt,
                    message: text.clone(),
                });
                Reflection {
                    message: text,
                    source: ReflectionSource::Generated,
                    attempts: attempt,
                    attempt_errors: Vec::new(),
                    warning: None,
                    key_phrases,
                }
            }
            Err(failures) => {
                warn!(session_id, attempts = failures.len(), "all attempts failed, serving fallback");
                self.emit(GenerationEvent::FellBack {
                    session_id: session_id.to_string(),
                    message: FALLBACK_MESSAGE.to_string(),
                });
                Reflection::fallback(failures.len() as u32, &failures)
            }
        }
    }

    async fn attempt(&self, prompt: &str, history: &SessionHistory) -> Result<String, AttemptFailure> {
        let raw = self.generator.generate(prompt, &self.generation).await?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(GenerationError::Empty.into());
        }
        if !history.is_unique(text) {
            return Err(AttemptFailure::Duplicate);
        }
        Ok(text.to_string())
    }

    /// Untargeted (or theme-focused) thought of the day. Not deduplicated
    /// and not recorded in any session.
    pub async fn thought_of_the_day<S: AsRef<str>>(&self, themes: &[S]) -> Reflection {
        let prompt = prompts::build_themed_thought_prompt(themes);
        let outcome = retry_bounded(self.retry.max_attempts, self.pause(), |attempt| {
            let prompt = prompt.as_str();
            async move {
                let text = self.generator.generate(prompt, &self.content).await.map_err(AttemptFailure::from)?;
                let text = text.trim().trim_matches('"').trim();
                if text.is_empty() {
                    warn!(attempt, "thought of the day came back empty");
                    return Err(AttemptFailure::Generation(GenerationError::Empty));
                }
                Ok(text.to_string())
            }
        })
        .await;

        match outcome {
            Ok((message, attempts)) => Reflection {
                message,
                source: ReflectionSource::Generated,
                attempts,
                attempt_errors: Vec::new(),
                warning: None,
                key_phrases: Vec::new(),
            },
            Err(failures) => {
                for f in &failures {
                    warn!(error = %f, "thought of the day attempt failed");
                }
                Reflection::fallback(failures.len() as u32, &failures)
            }
        }
    }
}

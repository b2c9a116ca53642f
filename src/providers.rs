use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

use crate::config::{GenerationConfig, ProviderCfg};
use crate::rate_limit::SimpleRateLimiter;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("rate limited by provider")]
    RateLimited,
    #[error("http error: {0}")]
    Http(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("provider returned empty text")]
    Empty,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, cfg: &GenerationConfig) -> Result<String, GenerationError>;
    fn name(&self) -> &'static str;
}

const MOCK_LINES: &[&str] = &[
    "Whatever you are carrying today, you do not have to carry it all at once. One gentle step is enough.",
    "Your feelings are real and they matter. Let today be soft, and let tomorrow bring its own light.",
    "Even on heavy days you keep showing up, and that quiet courage is worth celebrating.",
    "Storms pass, and you have weathered every one so far. Breathe deeply and trust your own strength.",
    "There is room for joy and sorrow in the same heart. Be kind to the one you carry inside.",
    "Small moments of calm add up. Take one now and notice how far you have already come.",
];

/// Offline generator. Picks canned messages from a seeded RNG so runs are
/// reproducible.
pub struct MockGenerator {
    rng: parking_lot::Mutex<StdRng>,
}

impl MockGenerator {
    pub fn new(seed: u64) -> Self {
        Self { rng: parking_lot::Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn name(&self) -> &'static str { "mock" }

    async fn generate(&self, _prompt: &str, _cfg: &GenerationConfig) -> Result<String, GenerationError> {
        let idx = self.rng.lock().random_range(0..MOCK_LINES.len());
        Ok(MOCK_LINES[idx].to_string())
    }
}

/// Calls the Gemini `generateContent` REST endpoint.
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    limiter: SimpleRateLimiter,
}

impl GeminiGenerator {
    pub fn new(api_key: String, cfg: &ProviderCfg) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| GenerationError::Http(format!("client build failed: {e}")))?;
        let limiter = SimpleRateLimiter::per_minute(cfg.rate_per_min);
        tracing::debug!(
            model = %cfg.model,
            min_interval_ms = limiter.min_interval().as_millis() as u64,
            "gemini generator configured"
        );
        Ok(Self {
            client,
            api_key,
            model: cfg.model.clone(),
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            limiter,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: SamplingParams,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SamplingParams {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &'static str { "gemini" }

    async fn generate(&self, prompt: &str, cfg: &GenerationConfig) -> Result<String, GenerationError> {
        self.limiter.wait().await;

        let req = GenerateContentRequest {
            contents: vec![Content { role: "user", parts: vec![Part { text: prompt }] }],
            generation_config: SamplingParams {
                temperature: cfg.temperature(),
                max_output_tokens: cfg.max_output_tokens(),
                top_p: cfg.top_p(),
            },
        };
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);

        let resp = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send()
            .await
            .map_err(|e| GenerationError::Http(format!("request failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.without_url().to_string()))?;
        extract_text(parsed)
    }
}

fn extract_text(resp: GenerateContentResponse) -> Result<String, GenerationError> {
    let text = resp
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| GenerationError::Malformed("no text in response candidates".into()))?;
    if text.trim().is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(text)
}

fn map_http_error(status: StatusCode, body: &str) -> GenerationError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return GenerationError::RateLimited;
    }
    let detail = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .map(|w| {
            let msg = w.error.message.unwrap_or_default();
            match w.error.status {
                Some(s) if !s.is_empty() => format!("{s}: {msg}"),
                _ => msg,
            }
        })
        .unwrap_or_else(|| body.chars().take(200).collect());
    GenerationError::Http(format!("{status}: {detail}"))
}

/// Picks the generator named by config. Falls back to the mock when the
/// Gemini key is missing so the app still serves something.
pub fn build_generator(cfg: &ProviderCfg) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    match cfg.kind.as_str() {
        "gemini" => match std::env::var(&cfg.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(Arc::new(GeminiGenerator::new(key, cfg)?)),
            _ => {
                tracing::warn!(env = %cfg.api_key_env, "API key not set, using mock provider");
                Ok(Arc::new(MockGenerator::new(cfg.seed)))
            }
        },
        "mock" => Ok(Arc::new(MockGenerator::new(cfg.seed))),
        other => {
            tracing::warn!(kind = other, "unknown provider kind, using mock provider");
            Ok(Arc::new(MockGenerator::new(cfg.seed)))
        }
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::catalog;
use crate::orchestrator::Orchestrator;
use crate::prompts;
use crate::providers::GenerationError;

#[derive(Debug, Clone, Deserialize)]
pub struct SpiritualRequest {
    pub religion: String,
    #[serde(default)]
    pub denomination: String,
    #[serde(default)]
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpiritualContent {
    pub daily_devotional: String,
    pub prayer_guide: String,
    pub inspirational_quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religious_insight: Option<String>,
}

#[derive(Debug, Error)]
pub enum SpiritualError {
    #[error("unknown religion: {0}")]
    UnknownReligion(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("could not parse spiritual content: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Models tend to wrap JSON in a Markdown fence; take what is inside.
fn strip_code_fence(raw: &str) -> &str {
    let s = raw.trim();
    let Some(rest) = s.strip_prefix("```") else { return s };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub fn parse_content(raw: &str) -> Result<SpiritualContent, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}

pub async fn generate(orch: &Orchestrator, req: &SpiritualRequest) -> Result<SpiritualContent, SpiritualError> {
    if !catalog::is_religion(&req.religion) {
        return Err(SpiritualError::UnknownReligion(req.religion.clone()));
    }
    let prompt = prompts::build_spiritual_prompt(&req.religion, &req.denomination, &req.themes);
    let raw = orch.generator().generate(&prompt, orch.content_config()).await?;
    parse_content(&raw).map_err(|e| {
        warn!(error = %e, "spiritual content was not valid JSON");
        SpiritualError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{orchestrator, ScriptedGenerator};

    const BODY: &str = r#"{"daily_devotional":"d","prayer_guide":"p","inspirational_quote":"q"}"#;

    #[test]
    fn parses_fenced_and_bare_json() {
        let fenced = format!("```json\n{BODY}\n```\n");
        let c = parse_content(&fenced).unwrap();
        assert_eq!(c.prayer_guide, "p");
        assert!(c.religious_insight.is_none());
        assert_eq!(parse_content(BODY).unwrap(), c);
        assert!(parse_content("Here is your devotional!").is_err());
    }

    #[tokio::test]
    async fn rejects_unknown_religion_before_calling_out() {
        let gen = ScriptedGenerator::new(vec![Ok(BODY.into())]);
        let orch = orchestrator(gen.clone());
        let req = SpiritualRequest { religion: "Jediism".into(), denomination: String::new(), themes: vec![] };
        assert!(matches!(generate(&orch, &req).await, Err(SpiritualError::UnknownReligion(_))));
        assert_eq!(gen.calls(), 0);
    }

    #[tokio::test]
    async fn generates_from_prompt() {
        let gen = ScriptedGenerator::new(vec![Ok(format!("```\n{BODY}\n```"))]);
        let orch = orchestrator(gen.clone());
        let req = SpiritualRequest {
            religion: "Christianity".into(),
            denomination: "Anglican".into(),
            themes: vec!["Hope".into()],
        };
        let c = generate(&orch, &req).await.unwrap();
        assert_eq!(c.daily_devotional, "d");
        assert!(gen.prompts.lock()[0].contains("Anglican denomination focusing on Hope"));
    }
}

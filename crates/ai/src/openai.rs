//! OpenAI-compatible chat-completions client.
//!
//! The request asks for a JSON object response; the returned content is
//! parsed into a [`GeneratedReport`] and validated before it leaves this
//! module.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::generator::ReportGenerator;
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::result::{AiError, GeneratedReport};
use crate::scorer::Signals;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Upper bound on how much of an error body is kept in `AiError::Status`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Deadline for a single generation request.
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AiError> {
        if config.api_key.trim().is_empty() {
            return Err(AiError::MissingCredentials("OPENAI_API_KEY is required".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn map_transport(&self, err: reqwest::Error) -> AiError {
        if err.is_timeout() {
            AiError::Timeout(self.config.timeout)
        } else {
            AiError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ReportGenerator for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.config.model), err)]
    async fn generate(
        &self,
        resume_text: &str,
        job_text: &str,
        signals: Option<&Signals>,
    ) -> Result<GeneratedReport, AiError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(resume_text, job_text, signals) },
            ],
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = resp
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("malformed completion: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::InvalidResponse("no choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(AiError::InvalidResponse("empty content in response".to_string()));
        }

        let report: GeneratedReport = serde_json::from_str(&content)
            .map_err(|e| AiError::InvalidResponse(format!("failed to parse report JSON: {e}")))?;
        report.validate()?;

        debug!(
            score = report.ats_report.score,
            changes = report.change_plan.changes.len(),
            "report generated"
        );
        Ok(report)
    }
}

//! OpenAI-backed generation collaborator (Chat Completions API).
//!
//! Requires `OPENAI_API_KEY`. Response statuses are mapped onto the job
//! error taxonomy: 429 carries the `Retry-After` hint, 5xx is
//! `ai-unavailable`, transport timeouts are `ai-timeout`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clients::retry_after_secs;
use crate::error::JobError;
use crate::jobs::{GenerateOptions, Generation, GenerationService};
use crate::regen::{GeneratedTerm, TermGenerator};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    /// `model_override`: pass Some("gpt-4o") to override; defaults to gpt-4o-mini.
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("daily-brief-jobs/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: model_override.unwrap_or(DEFAULT_MODEL).to_string(),
            base_url: COMPLETIONS_URL.to_string(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?;
        let model = std::env::var("OPENAI_MODEL").ok();
        Ok(Self::new(api_key, model.as_deref()))
    }

    /// Point the client at a different endpoint (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn chat(&self, system: &str, user: &str, opts: &GenerateOptions) -> Result<Generation, JobError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
            #[serde(default)]
            usage: Option<Usage>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }
        #[derive(Deserialize)]
        struct Usage {
            total_tokens: u32,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        };

        let resp = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    JobError::AiTimeout {
                        message: e.to_string(),
                    }
                } else {
                    JobError::network(format!("openai: {e}"))
                }
            })?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(JobError::RateLimit {
                retry_after_secs: retry_after_secs(&resp),
                message: "openai rate limit".into(),
            });
        }
        if status >= 500 {
            return Err(JobError::AiUnavailable { status });
        }
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(JobError::Upstream {
                provider: "openai".into(),
                status,
                message,
            });
        }

        let body: Resp = resp.json().await.map_err(|e| {
            JobError::unknown(format!("openai response decode failed: {e}"))
        })?;
        let text = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(JobError::unknown("openai returned an empty completion"));
        }
        Ok(Generation {
            text,
            token_usage: body.usage.map(|u| u.total_tokens),
            model: self.model.clone(),
        })
    }
}

#[async_trait]
impl GenerationService for OpenAiClient {
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<Generation, JobError> {
        let system =
            "You are a financial news editor. Write a concise, neutral summary. Output only the summary.";
        self.chat(system, prompt, opts).await
    }
}

#[async_trait]
impl TermGenerator for OpenAiClient {
    async fn generate(&self, exclusions: &[String]) -> Result<GeneratedTerm, JobError> {
        #[derive(Deserialize)]
        struct TermJson {
            name: String,
            definition: String,
        }

        let system = "You teach retail investors one financial term per message. \
                      Respond with JSON: {\"name\": ..., \"definition\": ...}.";
        let user = if exclusions.is_empty() {
            "Pick one investment term and define it in two sentences.".to_string()
        } else {
            format!(
                "Pick one investment term and define it in two sentences. \
                 Do not pick any of: {}.",
                exclusions.join(", ")
            )
        };

        let opts = GenerateOptions {
            max_tokens: 200,
            temperature: 0.8,
        };
        let generation = self.chat(system, &user, &opts).await?;

        let parsed: TermJson = serde_json::from_str(generation.text.trim()).map_err(|e| {
            JobError::unknown(format!("term generation returned non-JSON output: {e}"))
        })?;
        Ok(GeneratedTerm {
            name: parsed.name,
            definition: parsed.definition,
            model: Some(generation.model),
        })
    }
}

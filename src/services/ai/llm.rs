//! Script generation through an OpenAI-compatible chat completions API.
//!
//! The default deployment routes to `meta-llama/Llama-3.1-8B-Instruct` on the
//! Hugging Face inference router; any endpoint speaking the same protocol
//! works, which is also how the tests exercise this client.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{HealthStatus, ServiceHealth};
use crate::error::{AppError, AppResult};
use crate::models::{ScriptAnalysis, ScriptGenerationParams};

/// Token budget for one generated script.
const SCRIPT_MAX_TOKENS: u32 = 2000;
/// Sampling temperature for script generation.
const SCRIPT_TEMPERATURE: f64 = 0.7;
/// Speaking pace used for duration estimates.
const WORDS_PER_MINUTE: f64 = 150.0;
/// Lower bound on the request timeout.
const MIN_TIMEOUT_SECS: u64 = 30;

const HEALTH_PROMPT: &str = "Please respond with 'OK' if you can process this request.";
const HEALTH_MAX_TOKENS: u32 = 10;
const HEALTH_TEMPERATURE: f64 = 0.1;
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// A generated script plus the derived metadata the job results carry.
#[derive(Debug, Clone)]
pub struct ScriptGeneration {
    pub script: String,
    pub analysis: ScriptAnalysis,
    pub generation_time_secs: f64,
}

/// Client for the script generation LLM.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    token: Option<String>,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(
        base_url: String,
        model: String,
        token: Option<String>,
        timeout_secs: u64,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            token,
            timeout: Duration::from_secs(timeout_secs.max(MIN_TIMEOUT_SECS)),
        })
    }

    /// Model identifier this client generates with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a lecture script.
    pub async fn generate_script(
        &self,
        params: &ScriptGenerationParams,
    ) -> AppResult<ScriptGeneration> {
        let prompt = build_script_prompt(params);
        info!(
            prompt_chars = prompt.len(),
            model = %self.model,
            "Generating script"
        );

        let started = Instant::now();
        let content = self
            .chat(&prompt, SCRIPT_MAX_TOKENS, SCRIPT_TEMPERATURE, self.timeout)
            .await?;
        let generation_time_secs = started.elapsed().as_secs_f64();

        let script = content.trim().to_string();
        if script.is_empty() {
            return Err(AppError::ExternalService(
                "LLM returned an empty script".to_string(),
            ));
        }

        let analysis = analyze_script(&script);
        info!(
            words = analysis.word_count,
            estimated_minutes = analysis.estimated_duration_minutes,
            elapsed_secs = format!("{:.2}", generation_time_secs),
            "Script generated"
        );

        Ok(ScriptGeneration {
            script,
            analysis,
            generation_time_secs,
        })
    }

    /// Probe the LLM endpoint with a tiny completion.
    pub async fn health_check(&self) -> ServiceHealth {
        if self.token.is_none() {
            return ServiceHealth::new(
                HealthStatus::Unconfigured,
                Some("No API token configured".to_string()),
            );
        }

        match self
            .chat(HEALTH_PROMPT, HEALTH_MAX_TOKENS, HEALTH_TEMPERATURE, HEALTH_TIMEOUT)
            .await
        {
            Ok(_) => ServiceHealth::new(HealthStatus::Healthy, None),
            Err(e) => ServiceHealth::new(HealthStatus::Unhealthy, Some(e.to_string())),
        }
    }

    async fn chat(
        &self,
        content: &str,
        max_tokens: u32,
        temperature: f64,
        timeout: Duration,
    ) -> AppResult<String> {
        let token = self.token.as_deref().ok_or_else(|| {
            AppError::ExternalService(
                "LLM service is not configured: missing API token".to_string(),
            )
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("LLM request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "LLM returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid LLM response: {}", e)))?;

        debug!(choices = chat.choices.len(), "LLM response received");
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ExternalService("LLM returned no choices".to_string()))
    }
}

/// Build the full generation prompt from job parameters.
///
/// When `prompt` is set it replaces the derived topic instruction and the
/// requirement lines; the framing that forces pure spoken output stays either
/// way.
pub fn build_script_prompt(params: &ScriptGenerationParams) -> String {
    let mut full = String::from(
        "You are a professional content writer specializing in spoken content for video presentations. \
         Generate only the exact words that will be spoken by a presenter in a talking-head video. \
         Do not include any titles, headers, production notes, background music suggestions, or formatting. \
         Focus solely on creating natural, conversational spoken content.\n\n",
    );

    let main_prompt = match &params.prompt {
        Some(prompt) => prompt.clone(),
        None => {
            let audience = params.target_audience.as_deref().unwrap_or("college students");
            let duration = params.duration_minutes.unwrap_or(15);
            let style = params
                .style
                .as_deref()
                .unwrap_or("engaging and educational");

            let mut requirements = vec![
                format!("Topic/Subject: {}", params.topic),
                format!("Target Audience: {}", audience),
                format!(
                    "Target Duration: {} minutes (approximately {} words)",
                    duration,
                    duration as f64 * WORDS_PER_MINUTE
                ),
                format!("Style: {}", style),
            ];
            if let Some(context) = &params.additional_context {
                requirements.push(format!("Additional Context: {}", context));
            }

            full.push_str("REQUIREMENTS:\n");
            for req in &requirements {
                full.push_str("- ");
                full.push_str(req);
                full.push('\n');
            }
            full.push('\n');

            format!("Write a lecture script about {}.", params.topic)
        }
    };

    full.push_str("PROMPT:\n");
    full.push_str(&main_prompt);
    full.push_str("\n\n");
    full.push_str(
        "Please generate ONLY the spoken words that a presenter will say in a video. The output should be:\n\
         1. Pure spoken content without any titles, headers, or section labels\n\
         2. Natural, conversational language as if speaking directly to the audience\n\
         3. No production notes, stage directions, or technical instructions\n\
         4. No references to background music, editing, or visual elements\n\
         5. Smooth, natural flow suitable for voice cloning and text-to-speech\n\
         6. Content that starts speaking immediately without introductory titles\n\n\
         SPOKEN CONTENT:",
    );

    full
}

/// Derive word, sentence, paragraph and character counts plus an estimated
/// speaking duration at 150 words per minute.
pub fn analyze_script(script: &str) -> ScriptAnalysis {
    let word_count = script.split_whitespace().count();
    let sentence_count = script.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
    let paragraph_count = script
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .count();
    let estimated_duration_minutes =
        (word_count as f64 / WORDS_PER_MINUTE * 10.0).round() / 10.0;

    ScriptAnalysis {
        word_count,
        sentence_count,
        paragraph_count,
        character_count: script.chars().count(),
        estimated_duration_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(topic: &str) -> ScriptGenerationParams {
        ScriptGenerationParams {
            topic: topic.to_string(),
            target_audience: None,
            duration_minutes: None,
            style: None,
            additional_context: None,
            prompt: None,
        }
    }

    #[test]
    fn test_analyze_script_counts() {
        let script = "Hello everyone. Today we cover photosynthesis!\n\nLet us begin. Ready?";
        let analysis = analyze_script(script);
        assert_eq!(analysis.word_count, 10);
        assert_eq!(analysis.sentence_count, 4);
        assert_eq!(analysis.paragraph_count, 2);
        assert_eq!(analysis.character_count, script.chars().count());
    }

    #[test]
    fn test_analyze_script_duration_estimate() {
        let script = vec!["word"; 300].join(" ");
        let analysis = analyze_script(&script);
        assert_eq!(analysis.estimated_duration_minutes, 2.0);

        let short = vec!["word"; 225].join(" ");
        assert_eq!(analyze_script(&short).estimated_duration_minutes, 1.5);
    }

    #[test]
    fn test_prompt_includes_requirements_and_defaults() {
        let prompt = build_script_prompt(&params("Photosynthesis"));
        assert!(prompt.contains("Topic/Subject: Photosynthesis"));
        assert!(prompt.contains("Target Audience: college students"));
        assert!(prompt.contains("Target Duration: 15 minutes (approximately 2250 words)"));
        assert!(prompt.contains("Style: engaging and educational"));
        assert!(prompt.ends_with("SPOKEN CONTENT:"));
    }

    #[test]
    fn test_prompt_override_drops_requirements() {
        let mut p = params("ignored");
        p.prompt = Some("Explain quantum tunneling in two minutes.".to_string());
        let prompt = build_script_prompt(&p);
        assert!(prompt.contains("Explain quantum tunneling in two minutes."));
        assert!(!prompt.contains("REQUIREMENTS:"));
        assert!(!prompt.contains("Topic/Subject"));
    }

    #[tokio::test]
    async fn test_generate_script_parses_completion() {
        let mut server = mockito::Server::new_async().await;

        let _chat = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer hf_test")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "meta-llama/Llama-3.1-8B-Instruct",
                "max_tokens": 2000,
            })))
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": "  Welcome to today's lecture. Plants are remarkable.  "
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = LlmClient::new(
            server.url(),
            "meta-llama/Llama-3.1-8B-Instruct".to_string(),
            Some("hf_test".to_string()),
            300,
        )
        .unwrap();

        let generation = client.generate_script(&params("Plants")).await.unwrap();
        assert_eq!(
            generation.script,
            "Welcome to today's lecture. Plants are remarkable."
        );
        assert_eq!(generation.analysis.word_count, 8);
    }

    #[tokio::test]
    async fn test_generate_script_without_token_fails() {
        let client = LlmClient::new(
            "http://localhost:1".to_string(),
            "m".to_string(),
            None,
            300,
        )
        .unwrap();

        let err = client.generate_script(&params("Plants")).await.unwrap_err();
        assert!(err.to_string().contains("missing API token"));
    }

    #[tokio::test]
    async fn test_health_check_unconfigured_without_token() {
        let client = LlmClient::new(
            "http://localhost:1".to_string(),
            "m".to_string(),
            None,
            300,
        )
        .unwrap();

        let health = client.health_check().await;
        assert_eq!(health.status, HealthStatus::Unconfigured);
    }

    #[tokio::test]
    async fn test_health_check_reports_upstream_error() {
        let mut server = mockito::Server::new_async().await;

        let _chat = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("model overloaded")
            .create_async()
            .await;

        let client = LlmClient::new(
            server.url(),
            "m".to_string(),
            Some("hf_test".to_string()),
            300,
        )
        .unwrap();

        let health = client.health_check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(health.detail.unwrap().contains("500"));
    }
}

use crate::error::GatewayError;
use crate::models::{ModelConfig, ParsedResponse, SafetySetting};
use crate::parser::{build_prompt, parse_response};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

// Trait defining the interface for LLM API gateways
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Sends one prompt and returns the parsed reasoning/answer pair.
    /// Implementations make no retries.
    async fn send(
        &self,
        user_prompt: &str,
        context_info: Option<&str>,
        credential: &str,
    ) -> Result<ParsedResponse, GatewayError>;
}

// --- Credential shape check ---

const MIN_KEY_LEN: usize = 30;
const MAX_KEY_LEN: usize = 64;

/// Superficial shape check for a Gemini API key: length within bounds and
/// only URL-safe characters. Not a security boundary.
pub fn looks_like_api_key(credential: &str) -> bool {
    (MIN_KEY_LEN..=MAX_KEY_LEN).contains(&credential.len())
        && credential
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validates a credential before any network call is made.
pub fn check_credential(credential: &str) -> Result<&str, GatewayError> {
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(GatewayError::MissingCredential);
    }
    if !looks_like_api_key(credential) {
        return Err(GatewayError::InvalidCredentialFormat);
    }
    Ok(credential)
}

// --- Failure classification ---

const RATE_LIMIT_MARKERS: &[&str] = &["quota", "rate limit", "rate-limit", "resource_exhausted"];
const UNAUTHORIZED_MARKERS: &[&str] = &[
    "api key not valid",
    "api_key_invalid",
    "permission_denied",
    "unauthorized",
    "unauthenticated",
];
const NETWORK_MARKERS: &[&str] = &["network", "timed out", "timeout", "connection", "dns"];

/// Maps an HTTP status (if any) and a human-readable error detail onto the
/// gateway error taxonomy. First matching rule wins.
pub fn classify_failure(status: Option<u16>, detail: &str) -> GatewayError {
    let lowered = detail.to_lowercase();
    let mentions = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));
    let detail = detail.to_string();

    if status == Some(429) || mentions(RATE_LIMIT_MARKERS) {
        GatewayError::RateLimited(detail)
    } else if matches!(status, Some(401) | Some(403)) || mentions(UNAUTHORIZED_MARKERS) {
        GatewayError::Unauthorized(detail)
    } else if mentions(NETWORK_MARKERS) {
        GatewayError::NetworkError(detail)
    } else {
        GatewayError::Unknown(detail)
    }
}

fn classify_transport(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() || err.is_connect() {
        GatewayError::NetworkError(err.to_string())
    } else {
        classify_failure(err.status().map(|s| s.as_u16()), &err.to_string())
    }
}

// --- Gemini Provider Implementation ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent>,
    safety_settings: &'a [SafetySetting],
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, GatewayError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(GatewayError::Unknown(format!("Response was blocked: {}", reason)));
        };
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(GatewayError::Unknown(format!(
                "Model returned no text (finish reason: {})",
                reason
            )));
        }
        Ok(text)
    }
}

pub struct GeminiProvider {
    client: Client,
    config: ModelConfig,
}

impl GeminiProvider {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn model_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn error_from_response(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<Failed to read error body>".to_string());
        let detail = match serde_json::from_str::<ApiErrorEnvelope>(&body) {
            Ok(envelope) => format!("{} {}", envelope.error.status, envelope.error.message)
                .trim()
                .to_string(),
            Err(_) => body,
        };
        log::error!("Gemini API request failed with status {}: {}", status, detail);
        classify_failure(Some(status.as_u16()), &format!("{}: {}", status, detail))
    }

    /// Cheap metadata request that rejects a bad key before the full
    /// generation request is spent.
    async fn preflight(&self, api_key: &str) -> Result<(), GatewayError> {
        log::debug!("Running credential pre-flight against {}", self.model_url());
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(classify_transport)?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn generate(&self, api_key: &str, prompt: String) -> Result<String, GatewayError> {
        let request_body = GenerateContentRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: prompt }],
            }],
            safety_settings: &self.config.safety_settings,
        };
        let request_url = format!("{}:generateContent", self.model_url());

        let response = self
            .client
            .post(&request_url)
            .header("x-goog-api-key", api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Unknown(format!("Failed to decode Gemini response: {}", e)))?;
        body.into_text()
    }
}

#[async_trait]
impl LlmGateway for GeminiProvider {
    async fn send(
        &self,
        user_prompt: &str,
        context_info: Option<&str>,
        credential: &str,
    ) -> Result<ParsedResponse, GatewayError> {
        let api_key = check_credential(credential)?;
        if self.config.preflight {
            self.preflight(api_key).await?;
        }

        let prompt = build_prompt(user_prompt, context_info);
        log::info!(
            "Sending request to Gemini model {} ({} prompt chars)",
            self.config.model,
            prompt.len()
        );
        let text = self.generate(api_key, prompt).await?;
        Ok(parse_response(&text))
    }
}

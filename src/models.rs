use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// A turn as submitted to the conversation store, before it has an id
#[derive(Clone, Debug, PartialEq)]
pub struct NewTurn {
    pub role: Role,
    pub content: String,
    pub reasoning: Option<String>,
    pub error: Option<String>,
}

impl NewTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning: None,
            error: None,
        }
    }

    /// Builds an assistant turn from a parsed model response. An empty
    /// reasoning segment is dropped rather than stored as `Some("")`.
    pub fn assistant(parsed: ParsedResponse) -> Self {
        let reasoning = if parsed.reasoning.is_empty() {
            None
        } else {
            Some(parsed.reasoning)
        };
        Self {
            role: Role::Assistant,
            content: parsed.answer,
            reasoning,
            error: None,
        }
    }

    pub fn assistant_error(content: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            reasoning: None,
            error: Some(error.into()),
        }
    }
}

// Represents a single message in a conversation. Fields are private so a
// turn cannot be edited once the store has handed it out.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Turn {
    id: Uuid,
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub(crate) fn from_new(turn: NewTurn) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: turn.role,
            content: turn.content,
            reasoning: turn.reasoning,
            error: turn.error,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Result of splitting a raw model reply into its reasoning and answer parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub reasoning: String,
    pub answer: String,
    /// Set when no answer delimiters were found and the whole reply became
    /// the answer.
    pub used_fallback: bool,
}

// Represents the configured model endpoint
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub api_url: String,
    pub safety_settings: Vec<SafetySetting>,
    #[serde(default)]
    pub preflight: bool,
}

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_GEMINI_URL.to_string(),
            safety_settings: vec![
                SafetySetting::new("HARM_CATEGORY_HARASSMENT", "BLOCK_MEDIUM_AND_ABOVE"),
                SafetySetting::new("HARM_CATEGORY_HATE_SPEECH", "BLOCK_MEDIUM_AND_ABOVE"),
            ],
            preflight: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    pub fn new(category: &str, threshold: &str) -> Self {
        Self {
            category: category.to_string(),
            threshold: threshold.to_string(),
        }
    }
}

/// Structured result of an encyclopedia lookup. Sections keep the order the
/// remote page lists them in.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WikiSummary {
    pub title: String,
    pub summary: String,
    pub sections: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl WikiSummary {
    pub(crate) fn informational(title: &str, summary: String) -> Self {
        Self {
            title: title.to_string(),
            summary,
            ..Default::default()
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Destructive,
}

// User-facing toast-style message
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    pub fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            severity: Severity::Destructive,
        }
    }
}

use crate::error::CredentialError;
use crate::models::ModelConfig;
use anyhow::{Context, Result};
use keyring::Entry;
use std::sync::Mutex;

// --- Credential storage ---

/// Fixed name the credential is stored under.
pub const CREDENTIAL_KEY: &str = "gemini_api_key";
const KEYRING_SERVICE: &str = "mindmate";

/// Persistence boundary for the single API credential.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, CredentialError>;
    fn set(&self, value: &str) -> Result<(), CredentialError>;
}

/// Stores the credential in the OS keyring.
pub struct KeyringCredentialStore {
    entry: Entry,
}

impl KeyringCredentialStore {
    pub fn new() -> Result<Self, CredentialError> {
        let entry = Entry::new(KEYRING_SERVICE, CREDENTIAL_KEY)?;
        Ok(Self { entry })
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Result<Option<String>, CredentialError> {
        log::debug!("Retrieving API key from keyring for service: {}", KEYRING_SERVICE);
        match self.entry.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, value: &str) -> Result<(), CredentialError> {
        log::info!("Setting API key in keyring for service: {}", KEYRING_SERVICE);
        self.entry.set_password(value)?;
        Ok(())
    }
}

/// Reads the credential from an environment variable. Read-only.
pub struct EnvCredentialStore {
    var: String,
}

impl EnvCredentialStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn get(&self) -> Result<Option<String>, CredentialError> {
        log::debug!("Retrieving API key from environment variable: {}", self.var);
        match std::env::var(&self.var) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(CredentialError::Environment(format!("{}: {}", self.var, e))),
        }
    }

    fn set(&self, _value: &str) -> Result<(), CredentialError> {
        Err(CredentialError::ReadOnly(
            "credential comes from an environment variable",
        ))
    }
}

/// Process-lifetime credential holder.
#[derive(Default)]
pub struct MemoryCredentialStore {
    value: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.value.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn set(&self, value: &str) -> Result<(), CredentialError> {
        *self.value.lock().unwrap_or_else(|p| p.into_inner()) = Some(value.to_string());
        Ok(())
    }
}

/// Builds a credential store from a reference string: `keyring`,
/// `env:VAR_NAME`, or `memory`.
pub fn credential_store_from_ref(reference: &str) -> Result<Box<dyn CredentialStore>> {
    match reference.trim() {
        "keyring" => Ok(Box::new(
            KeyringCredentialStore::new().context("Failed to create keyring entry")?,
        )),
        "memory" => Ok(Box::new(MemoryCredentialStore::new())),
        other if other.starts_with("env:") => {
            let var = other.trim_start_matches("env:");
            if var.is_empty() {
                return Err(anyhow::anyhow!("Missing variable name in credential ref '{}'", other));
            }
            Ok(Box::new(EnvCredentialStore::new(var)))
        }
        other => Err(anyhow::anyhow!("Unsupported credential ref format: {}", other)),
    }
}

// --- Application settings ---

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub wiki_language: String,
    pub wiki_endpoint: Option<String>,
    pub credential_ref: String,
    pub show_reasoning: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            wiki_language: "en".to_string(),
            wiki_endpoint: None,
            credential_ref: "keyring".to_string(),
            show_reasoning: false,
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow::anyhow!("Invalid boolean '{}' for {}", other, name)),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup so it can be
    /// exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(model) = lookup("MINDMATE_MODEL") {
            config.model.model = model;
        }
        if let Some(url) = lookup("MINDMATE_GEMINI_URL") {
            config.model.api_url = url;
        }
        if let Some(flag) = lookup("MINDMATE_PREFLIGHT") {
            config.model.preflight = parse_flag("MINDMATE_PREFLIGHT", &flag)?;
        }
        if let Some(lang) = lookup("MINDMATE_WIKI_LANGUAGE") {
            config.wiki_language = lang;
        }
        config.wiki_endpoint = lookup("MINDMATE_WIKI_URL");
        if let Some(reference) = lookup("MINDMATE_CREDENTIAL_REF") {
            config.credential_ref = reference;
        }
        if let Some(flag) = lookup("MINDMATE_SHOW_REASONING") {
            config.show_reasoning = parse_flag("MINDMATE_SHOW_REASONING", &flag)?;
        }

        if config.model.model.trim().is_empty() {
            return Err(anyhow::anyhow!("MINDMATE_MODEL must not be empty"));
        }
        log::debug!(
            "Loaded config: model={} url={} wiki_language={}",
            config.model.model,
            config.model.api_url,
            config.wiki_language
        );
        Ok(config)
    }
}

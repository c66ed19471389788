use crate::api::{GeminiProvider, LlmGateway};
use crate::config::{credential_store_from_ref, AppConfig, CredentialStore};
use crate::controller::ChatController;
use crate::wiki::{EncyclopediaGateway, MediaWikiClient};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Core application state shared by the command handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub controller: ChatController,
    pub encyclopedia: Arc<dyn EncyclopediaGateway>,
    show_reasoning: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        gateway: Arc<dyn LlmGateway>,
        encyclopedia: Arc<dyn EncyclopediaGateway>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let show_reasoning = Arc::new(AtomicBool::new(config.show_reasoning));
        Self {
            controller: ChatController::new(gateway, credentials),
            encyclopedia,
            show_reasoning,
            config,
        }
    }

    /// Wires the real Gemini and MediaWiki clients from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let credentials: Arc<dyn CredentialStore> =
            Arc::from(credential_store_from_ref(&config.credential_ref)?);
        let gateway: Arc<dyn LlmGateway> = Arc::new(GeminiProvider::new(config.model.clone()));
        let encyclopedia: Arc<dyn EncyclopediaGateway> = match &config.wiki_endpoint {
            Some(endpoint) => Arc::new(MediaWikiClient::with_endpoint(
                endpoint.clone(),
                &config.wiki_language,
            )),
            None => Arc::new(MediaWikiClient::new(&config.wiki_language)),
        };
        log::info!(
            "App state ready (model {}, credentials from '{}')",
            config.model.model,
            config.credential_ref
        );
        Ok(Self::new(config, gateway, encyclopedia, credentials))
    }

    pub fn show_reasoning(&self) -> bool {
        self.show_reasoning.load(Ordering::Relaxed)
    }

    /// Flips reasoning visibility and returns the new value.
    pub fn toggle_reasoning(&self) -> bool {
        !self.show_reasoning.fetch_xor(true, Ordering::Relaxed)
    }
}

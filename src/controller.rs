//! Chat orchestration: one user submission in, at most one gateway call out.
//!
//! The controller is `Idle` or `AwaitingResponse`. A submission claims the
//! busy flag, appends the user turn before the gateway call resolves, and
//! always ends with exactly one terminal transition back to `Idle`.

use crate::api::{check_credential, LlmGateway};
use crate::config::CredentialStore;
use crate::error::GatewayError;
use crate::models::{NewTurn, Notice, Turn};
use crate::storage::ConversationStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const APOLOGY: &str =
    "I apologize, but I'm having trouble processing that request. Could you please try again?";

pub const EXAMPLE_PROMPTS: [&str; 4] = [
    "I've been feeling really anxious lately",
    "How can I manage stress better?",
    "I'm having trouble sleeping at night",
    "I feel overwhelmed with work and life",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Input was empty after trimming.
    Ignored,
    /// A request is already in flight; nothing was dispatched.
    Busy,
    /// Credential missing or malformed; no assistant turn was recorded.
    Rejected(Notice),
    Answered(Turn),
    /// The gateway failed and a fallback assistant turn was recorded.
    Failed { turn: Turn, notice: Notice },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClearOutcome {
    Cleared(Notice),
    /// A request is in flight; the conversation was left untouched.
    Busy(Notice),
}

impl ClearOutcome {
    pub fn notice(&self) -> &Notice {
        match self {
            ClearOutcome::Cleared(notice) | ClearOutcome::Busy(notice) => notice,
        }
    }
}

struct Session {
    store: ConversationStore,
    show_welcome: bool,
}

// Releases the busy flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn credential_notice(err: &GatewayError) -> Notice {
    match err {
        GatewayError::MissingCredential => Notice::destructive(
            "API Key Required",
            "Please add your Gemini API key to use this feature.",
        ),
        other => Notice::destructive("Invalid API Key", other.to_string()),
    }
}

#[derive(Clone)]
pub struct ChatController {
    session: Arc<Mutex<Session>>,
    busy: Arc<AtomicBool>,
    gateway: Arc<dyn LlmGateway>,
    credentials: Arc<dyn CredentialStore>,
}

impl ChatController {
    pub fn new(gateway: Arc<dyn LlmGateway>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session {
                store: ConversationStore::new(),
                show_welcome: true,
            })),
            busy: Arc::new(AtomicBool::new(false)),
            gateway,
            credentials,
        }
    }

    pub fn state(&self) -> ControllerState {
        if self.busy.load(Ordering::Acquire) {
            ControllerState::AwaitingResponse
        } else {
            ControllerState::Idle
        }
    }

    pub fn has_credential(&self) -> bool {
        matches!(self.credentials.get(), Ok(Some(key)) if !key.trim().is_empty())
    }

    /// Whether the input affordance should be enabled.
    pub fn can_submit(&self) -> bool {
        self.state() == ControllerState::Idle && self.has_credential()
    }

    pub async fn turns(&self) -> Vec<Turn> {
        self.session.lock().await.store.all()
    }

    pub async fn show_welcome(&self) -> bool {
        self.session.lock().await.show_welcome
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        self.submit_with_context(text, None).await
    }

    /// Submits user input, optionally with context text placed between the
    /// system instruction and the input.
    pub async fn submit_with_context(&self, text: &str, context_info: Option<&str>) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            log::warn!("Submission ignored: a response is already pending");
            return SubmitOutcome::Busy;
        };

        let credential = match self.credentials.get() {
            Ok(Some(key)) => key,
            Ok(None) => return SubmitOutcome::Rejected(credential_notice(&GatewayError::MissingCredential)),
            Err(e) => {
                log::error!("Failed to read API key: {}", e);
                return SubmitOutcome::Rejected(Notice::destructive(
                    "API Key Required",
                    format!("Could not read your API key: {}", e),
                ));
            }
        };
        if let Err(e) = check_credential(&credential) {
            log::warn!("Submission rejected: {}", e);
            return SubmitOutcome::Rejected(credential_notice(&e));
        }

        {
            let mut session = self.session.lock().await;
            let turn = session.store.append(NewTurn::user(text));
            session.show_welcome = false;
            log::info!("User turn {} appended, awaiting response", turn.id());
        }

        let result = self.gateway.send(text, context_info, &credential).await;

        let mut session = self.session.lock().await;
        match result {
            Ok(parsed) => {
                let turn = session.store.append(NewTurn::assistant(parsed));
                log::info!("Assistant turn {} appended", turn.id());
                SubmitOutcome::Answered(turn)
            }
            Err(e) if e.is_credential_problem() => SubmitOutcome::Rejected(credential_notice(&e)),
            Err(e) => {
                log::error!("Gateway request failed: {:?}", e);
                let detail = e.to_string();
                let turn = session
                    .store
                    .append(NewTurn::assistant_error(APOLOGY, detail.clone()));
                SubmitOutcome::Failed {
                    turn,
                    notice: Notice::destructive(
                        "Error",
                        format!("Failed to process your request: {}", detail),
                    ),
                }
            }
        }
    }

    /// Empties the conversation and shows the welcome view again. Only
    /// allowed from `Idle`; while a request is in flight nothing changes.
    pub async fn clear(&self) -> ClearOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            log::warn!("Clear refused: a response is still pending");
            return ClearOutcome::Busy(Notice::destructive(
                "Please wait",
                "The chat can be cleared once the current response arrives.",
            ));
        };
        let mut session = self.session.lock().await;
        session.store.clear();
        session.show_welcome = true;
        ClearOutcome::Cleared(Notice::info("Chat cleared", "All messages have been removed."))
    }

    pub fn save_credential(&self, value: &str) -> Notice {
        let value = value.trim();
        if value.is_empty() {
            return Notice::destructive("Error", "Please enter a valid API key.");
        }
        match self.credentials.set(value) {
            Ok(()) => {
                log::info!("API key saved");
                Notice::info("API Key Saved", "Your Gemini API key has been saved securely.")
            }
            Err(e) => {
                log::error!("Failed to save API key: {}", e);
                Notice::destructive("Error", format!("Failed to save API key: {}", e))
            }
        }
    }
}

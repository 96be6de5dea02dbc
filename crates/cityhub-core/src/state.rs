//! UI-agnostic conversation state types
//!
//! These types are shared between the front-ends (TUI, headless `ask`) and
//! don't depend on any specific UI framework.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Unique identifier of a turn: `id-<unix millis>-<random hex>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(String);

impl TurnId {
    pub fn generate() -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let suffix: u64 = rand::thread_rng().gen();
        Self(format!("id-{}-{:x}", timestamp, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Bot,
}

/// One message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    /// Empty while the bot turn is still waiting for its answer
    pub text: String,
    pub is_error: bool,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: TurnId::generate(),
            role: Role::User,
            text: text.into(),
            is_error: false,
        }
    }

    pub fn bot_placeholder() -> Self {
        Self {
            id: TurnId::generate(),
            role: Role::Bot,
            text: String::new(),
            is_error: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Bot && self.text.is_empty() && !self.is_error
    }
}

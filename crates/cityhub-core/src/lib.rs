pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod markup;
pub mod provider;
pub mod state;

// Re-export main types for convenience
pub use backend::{ChatCompletionClient, CompletionBackend, DemoClient, LocalClient};
pub use config::{Config, Overrides, Settings};
pub use conversation::{Conversation, PendingRequest};
pub use error::{BackendError, ConfigError, SubmitRejected};
pub use markup::html_to_text;
pub use provider::Provider;
pub use state::{Role, Turn, TurnId};

//! Natural-language assistant for Salesforce.
//!
//! Free text goes through one LLM classification call, is dispatched as a
//! structured action against the Salesforce REST API, and the result is
//! summarized back into conversational text. History, favorites and
//! cross-turn context live in [`store::ConversationStore`].

pub mod auth;
pub mod config;
pub mod crm;
pub mod error;
pub mod intent;
pub mod llm;
pub mod pipeline;
pub mod respond;
pub mod store;
pub mod templates;

// Re-export primary types for convenience
pub use config::{CredentialBackend, Credentials, FileBackend, MemoryBackend};
pub use crm::{CrmApi, QueryResult, RestClient};
pub use error::{AssistantError, Result};
pub use intent::{Action, IntentClassifier};
pub use llm::{CompletionRequest, LanguageModel, OpenAiClient};
pub use pipeline::Pipeline;
pub use respond::ResponseGenerator;
pub use store::{ChatMessage, ChatRole, ConversationStore, Favorite};

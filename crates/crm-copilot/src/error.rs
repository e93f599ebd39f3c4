//! Error taxonomy for the assistant.
//!
//! Every failure is surfaced to the immediate caller; nothing is retried or
//! recovered internally. The front-end renders `to_string()` of whatever it
//! receives as an assistant-style message.

use thiserror::Error;

/// Errors that can occur while processing a user command.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// No Salesforce access token / instance URL in the credential store.
    #[error("Salesforce credentials not found. Please reconnect to Salesforce.")]
    CredentialsMissing,

    /// No OpenAI API key stored, so the language-model client cannot be built.
    #[error("OpenAI API not initialized. Please check your configuration.")]
    NotInitialized,

    /// The classifier reply was not a parseable JSON object.
    #[error("Could not parse command: {0}")]
    MalformedIntent(String),

    /// The classifier produced an action kind outside the recognized set
    /// (or no action at all).
    #[error("Unknown command type")]
    UnknownAction(String),

    /// Salesforce reported a query-language error; carries the first
    /// message from the API's error array.
    #[error("Salesforce query error: {0}")]
    QueryExecution(String),

    /// A recognized action arrived without a field its handler requires.
    #[error("The '{action}' command is missing the required '{field}' parameter")]
    MissingParameter {
        field: &'static str,
        action: &'static str,
    },

    /// Raw transport failure, propagated unwrapped.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;

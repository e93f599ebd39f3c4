//! Credential storage.
//!
//! Four values live here: the Salesforce access token + instance URL, the
//! OpenAI API key, and the Connected App client id. `CredentialBackend`
//! abstracts where they are kept: a JSON file under the user config dir for
//! normal runs, or an in-memory map for tests and throwaway sessions. Keys
//! are read on every network call and never expire inside this system
//! (token refresh is out of scope).

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub salesforce_token: Option<String>,
    pub salesforce_instance_url: Option<String>,
    pub openai_key: Option<String>,
    pub client_id: Option<String>,
}

impl Credentials {
    /// Salesforce token + instance URL, or `CredentialsMissing` when either
    /// is absent.
    pub fn salesforce(&self) -> Result<(&str, &str)> {
        match (&self.salesforce_token, &self.salesforce_instance_url) {
            (Some(token), Some(instance)) if !token.is_empty() && !instance.is_empty() => {
                Ok((token, instance))
            }
            _ => Err(AssistantError::CredentialsMissing),
        }
    }

    /// Stored OpenAI key, or `NotInitialized` when absent.
    pub fn openai(&self) -> Result<&str> {
        self.openai_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AssistantError::NotInitialized)
    }
}

/// Storage backend for credentials.
pub trait CredentialBackend: Send + Sync {
    fn load(&self) -> Result<Credentials>;
    fn store(&self, creds: &Credentials) -> Result<()>;
}

/// JSON file under the user config directory.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(Self {
            path: config_dir.join("crm-copilot").join("credentials.json"),
        })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<Credentials> {
        if !self.path.exists() {
            return Ok(Credentials::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let creds =
            serde_json::from_str(&content).context("Failed to parse credentials file")?;
        Ok(creds)
    }

    fn store(&self, creds: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(creds).context("Failed to serialize")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBackend {
    creds: Mutex<Credentials>,
}

impl MemoryBackend {
    pub fn new(creds: Credentials) -> Self {
        Self {
            creds: Mutex::new(creds),
        }
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<Credentials> {
        Ok(self.creds.lock().expect("credential lock poisoned").clone())
    }

    fn store(&self, creds: &Credentials) -> Result<()> {
        *self.creds.lock().expect("credential lock poisoned") = creds.clone();
        Ok(())
    }
}

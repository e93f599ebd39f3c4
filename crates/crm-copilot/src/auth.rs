//! Salesforce OAuth helpers and explicit API-key entry.
//!
//! The interactive flow is the user-agent (implicit) flow: the caller opens
//! the authorize URL, Salesforce redirects back with the access token and
//! instance URL in the fragment, and `complete_login` parses and persists
//! them. The OpenAI key is entered explicitly by the user; there is no
//! passive capture.

use std::sync::Arc;

use anyhow::anyhow;
use url::Url;

use crate::config::CredentialBackend;
use crate::error::{AssistantError, Result};

const AUTHORIZE_ENDPOINT: &str = "https://login.salesforce.com/services/oauth2/authorize";
const OAUTH_SCOPE: &str = "api refresh_token offline_access";

/// Keys shorter than this cannot be a real API key.
const MIN_API_KEY_LEN: usize = 30;

/// Build the interactive authorization URL for the stored Connected App
/// client id.
pub fn build_authorize_url(credentials: &dyn CredentialBackend, redirect_uri: &str) -> Result<String> {
    let client_id = credentials
        .load()?
        .client_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            anyhow!("Client ID not found. Please enter your Connected App Consumer Key.")
        })?;

    let mut url = Url::parse(AUTHORIZE_ENDPOINT).expect("authorize endpoint is a valid URL");
    url.query_pairs_mut()
        .append_pair("response_type", "token")
        .append_pair("client_id", &client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", OAUTH_SCOPE);
    Ok(url.into())
}

/// Parse `access_token` and `instance_url` out of the redirect URL's
/// fragment.
pub fn parse_redirect_fragment(redirect_url: &str) -> Result<(String, String)> {
    let url = Url::parse(redirect_url).map_err(|e| anyhow!("Invalid redirect URL: {}", e))?;
    let fragment = url
        .fragment()
        .ok_or_else(|| anyhow!("Redirect URL has no fragment"))?;

    let mut access_token = None;
    let mut instance_url = None;
    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "instance_url" => instance_url = Some(value.into_owned()),
            _ => {}
        }
    }

    match (access_token, instance_url) {
        (Some(token), Some(instance)) => Ok((token, instance)),
        _ => Err(anyhow!("Failed to obtain Salesforce credentials").into()),
    }
}

/// Parse the redirect URL and persist the Salesforce credentials.
pub fn complete_login(
    credentials: &Arc<dyn CredentialBackend>,
    redirect_url: &str,
) -> Result<()> {
    let (token, instance) = parse_redirect_fragment(redirect_url)?;
    let mut creds = credentials.load()?;
    creds.salesforce_token = Some(token);
    creds.salesforce_instance_url = Some(instance);
    credentials.store(&creds)?;
    tracing::info!("stored Salesforce credentials");
    Ok(())
}

/// Persist an explicitly entered OpenAI API key.
pub fn store_api_key(credentials: &Arc<dyn CredentialBackend>, key: &str) -> Result<()> {
    let key = key.trim();
    if key.len() <= MIN_API_KEY_LEN {
        return Err(AssistantError::Other(anyhow!(
            "That does not look like an API key (too short)"
        )));
    }
    let mut creds = credentials.load()?;
    creds.openai_key = Some(key.to_string());
    credentials.store(&creds)?;
    tracing::info!("stored OpenAI API key");
    Ok(())
}

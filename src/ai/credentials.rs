// Secure credential storage for completion API keys
//
// Uses OS-native secure storage:
// - macOS: Keychain
// - Windows: Credential Manager
// - Linux: Secret Service (GNOME/KDE)
//
// Keys from config/env take precedence; the keychain is the fallback for
// keys entered through the settings endpoint.

use keyring::Entry;

use crate::config::Provider;
use crate::error::{Error, Result};

const SERVICE_NAME: &str = "com.lyricdeck.app";

pub struct CredentialManager;

impl CredentialManager {
    fn entry(account: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, account)
            .map_err(|e| Error::Credential(format!("Failed to access keychain: {}", e)))
    }

    fn store(account: &str, key: &str) -> Result<()> {
        Self::entry(account)?
            .set_password(key)
            .map_err(|e| Error::Credential(format!("Failed to store API key: {}", e)))
    }

    fn retrieve(account: &str) -> Result<Option<String>> {
        match Self::entry(account)?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Credential(format!("Failed to retrieve API key: {}", e))),
        }
    }

    fn delete(account: &str) -> Result<()> {
        match Self::entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Credential(format!("Failed to delete API key: {}", e))),
        }
    }

    /// Check the key looks like one issued by the provider
    pub fn validate_api_key(provider: Provider, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Credential("API key cannot be empty".to_string()));
        }
        if !key.starts_with(provider.key_prefix()) {
            return Err(Error::Credential(format!(
                "Invalid API key format. {} API keys should start with '{}'",
                provider.display_name(),
                provider.key_prefix()
            )));
        }
        if key.len() < 20 {
            return Err(Error::Credential(
                "API key appears too short. Please check and try again.".to_string(),
            ));
        }
        Ok(())
    }

    /// Store the API key in the OS keychain
    pub fn store_api_key(provider: Provider, key: &str) -> Result<()> {
        Self::validate_api_key(provider, key)?;
        Self::store(provider.key_account(), key.trim())?;

        tracing::info!(provider = provider.display_name(), "API key stored in keychain");
        Ok(())
    }

    /// Retrieve the API key from the OS keychain
    pub fn retrieve_api_key(provider: Provider) -> Result<Option<String>> {
        let key = Self::retrieve(provider.key_account())
            .inspect_err(|e| tracing::warn!(error = %e, "failed to retrieve API key"))?;
        if let Some(key) = &key {
            tracing::debug!(len = key.len(), "API key retrieved from keychain");
        }
        Ok(key)
    }

    /// Delete the API key from the OS keychain. Deleting a missing key is not an error.
    pub fn delete_api_key(provider: Provider) -> Result<()> {
        Self::delete(provider.key_account())
    }
}

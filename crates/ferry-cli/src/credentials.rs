//! Per-profile sync auth tokens in the system keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use crate::config_profiles::normalize_text_option;
use crate::error::CliError;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "ferry-cli";

struct TokenStore {
    username: String,
}

impl TokenStore {
    fn new(profile_name: &str) -> Self {
        Self {
            username: format!("sync_token:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> Result<Entry, CliError> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| CliError::Credentials(error.to_string()))
    }

    #[cfg(not(test))]
    fn load(&self) -> Result<Option<String>, CliError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(CliError::Credentials(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load(&self) -> Result<Option<String>, CliError> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Credentials(error.to_string()))?;
        Ok(guard.get(&self.username).cloned())
    }

    #[cfg(not(test))]
    fn save(&self, token: &str) -> Result<(), CliError> {
        self.entry()?
            .set_password(token)
            .map_err(|error| CliError::Credentials(error.to_string()))
    }

    #[cfg(test)]
    fn save(&self, token: &str) -> Result<(), CliError> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Credentials(error.to_string()))?;
        guard.insert(self.username.clone(), token.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn clear(&self) -> Result<(), CliError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(CliError::Credentials(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear(&self) -> Result<(), CliError> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Credentials(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

/// Token for `profile_name`; `FERRY_AUTH_TOKEN` takes precedence
pub fn load_auth_token(profile_name: &str) -> Result<Option<String>, CliError> {
    if let Some(token) = normalize_text_option(std::env::var("FERRY_AUTH_TOKEN").ok()) {
        return Ok(Some(token));
    }
    TokenStore::new(profile_name).load()
}

pub fn store_auth_token(profile_name: &str, token: &str) -> Result<(), CliError> {
    let token = normalize_text_option(Some(token.to_string()))
        .ok_or_else(|| CliError::Config("auth token must not be empty".to_string()))?;
    TokenStore::new(profile_name).save(&token)
}

pub fn clear_auth_token(profile_name: &str) -> Result<(), CliError> {
    TokenStore::new(profile_name).clear()
}

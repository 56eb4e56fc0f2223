use serde_json::Value;
use std::sync::Arc;

use super::{KeyValueStore, StoreError};

/// Storage keys.
pub mod keys {
    pub const GEMINI_API_KEY: &str = "gemini_api_key";
    pub const BITBUCKET_EMAIL: &str = "bitbucket_email";
    pub const BITBUCKET_TOKEN: &str = "bitbucket_token";
    pub const CHAT_HISTORY: &str = "chat_history";
}

/// Everything the pipeline may need to authenticate. Each field is
/// independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub bitbucket_email: Option<String>,
    pub bitbucket_token: Option<String>,
}

/// Named accessors for the secrets kept in a [`KeyValueStore`].
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn save_gemini_api_key(&self, api_key: &str) -> Result<(), StoreError> {
        self.store
            .set(keys::GEMINI_API_KEY, Value::from(api_key))
            .await
    }

    pub async fn gemini_api_key(&self) -> Result<Option<String>, StoreError> {
        self.get_string(keys::GEMINI_API_KEY).await
    }

    pub async fn save_bitbucket_credentials(
        &self,
        email: &str,
        token: &str,
    ) -> Result<(), StoreError> {
        self.store
            .set(keys::BITBUCKET_EMAIL, Value::from(email))
            .await?;
        self.store
            .set(keys::BITBUCKET_TOKEN, Value::from(token))
            .await
    }

    pub async fn clear_bitbucket_credentials(&self) -> Result<(), StoreError> {
        self.store.remove(keys::BITBUCKET_EMAIL).await?;
        self.store.remove(keys::BITBUCKET_TOKEN).await
    }

    pub async fn bitbucket_email(&self) -> Result<Option<String>, StoreError> {
        self.get_string(keys::BITBUCKET_EMAIL).await
    }

    pub async fn bitbucket_token(&self) -> Result<Option<String>, StoreError> {
        self.get_string(keys::BITBUCKET_TOKEN).await
    }

    pub async fn load(&self) -> Result<Credentials, StoreError> {
        Ok(Credentials {
            gemini_api_key: self.gemini_api_key().await?,
            bitbucket_email: self.bitbucket_email().await?,
            bitbucket_token: self.bitbucket_token().await?,
        })
    }

    /// Non-string and empty values read as absent.
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|value| value.as_str().map(str::to_string))
            .filter(|value| !value.is_empty()))
    }
}

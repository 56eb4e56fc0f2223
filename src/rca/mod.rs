pub mod prompt;

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{Config, ConfigError};
use crate::llm::{GeminiClient, LlmError};
use crate::pr::{self, BitbucketClient, PrError};
use crate::report::{PrSummary, RcaResult};
use crate::store::{CredentialStore, KeyValueStore, StoreError};

/// Prompt sent by `validate_api_key`.
pub const API_KEY_TEST_PROMPT: &str = "Say \"API key is valid\" if you can read this.";

#[derive(Debug, Error)]
pub enum RcaError {
    #[error(
        "Invalid Bitbucket PR URL. Please provide a valid pull request URL like: \
         https://bitbucket.org/workspace/repo/pull-requests/123"
    )]
    InvalidUrl,

    #[error("Gemini API key not configured. Set it with `bitbucket-rca config set-gemini-key <KEY>`.")]
    MissingCredential,

    #[error("Invalid API key or API error: {0}")]
    InvalidApiKey(#[source] LlmError),

    #[error(transparent)]
    Fetch(#[from] PrError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// URL in, RCA report out.
///
/// Holds no per-run state: credentials are read from the store on every run.
pub struct RcaPipeline {
    bitbucket: BitbucketClient,
    gemini: GeminiClient,
    credentials: CredentialStore,
}

impl RcaPipeline {
    pub fn new(
        bitbucket: BitbucketClient,
        gemini: GeminiClient,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            bitbucket,
            gemini,
            credentials,
        }
    }

    /// Wire both API clients from config over one HTTP client.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ConfigError> {
        let http = config.http_client()?;
        Ok(Self::new(
            BitbucketClient::new(http.clone(), config.bitbucket.api_base.clone()),
            GeminiClient::new(http, config.gemini.endpoint.clone()),
            CredentialStore::new(store),
        ))
    }

    /// Generate an RCA report for a Bitbucket PR URL.
    ///
    /// Each step short-circuits the rest. An invalid URL fails before any
    /// credential lookup or network call.
    #[instrument(skip(self))]
    pub async fn run(&self, url: &str) -> Result<RcaResult, RcaError> {
        if !pr::is_valid_pr_url(url) {
            return Err(RcaError::InvalidUrl);
        }

        let api_key = self
            .credentials
            .gemini_api_key()
            .await?
            .ok_or(RcaError::MissingCredential)?;
        let email = self.credentials.bitbucket_email().await?;
        let token = self.credentials.bitbucket_token().await?;
        debug!(
            bitbucket_credentials = email.is_some() && token.is_some(),
            "loaded credentials"
        );

        info!("fetching pull request from Bitbucket");
        let record = self
            .bitbucket
            .fetch_pr_data(url, email.as_deref(), token.as_deref())
            .await?;
        info!(
            title = %record.title,
            author = %record.author,
            state = record.state.as_deref().unwrap_or("unknown"),
            source = record.source_branch.as_deref().unwrap_or("-"),
            destination = record.destination_branch.as_deref().unwrap_or("-"),
            "fetched PR"
        );

        let prompt = prompt::build_prompt(&record, url);
        debug!(prompt_chars = prompt.len(), "built prompt");

        info!("generating RCA with Gemini");
        let raw = self.gemini.generate(&prompt, &api_key).await?;

        Ok(RcaResult {
            report_markdown: raw.trim().to_string(),
            pr_summary: PrSummary::from(&record),
        })
    }

    /// Check that `api_key` can make a Gemini call. The reply text is not
    /// inspected.
    #[instrument(skip_all)]
    pub async fn validate_api_key(&self, api_key: &str) -> Result<bool, RcaError> {
        self.gemini
            .generate(API_KEY_TEST_PROMPT, api_key)
            .await
            .map_err(RcaError::InvalidApiKey)?;
        info!("Gemini API key is valid");
        Ok(true)
    }
}

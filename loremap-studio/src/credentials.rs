//! Credential gate consulted before premium image jobs.

use async_trait::async_trait;
use thiserror::Error;

/// Why a credential prompt did not yield a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The environment has no way to ask the user.
    #[error("no interactive credential selection available")]
    Unavailable,

    /// The user dismissed the prompt.
    #[error("credential selection dismissed")]
    Dismissed,
}

/// Environment hook for checking and acquiring an access credential.
#[async_trait]
pub trait CredentialGate: Send + Sync {
    /// Whether a credential is already selected.
    async fn has_credential(&self) -> bool;

    /// Ask the user to select one.
    ///
    /// Returning `Ok` counts as success even if the selection cannot be
    /// verified yet.
    async fn prompt_for_credential(&self) -> Result<(), CredentialError>;
}

/// Gate backed by the configured API key. It cannot prompt.
#[derive(Debug, Clone, Copy)]
pub struct ApiKeyGate {
    has_key: bool,
}

impl ApiKeyGate {
    /// Gate that passes when `api_key` is present.
    #[must_use]
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            has_key: api_key.is_some_and(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl CredentialGate for ApiKeyGate {
    async fn has_credential(&self) -> bool {
        self.has_key
    }

    async fn prompt_for_credential(&self) -> Result<(), CredentialError> {
        Err(CredentialError::Unavailable)
    }
}

/// Gate for environments without credential selection at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl CredentialGate for AllowAll {
    async fn has_credential(&self) -> bool {
        true
    }

    async fn prompt_for_credential(&self) -> Result<(), CredentialError> {
        Ok(())
    }
}

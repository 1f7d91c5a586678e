//! Bearer-token decorator (§4.A, §6). OAuth2/bearer-token plumbing itself
//! is treated as an opaque collaborator by `spec.md`; this trait is the
//! seam a real client-credentials flow would plug into.

use async_trait::async_trait;

use crate::error::{ClientError, Result};

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<Option<String>>;
}

/// No authentication: every request goes out undecorated.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuthProvider;

#[async_trait]
impl TokenProvider for NoAuthProvider {
    async fn token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// A single, config-supplied bearer token reused for every request. This is
/// the common case for machine-to-machine mCSD deployments where the token
/// is a long-lived static credential rather than one refreshed via an
/// OAuth2 flow.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<Option<String>> {
        if self.token.is_empty() {
            return Err(ClientError::TokenUnavailable("empty static token".to_string()));
        }
        Ok(Some(self.token.clone()))
    }
}

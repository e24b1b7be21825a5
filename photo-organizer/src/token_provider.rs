use gdrive_core::{OAuthClient, OAuthToken};
use thiserror::Error;
use tracing::debug;

use crate::storage::{OAuthState, now_unix};

/// Renew this many seconds before the recorded expiry so a long listing does
/// not run into a 401 midway.
const RENEW_AHEAD_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum TokenProviderError {
    #[error("oauth client is required to refresh expired token")]
    MissingOAuthClient,
    #[error("refresh token is missing")]
    MissingRefreshToken,
    #[error("oauth refresh failed: {0}")]
    OAuth(#[from] gdrive_core::OAuthError),
}

/// What the session should do with its current access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No expiry recorded, or the expiry is far enough away.
    Current,
    /// Close to expiry and renewable.
    Due,
    /// Close to expiry with no refresh token or no client to renew it.
    Stranded,
}

/// Owns the session's OAuth state and renews the access token through the
/// refresh grant.
pub struct TokenProvider {
    state: OAuthState,
    oauth_client: Option<OAuthClient>,
}

impl TokenProvider {
    pub fn new(state: OAuthState, oauth_client: Option<OAuthClient>) -> Self {
        Self {
            state,
            oauth_client,
        }
    }

    pub fn state(&self) -> &OAuthState {
        &self.state
    }

    pub fn can_refresh(&self) -> bool {
        self.oauth_client.is_some() && self.state.refresh_token.is_some()
    }

    pub fn status(&self) -> TokenStatus {
        let expiring = self
            .state
            .expires_at
            .is_some_and(|expires_at| expires_at <= now_unix().saturating_add(RENEW_AHEAD_SECS));
        match (expiring, self.can_refresh()) {
            (false, _) => TokenStatus::Current,
            (true, true) => TokenStatus::Due,
            (true, false) => TokenStatus::Stranded,
        }
    }

    /// Token to start a run with. An expiring token that cannot be renewed is
    /// an error here, since the first request would fail anyway.
    pub async fn valid_access_token(&mut self) -> Result<String, TokenProviderError> {
        if self.status() != TokenStatus::Current {
            self.refresh().await?;
        }
        Ok(self.state.access_token.clone())
    }

    /// Renews only when the token is due. Returns the new token when it
    /// changed; a stranded token is left for the server to reject.
    pub async fn renew_if_due(&mut self) -> Result<Option<String>, TokenProviderError> {
        if self.status() != TokenStatus::Due {
            return Ok(None);
        }
        self.refresh().await?;
        Ok(Some(self.state.access_token.clone()))
    }

    pub async fn refresh_now(&mut self) -> Result<String, TokenProviderError> {
        self.refresh().await?;
        Ok(self.state.access_token.clone())
    }

    async fn refresh(&mut self) -> Result<(), TokenProviderError> {
        let refresh_token = self
            .state
            .refresh_token
            .as_deref()
            .ok_or(TokenProviderError::MissingRefreshToken)?;
        let client = self
            .oauth_client
            .as_ref()
            .ok_or(TokenProviderError::MissingOAuthClient)?;
        let token = client.refresh_token(refresh_token).await?;
        self.state = renewed_state(&self.state, &token);
        debug!(expires_at = ?self.state.expires_at, "access token refreshed");
        Ok(())
    }
}

/// Google's refresh response usually omits the refresh token and sometimes
/// the scope; those carry over from the previous state.
fn renewed_state(previous: &OAuthState, token: &OAuthToken) -> OAuthState {
    let OAuthState {
        access_token,
        refresh_token,
        expires_at,
        scope,
        token_type,
    } = OAuthState::from_oauth_token(token);
    OAuthState {
        access_token,
        refresh_token: refresh_token.or_else(|| previous.refresh_token.clone()),
        expires_at,
        scope: scope.or_else(|| previous.scope.clone()),
        token_type: token_type.or_else(|| previous.token_type.clone()),
    }
}

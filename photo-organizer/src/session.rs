use anyhow::Context;
use gdrive_core::{ApiErrorClass, DriveClient, DriveError, DriveFile, FileList};
use tracing::{info, warn};

use crate::config::OrganizerConfig;
use crate::oauth_flow::OAuthFlow;
use crate::organize::drive::{DriveService, ServiceError};
use crate::storage::{CredentialStore, OAuthState};
use crate::token_provider::TokenProvider;

/// A Drive client bound to a token provider. The token is refreshed shortly
/// before it expires and once more after a 401; refreshed credentials are
/// written back to the cache.
pub struct AuthorizedDrive {
    client: DriveClient,
    tokens: TokenProvider,
    store: Option<CredentialStore>,
}

impl AuthorizedDrive {
    pub fn new(client: DriveClient, tokens: TokenProvider, store: Option<CredentialStore>) -> Self {
        Self {
            client,
            tokens,
            store,
        }
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    async fn ensure_fresh_token(&mut self) -> Result<(), ServiceError> {
        if let Some(token) = self.tokens.renew_if_due().await? {
            self.client.set_token(token);
            self.persist();
        }
        Ok(())
    }

    async fn refresh_after_unauthorized(&mut self) -> Result<(), ServiceError> {
        info!("access token rejected, refreshing");
        let token = self.tokens.refresh_now().await?;
        self.client.set_token(token);
        self.persist();
        Ok(())
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save_oauth_state(self.tokens.state()) {
            warn!("failed to persist refreshed credentials: {err}");
        }
    }

    fn should_retry_after(&self, err: &DriveError) -> bool {
        matches!(err.classification(), Some(ApiErrorClass::Auth)) && self.tokens.can_refresh()
    }
}

impl DriveService for AuthorizedDrive {
    async fn list_page(
        &mut self,
        parent_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FileList, ServiceError> {
        self.ensure_fresh_token().await?;
        match self.client.list_files_page(parent_id, page_token, page_size).await {
            Err(err) if self.should_retry_after(&err) => {
                self.refresh_after_unauthorized().await?;
                Ok(self.client.list_files_page(parent_id, page_token, page_size).await?)
            }
            other => Ok(other?),
        }
    }

    async fn create_folder(
        &mut self,
        parent_id: &str,
        name: &str,
    ) -> Result<DriveFile, ServiceError> {
        self.ensure_fresh_token().await?;
        match self.client.create_folder(parent_id, name).await {
            Err(err) if self.should_retry_after(&err) => {
                self.refresh_after_unauthorized().await?;
                Ok(self.client.create_folder(parent_id, name).await?)
            }
            other => Ok(other?),
        }
    }

    async fn add_parent(&mut self, file_id: &str, parent_id: &str) -> Result<(), ServiceError> {
        self.ensure_fresh_token().await?;
        match self.client.add_parent(file_id, parent_id).await {
            Err(err) if self.should_retry_after(&err) => {
                self.refresh_after_unauthorized().await?;
                self.client.add_parent(file_id, parent_id).await?;
            }
            other => {
                other?;
            }
        }
        Ok(())
    }
}

/// Builds an authorized session: a fixed access token when one is configured,
/// otherwise cached credentials, otherwise the interactive consent flow.
pub async fn connect(config: &OrganizerConfig) -> anyhow::Result<AuthorizedDrive> {
    if let Some(access_token) = &config.access_token {
        info!("using access token from PHOTO_ORGANIZER_ACCESS_TOKEN");
        let client = DriveClient::new(access_token.clone()).context("invalid drive client")?;
        let tokens = TokenProvider::new(OAuthState::from_access_token(access_token.clone()), None);
        return Ok(AuthorizedDrive::new(client, tokens, None));
    }

    let store = CredentialStore::new(config.credentials_path.clone());
    let oauth_client = match config.client_secrets() {
        Ok(secrets) => Some(secrets.oauth_client().context("invalid oauth config")?),
        Err(err) => {
            warn!("{err:#}");
            None
        }
    };

    let state = match store.get_oauth_state() {
        Ok(state) => state,
        Err(err) => {
            info!("no usable cached credentials ({err}), starting authorization");
            let client = oauth_client
                .clone()
                .context("client secrets are required to authorize")?;
            authenticate_and_store(&store, client, config).await?
        }
    };

    let mut tokens = TokenProvider::new(state, oauth_client.clone());
    let access_token = match tokens.valid_access_token().await {
        Ok(token) => token,
        Err(err) => {
            let Some(client) = oauth_client else {
                return Err(err).context("failed to resolve valid access token");
            };
            warn!("cached credentials could not be refreshed ({err}), authorizing again");
            let state = authenticate_and_store(&store, client.clone(), config).await?;
            tokens = TokenProvider::new(state, Some(client));
            tokens.state().access_token.clone()
        }
    };
    store
        .save_oauth_state(tokens.state())
        .context("failed to persist oauth state")?;
    let client = DriveClient::new(access_token).context("invalid drive client")?;
    Ok(AuthorizedDrive::new(client, tokens, Some(store)))
}

async fn authenticate_and_store(
    store: &CredentialStore,
    client: gdrive_core::OAuthClient,
    config: &OrganizerConfig,
) -> anyhow::Result<OAuthState> {
    let flow = OAuthFlow::new(client, config.oauth_timeout, config.use_local_webserver);
    let token = flow.authenticate().await?;
    let state = OAuthState::from_oauth_token(&token);
    store.save_oauth_state(&state).context("failed to save token")?;
    info!("Storing credentials to {}", store.path().display());
    Ok(state)
}

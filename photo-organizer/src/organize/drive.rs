use gdrive_core::{DriveError, DriveFile, FileList};
use thiserror::Error;

use crate::token_provider::TokenProviderError;

/// Alias the Drive API accepts for the signed-in user's "My Drive".
pub const ROOT_FOLDER_ID: &str = "root";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Drive(#[from] DriveError),
    #[error("credential refresh failed: {0}")]
    Token(#[from] TokenProviderError),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Drive(err) if err.is_retryable())
    }
}

/// The slice of the Drive API the organizer needs. Calls are issued one at a
/// time by a single caller.
#[allow(async_fn_in_trait)]
pub trait DriveService {
    /// One page of the immediate children of `parent_id`, trashed entries
    /// included.
    async fn list_page(
        &mut self,
        parent_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FileList, ServiceError>;

    async fn create_folder(&mut self, parent_id: &str, name: &str)
    -> Result<DriveFile, ServiceError>;

    /// Adds `parent_id` to the parents of `file_id`, leaving existing parents
    /// in place.
    async fn add_parent(&mut self, file_id: &str, parent_id: &str) -> Result<(), ServiceError>;
}

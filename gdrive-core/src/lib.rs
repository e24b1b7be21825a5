mod client;
mod oauth;

pub use client::{
    ApiErrorClass, DriveClient, DriveError, DriveFile, FOLDER_MIME_TYPE, FileList,
};
pub use oauth::{DRIVE_SCOPE, OAuthClient, OAuthError, OAuthToken};
pub use reqwest::StatusCode;

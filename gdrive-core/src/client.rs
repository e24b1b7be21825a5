use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const FILES_PATH: &str = "/drive/v3/files";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,createdTime,trashed)";
const FILE_FIELDS: &str = "id,name,mimeType,createdTime,trashed";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("base url cannot carry path segments")]
    BaseUrl,
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Replaces the bearer token used for subsequent requests.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// Fetches one page of the immediate children of `parent_id`, trashed
    /// entries included. Pass the previous page's `next_page_token` to
    /// continue a listing.
    pub async fn list_files_page(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FileList, DriveError> {
        let mut url = self.endpoint(FILES_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", &parents_query(parent_id));
            query.append_pair("fields", LIST_FIELDS);
            query.append_pair("pageSize", &page_size.max(1).to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn create_folder(&self, parent_id: &str, name: &str) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint(FILES_PATH)?;
        url.query_pairs_mut().append_pair("fields", FILE_FIELDS);
        let metadata = FolderMetadata {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: [parent_id],
        };
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&metadata)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Adds `parent_id` to the parents of `file_id` without removing any of
    /// its existing parents.
    pub async fn add_parent(&self, file_id: &str, parent_id: &str) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint(FILES_PATH)?;
        url.path_segments_mut()
            .map_err(|()| DriveError::BaseUrl)?
            .push(file_id);
        url.query_pairs_mut()
            .append_pair("addParents", parent_id)
            .append_pair("fields", "id,parents");
        let response = self
            .http
            .patch(url)
            .bearer_auth(&self.token)
            .json(&EmptyBody {})
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, body } => Some(classify_api_status(*status, body)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DriveError::Request(err) => err.is_timeout() || err.is_connect(),
            _ => matches!(
                self.classification(),
                Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
            ),
        }
    }
}

fn classify_api_status(status: StatusCode, body: &str) -> ApiErrorClass {
    if status == StatusCode::FORBIDDEN
        && (body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded"))
    {
        ApiErrorClass::RateLimit
    } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

fn parents_query(parent_id: &str) -> String {
    let escaped = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents")
}

/// A file or folder as returned by the files endpoint. Every field is
/// optional on the wire; callers validate what they need.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub trashed: Option<bool>,
    #[serde(default)]
    pub parents: Option<Vec<String>>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FolderMetadata<'a> {
    name: &'a str,
    mime_type: &'a str,
    parents: [&'a str; 1],
}

#[derive(Serialize)]
struct EmptyBody {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_query_escapes_quotes() {
        assert_eq!(parents_query("abc"), "'abc' in parents");
        assert_eq!(parents_query("a'b\\c"), "'a\\'b\\\\c' in parents");
    }

    #[test]
    fn forbidden_with_rate_limit_reason_is_rate_limit() {
        let body = r#"{"error":{"errors":[{"reason":"userRateLimitExceeded"}]}}"#;
        assert_eq!(
            classify_api_status(StatusCode::FORBIDDEN, body),
            ApiErrorClass::RateLimit
        );
        assert_eq!(
            classify_api_status(StatusCode::FORBIDDEN, "insufficientPermissions"),
            ApiErrorClass::Auth
        );
    }

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(
            classify_api_status(StatusCode::BAD_GATEWAY, ""),
            ApiErrorClass::Transient
        );
        assert_eq!(
            classify_api_status(StatusCode::NOT_FOUND, ""),
            ApiErrorClass::Permanent
        );
    }
}

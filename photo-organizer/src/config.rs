use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use gdrive_core::OAuthClient;
use serde::Deserialize;

use crate::organize::lister::{ExhaustedRetries, ListingPolicy};
use crate::organize::retry::RetryPolicy;

const DEFAULT_SOURCE_FOLDER: &str = "Google Photos IphoneSE";
const DEFAULT_DESTINATION_FOLDER: &str = "Photos";
const DEFAULT_CREDENTIALS_PATH: &str = "~/.credentials/drive-photo-organizer.json";
const DEFAULT_CLIENT_SECRET_FILE: &str = "client_secret.json";
const DEFAULT_PAGE_SIZE: u64 = 100;
const MAX_PAGE_SIZE: u64 = 1000;
const DEFAULT_LIST_RETRIES: u64 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 500;
const DEFAULT_RETRY_MAX_MS: u64 = 10_000;
const DEFAULT_OAUTH_TIMEOUT_SECS: u64 = 180;

/// Everything a run needs, built once at startup and passed down explicitly.
#[derive(Clone, Debug)]
pub struct OrganizerConfig {
    pub source_folder: String,
    pub destination_folder: String,
    pub credentials_path: PathBuf,
    pub client_secret_file: PathBuf,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub listing: ListingPolicy,
    pub oauth_timeout: Duration,
    pub use_local_webserver: bool,
}

impl OrganizerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("home directory is unavailable")?;
        Ok(Self::from_vars(|name| std::env::var(name).ok(), &home))
    }

    pub fn from_vars<F>(var: F, home: &Path) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read_u64 = |name: &str, default: u64| {
            var(name)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(default)
        };
        let read_bool = |name: &str, default: bool| {
            var(name)
                .map(|value| {
                    matches!(
                        value.trim().to_ascii_lowercase().as_str(),
                        "1" | "true" | "yes" | "on"
                    )
                })
                .unwrap_or(default)
        };
        let non_empty = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        let source_folder = non_empty("PHOTO_ORGANIZER_SOURCE_FOLDER")
            .unwrap_or_else(|| DEFAULT_SOURCE_FOLDER.to_string());
        let destination_folder = non_empty("PHOTO_ORGANIZER_DEST_FOLDER")
            .unwrap_or_else(|| DEFAULT_DESTINATION_FOLDER.to_string());
        let credentials_path = expand_with_home(
            &non_empty("PHOTO_ORGANIZER_CREDENTIALS")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string()),
            home,
        );
        let client_secret_file = expand_with_home(
            &non_empty("PHOTO_ORGANIZER_CLIENT_SECRET_FILE")
                .unwrap_or_else(|| DEFAULT_CLIENT_SECRET_FILE.to_string()),
            home,
        );

        let page_size = read_u64("PHOTO_ORGANIZER_PAGE_SIZE", DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        let retry_base = read_u64("PHOTO_ORGANIZER_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS);
        let retry_max = read_u64("PHOTO_ORGANIZER_RETRY_MAX_MS", DEFAULT_RETRY_MAX_MS).max(retry_base);
        let max_retries = var("PHOTO_ORGANIZER_LIST_RETRIES")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_LIST_RETRIES as u32);
        let on_exhausted = if read_bool("PHOTO_ORGANIZER_STRICT_LISTING", false) {
            ExhaustedRetries::Fail
        } else {
            ExhaustedRetries::ReturnPartial
        };

        Self {
            source_folder,
            destination_folder,
            credentials_path,
            client_secret_file,
            client_id: non_empty("GOOGLE_CLIENT_ID"),
            client_secret: non_empty("GOOGLE_CLIENT_SECRET"),
            access_token: non_empty("PHOTO_ORGANIZER_ACCESS_TOKEN"),
            listing: ListingPolicy {
                page_size: page_size as u32,
                retry: RetryPolicy {
                    max_retries,
                    base_delay: Duration::from_millis(retry_base),
                    max_delay: Duration::from_millis(retry_max),
                },
                on_exhausted,
            },
            oauth_timeout: Duration::from_secs(read_u64(
                "PHOTO_ORGANIZER_OAUTH_TIMEOUT_SECS",
                DEFAULT_OAUTH_TIMEOUT_SECS,
            )),
            use_local_webserver: true,
        }
    }

    /// Client credentials from the environment, falling back to the
    /// downloaded `client_secret.json`.
    pub fn client_secrets(&self) -> anyhow::Result<ClientSecrets> {
        if let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) {
            return Ok(ClientSecrets {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                auth_uri: None,
                token_uri: None,
            });
        }
        let raw = std::fs::read(&self.client_secret_file).with_context(|| {
            format!(
                "GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET are not set and {} is unreadable",
                self.client_secret_file.display()
            )
        })?;
        ClientSecrets::from_json(&raw)
            .with_context(|| format!("invalid client secret file {}", self.client_secret_file.display()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    #[serde(default)]
    installed: Option<ClientSecrets>,
    #[serde(default)]
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(raw: &[u8]) -> anyhow::Result<Self> {
        let file: ClientSecretFile = serde_json::from_slice(raw)?;
        file.installed
            .or(file.web)
            .context("expected an \"installed\" or \"web\" section")
    }

    pub fn oauth_client(&self) -> Result<OAuthClient, gdrive_core::OAuthError> {
        match (&self.auth_uri, &self.token_uri) {
            (Some(auth_uri), Some(token_uri)) => OAuthClient::with_endpoints(
                auth_uri,
                token_uri,
                &self.client_id,
                &self.client_secret,
            ),
            _ => OAuthClient::new(&self.client_id, &self.client_secret),
        }
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> OrganizerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OrganizerConfig::from_vars(|name| vars.get(name).cloned(), Path::new("/home/user"))
    }

    #[test]
    fn defaults_match_legacy_folder_names() {
        let config = config_from(&[]);
        assert_eq!(config.source_folder, "Google Photos IphoneSE");
        assert_eq!(config.destination_folder, "Photos");
        assert_eq!(
            config.credentials_path,
            PathBuf::from("/home/user/.credentials/drive-photo-organizer.json")
        );
        assert_eq!(config.client_secret_file, PathBuf::from("client_secret.json"));
        assert_eq!(config.listing.page_size, 100);
        assert_eq!(config.listing.retry, RetryPolicy::default());
        assert_eq!(config.listing.on_exhausted, ExhaustedRetries::ReturnPartial);
        assert!(config.use_local_webserver);
        assert!(config.access_token.is_none());
    }

    #[test]
    fn reads_overrides_and_clamps_page_size() {
        let config = config_from(&[
            ("PHOTO_ORGANIZER_SOURCE_FOLDER", "Camera Uploads"),
            ("PHOTO_ORGANIZER_DEST_FOLDER", "Archive"),
            ("PHOTO_ORGANIZER_PAGE_SIZE", "5000"),
            ("PHOTO_ORGANIZER_LIST_RETRIES", "0"),
            ("PHOTO_ORGANIZER_STRICT_LISTING", "yes"),
            ("PHOTO_ORGANIZER_CREDENTIALS", "~/creds.json"),
        ]);
        assert_eq!(config.source_folder, "Camera Uploads");
        assert_eq!(config.destination_folder, "Archive");
        assert_eq!(config.listing.page_size, 1000);
        assert_eq!(config.listing.retry.max_retries, 0);
        assert_eq!(config.listing.on_exhausted, ExhaustedRetries::Fail);
        assert_eq!(config.credentials_path, PathBuf::from("/home/user/creds.json"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("PHOTO_ORGANIZER_SOURCE_FOLDER", "  "),
            ("PHOTO_ORGANIZER_PAGE_SIZE", "abc"),
        ]);
        assert_eq!(config.source_folder, "Google Photos IphoneSE");
        assert_eq!(config.listing.page_size, 100);
    }

    #[test]
    fn env_client_credentials_take_precedence() {
        let config = config_from(&[
            ("GOOGLE_CLIENT_ID", "id-from-env"),
            ("GOOGLE_CLIENT_SECRET", "secret-from-env"),
            ("PHOTO_ORGANIZER_CLIENT_SECRET_FILE", "/nonexistent/client_secret.json"),
        ]);
        let secrets = config.client_secrets().unwrap();
        assert_eq!(secrets.client_id, "id-from-env");
        assert_eq!(secrets.client_secret, "secret-from-env");
    }

    #[test]
    fn parses_installed_client_secret_file() {
        let raw = br#"{
            "installed": {
                "client_id": "123.apps.googleusercontent.com",
                "client_secret": "shh",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]
            }
        }"#;
        let secrets = ClientSecrets::from_json(raw).unwrap();
        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(
            secrets.token_uri.as_deref(),
            Some("https://oauth2.googleapis.com/token")
        );
        assert!(secrets.oauth_client().is_ok());
    }

    #[test]
    fn client_secret_file_without_known_section_is_rejected() {
        assert!(ClientSecrets::from_json(br#"{"other": {}}"#).is_err());
    }

    #[test]
    fn missing_client_secret_file_is_an_error() {
        let config = config_from(&[(
            "PHOTO_ORGANIZER_CLIENT_SECRET_FILE",
            "/nonexistent/client_secret.json",
        )]);
        assert!(config.client_secrets().is_err());
    }
}

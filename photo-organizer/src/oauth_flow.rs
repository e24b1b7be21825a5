use std::io::Write;
use std::time::Duration;

use gdrive_core::{DRIVE_SCOPE, OAuthClient, OAuthToken};
use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};
use url::Url;

/// Redirect target for the copy-paste flow. Nothing listens there; the
/// browser shows an error page whose address bar carries the code.
const MANUAL_REDIRECT_URI: &str = "http://localhost";
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum OAuthFlowError {
    #[error("oauth error: {0}")]
    OAuth(#[from] gdrive_core::OAuthError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("authorization code missing in redirect")]
    MissingCode,
    #[error("authorization response carried an unexpected state")]
    StateMismatch,
    #[error("authorization denied: {0}")]
    Denied(String),
    #[error("authorization timed out")]
    Timeout,
}

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn is_empty(&self) -> bool {
        self.code.is_none() && self.error.is_none()
    }

    /// Accepts the response only if it answers our own request.
    fn into_code(self, expected_state: &str) -> Result<String, OAuthFlowError> {
        if let Some(error) = self.error {
            return Err(OAuthFlowError::Denied(error));
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(OAuthFlowError::StateMismatch);
        }
        self.code.ok_or(OAuthFlowError::MissingCode)
    }
}

/// Interactive installed-app authorization: consent in a browser, then trade
/// the code for tokens.
pub struct OAuthFlow {
    client: OAuthClient,
    timeout: Duration,
    use_local_webserver: bool,
}

impl OAuthFlow {
    pub fn new(client: OAuthClient, timeout: Duration, use_local_webserver: bool) -> Self {
        Self {
            client,
            timeout,
            use_local_webserver,
        }
    }

    pub async fn authenticate(&self) -> Result<OAuthToken, OAuthFlowError> {
        let state = random_state();
        let (code, redirect_uri) = if self.use_local_webserver {
            self.code_via_loopback(&state).await?
        } else {
            self.code_via_manual_entry(&state)?
        };
        let token = self.client.exchange_code(&code, &redirect_uri).await?;
        info!("Authorization complete");
        Ok(token)
    }

    async fn code_via_loopback(&self, state: &str) -> Result<(String, String), OAuthFlowError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let url = self.client.authorize_url(&redirect_uri, DRIVE_SCOPE, Some(state));

        println!("Open this URL in your browser to authorize access:\n\n    {url}\n");
        println!("Waiting for the authorization redirect on {redirect_uri}");

        let params = receive_callback(&listener, self.timeout).await?;
        Ok((params.into_code(state)?, redirect_uri))
    }

    fn code_via_manual_entry(&self, state: &str) -> Result<(String, String), OAuthFlowError> {
        let url = self
            .client
            .authorize_url(MANUAL_REDIRECT_URI, DRIVE_SCOPE, Some(state));
        println!("Open this URL in your browser to authorize access:\n\n    {url}\n");
        println!("After approving, paste the address you were redirected to (or just the code).");
        print!("Enter verification code: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let code = code_from_manual_input(&input, state)?;
        Ok((code, MANUAL_REDIRECT_URI.to_string()))
    }
}

async fn receive_callback(
    listener: &TcpListener,
    timeout: Duration,
) -> Result<CallbackParams, OAuthFlowError> {
    tokio::time::timeout(timeout, serve_until_callback(listener))
        .await
        .map_err(|_| OAuthFlowError::Timeout)?
}

/// Serves the loopback redirect until a request carries a code or an error.
/// Other requests, such as a favicon request, get a 404.
async fn serve_until_callback(listener: &TcpListener) -> Result<CallbackParams, OAuthFlowError> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let mut request = vec![0u8; 8192];
        let read = tokio::time::timeout(READ_TIMEOUT, stream.read(&mut request))
            .await
            .map_err(|_| OAuthFlowError::Timeout)??;
        let request_text = String::from_utf8_lossy(&request[..read]);
        let params = callback_params_from_http_request(&request_text).unwrap_or_default();
        if params.is_empty() {
            debug!(%peer, "ignoring request without authorization parameters");
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n")
                .await;
            continue;
        }
        let _ = stream
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
                <html><body><h2>Authorization received</h2><p>You can close this window.</p></body></html>",
            )
            .await;
        let _ = stream.shutdown().await;
        return Ok(params);
    }
}

fn callback_params_from_http_request(request: &str) -> Option<CallbackParams> {
    let request_line = request.lines().next()?;
    let target = request_line.split_whitespace().nth(1)?;
    let request_url = if target.starts_with("http://") || target.starts_with("https://") {
        Url::parse(target).ok()?
    } else {
        Url::parse(&format!("http://127.0.0.1{target}")).ok()?
    };
    Some(CallbackParams::from_url(&request_url))
}

/// The manual flow accepts either the bare code or the full redirect URL.
fn code_from_manual_input(input: &str, expected_state: &str) -> Result<String, OAuthFlowError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(OAuthFlowError::MissingCode);
    }
    match Url::parse(input) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            CallbackParams::from_url(&url).into_code(expected_state)
        }
        _ => Ok(input.to_string()),
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

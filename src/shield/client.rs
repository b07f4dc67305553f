use reqwest::header::{HeaderMap, SET_COOKIE};
use thiserror::Error;
use tracing::debug;

use crate::console::Credentials;
use crate::endpoint::Endpoint;
use crate::shield::{ErrorResponse, LoginRequest, Session, SESSION_COOKIE, SESSION_HEADER};

const LOGIN_PATH: &str = "/v2/auth/login";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("SHIELD login returned status {0}: {1}")]
    Failed(reqwest::StatusCode, String),
    #[error("SHIELD login succeeded but no session was issued")]
    MissingSession,
    #[error("SHIELD API call failed")]
    HttpError(#[from] reqwest::Error),
}

/// Minimal SHIELD API client. Certificates are not verified; the cores this
/// is pointed at are usually running self-signed.
#[derive(Clone)]
pub struct Client {
    login_url: String,
    client: reqwest::Client,
}

impl Client {
    pub fn new(endpoint: &Endpoint) -> Result<Client, AuthError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        Ok(Client {
            login_url: endpoint.api_url(LOGIN_PATH),
            client,
        })
    }

    /// Log in with a local user. The credentials are consumed so the
    /// password does not outlive the call.
    pub async fn login(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let (username, password) = credentials.into_parts();
        debug!(url = %self.login_url, %username, "logging in");
        let resp = self
            .client
            .post(&self.login_url)
            .json(&LoginRequest {
                username: &username,
                password: &password,
            })
            .send()
            .await?;
        drop(password);

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(ErrorResponse { error }) => error,
                Err(_) => body,
            };
            return Err(AuthError::Failed(status, reason));
        }

        let session = session_from_headers(resp.headers()).ok_or(AuthError::MissingSession)?;
        debug!(%username, "login succeeded");
        Ok(session)
    }
}

fn session_from_headers(headers: &HeaderMap) -> Option<Session> {
    if let Some(token) = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
    {
        return Some(Session::new(token));
    }

    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, value)| name.trim() == SESSION_COOKIE && !value.trim().is_empty())
        .map(|(_, value)| Session::new(value.trim()))
}

//! Integration API client (checkout → integration service).
//!
//! Session creation is unauthenticated; status polling is authenticated
//! with the bearer token issued at creation time.

use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use url::Url;

use super::ClientError;
use crate::objects::session::{CreateSessionRequest, SessionResponse, SessionStatusResponse};

/// Endpoint path for creating a payment session.
pub const CREATE_SESSION_PATH: &str = "/integrations/public/stripe/session";

/// Endpoint path for polling the status of a payment session.
pub const SESSION_STATUS_PATH: &str = "/integrations/public/stripe/sessions/status";

/// Typed HTTP client for the stablecoin **Integration API**.
///
/// One client drives the whole lifecycle of a payment session: create the
/// session, then poll its status with the returned bearer token until it
/// reaches a terminal state.
#[derive(Debug, Clone)]
pub struct IntegrationClient {
    http: Client,
    base_url: Url,
}

impl IntegrationClient {
    /// Create a new `IntegrationClient` for the given service root URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /integrations/public/stripe/session` – create a payment
    /// session for a fixed USD amount.
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionResponse, ClientError> {
        let url = self.base_url.join(CREATE_SESSION_PATH)?;

        let resp = self.http.post(url).json(request).send().await?;

        parse_response(resp).await
    }

    /// `GET /integrations/public/stripe/sessions/status` – poll the current
    /// session status, authenticated with the session's bearer token.
    pub async fn session_status(
        &self,
        session_token: &str,
    ) -> Result<SessionStatusResponse, ClientError> {
        let url = self.base_url.join(SESSION_STATUS_PATH)?;

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {session_token}"))
            .send()
            .await?;

        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

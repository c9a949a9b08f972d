//! Gateway seam between the orchestrator and the integration service.
//!
//! The orchestrator only talks to the integration service through
//! [`PaymentGateway`], so tests can script whole session lifecycles without
//! a network.

use async_trait::async_trait;
use stablepay_sdk::client::{ClientError, IntegrationClient};
use stablepay_sdk::objects::session::{
    CreateSessionRequest, SessionResponse, SessionStatusResponse,
};
use thiserror::Error;

/// Errors that can occur while talking to the integration service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The service returned a non-2xx status code
    #[error("api error: status {status}, body: {body}")]
    Api { status: u16, body: String },

    /// The service returned a body this client cannot interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ClientError> for GatewayError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Api { status, body } => GatewayError::Api {
                status: status.as_u16(),
                body,
            },
            ClientError::Json(e) => GatewayError::InvalidResponse(e.to_string()),
            other => GatewayError::Transport(other.to_string()),
        }
    }
}

/// Trait for payment session backends.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment session for a fixed USD amount.
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionResponse, GatewayError>;

    /// Poll the current status of a session by its bearer token.
    async fn session_status(
        &self,
        session_token: &str,
    ) -> Result<SessionStatusResponse, GatewayError>;
}

#[async_trait]
impl PaymentGateway for IntegrationClient {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionResponse, GatewayError> {
        Ok(IntegrationClient::create_session(self, request).await?)
    }

    async fn session_status(
        &self,
        session_token: &str,
    ) -> Result<SessionStatusResponse, GatewayError> {
        Ok(IntegrationClient::session_status(self, session_token).await?)
    }
}

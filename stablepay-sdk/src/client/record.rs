//! Record API client (checkout → order backend).

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::record::RecordPaymentRequest;

/// Endpoint path for recording a settled payment.
pub const RECORD_PAYMENT_PATH: &str = "/api/record-custom-payment";

/// Typed HTTP client for the order backend's **Record API**.
#[derive(Debug, Clone)]
pub struct RecordClient {
    http: Client,
    base_url: Url,
}

impl RecordClient {
    /// Create a new `RecordClient` for the given backend root URL.
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

    /// `POST /api/record-custom-payment` – record a settled on-chain
    /// payment against its order.  The endpoint returns no body of
    /// interest; any 2xx status counts as recorded.
    pub async fn record_payment(
        &self,
        request: &RecordPaymentRequest,
    ) -> Result<(), ClientError> {
        let url = self.base_url.join(RECORD_PAYMENT_PATH)?;

        let resp = self.http.post(url).json(request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }
}

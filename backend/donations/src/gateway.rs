//! Payment gateway adapter.
//!
//! [`PaymentGateway`] is the seam the ledger talks to; [`PaystackGateway`] is
//! the HTTP implementation and [`DisabledGateway`] stands in when no secret key
//! is configured (test mode).
//!
//! ## Resilience
//!
//! * Rate-limit responses and transport errors are retried with exponential
//!   back-off, at most [`MAX_ATTEMPTS`] times, then surface as
//!   [`LedgerError::Upstream`].
//! * Any other non-success response is returned immediately.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{LedgerError, Result};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 250;

/// What the ledger needs to open a hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentInit {
    pub email: String,
    /// Minor units (kobo for NGN).
    pub amount: i64,
    pub reference: String,
    pub callback_url: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentHandle {
    pub authorization_url: String,
    pub access_code: Option<String>,
}

/// Gateway view of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayOutcome {
    Success,
    Failed,
    Pending,
}

impl GatewayOutcome {
    pub fn from_paystack(status: &str) -> Self {
        match status {
            "success" => Self::Success,
            "failed" | "abandoned" | "reversed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Open a payment for `init.reference` and return the redirect handle.
    async fn initialize(&self, init: &PaymentInit) -> Result<PaymentHandle>;

    /// Ask the gateway what became of `reference`.
    async fn verify(&self, reference: &str) -> Result<GatewayOutcome>;

    /// `false` when payments are not actually taken (test mode).
    fn is_live(&self) -> bool {
        true
    }
}

/// Gateway used when no credentials are configured.
pub struct DisabledGateway;

#[async_trait::async_trait]
impl PaymentGateway for DisabledGateway {
    async fn initialize(&self, _init: &PaymentInit) -> Result<PaymentHandle> {
        Err(LedgerError::Upstream("payment gateway not configured".into()))
    }

    async fn verify(&self, _reference: &str) -> Result<GatewayOutcome> {
        Err(LedgerError::Upstream("payment gateway not configured".into()))
    }

    fn is_live(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────
// Paystack
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
}

pub struct PaystackGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl PaystackGateway {
    pub fn new(client: Client, base_url: &str, secret_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, build: impl Fn() -> RequestBuilder) -> Result<T> {
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut attempt = 1;

        loop {
            let retry_reason = match build().bearer_auth(&self.secret_key).send().await {
                Err(e) if e.is_timeout() || e.is_connect() => format!("transport error: {e}"),
                Err(e) => return Err(e.into()),
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    "rate limited".to_string()
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body: Envelope<T> = resp.json().await.map_err(|e| {
                        LedgerError::Upstream(format!("unexpected response ({status}): {e}"))
                    })?;
                    if !status.is_success() || !body.status {
                        return Err(LedgerError::Upstream(format!(
                            "gateway rejected request ({status}): {}",
                            body.message
                        )));
                    }
                    debug!("Gateway call succeeded: {}", body.message);
                    return body.data.ok_or_else(|| {
                        LedgerError::Upstream("gateway response carried no data".into())
                    });
                }
            };

            if attempt >= MAX_ATTEMPTS {
                return Err(LedgerError::Upstream(format!(
                    "giving up after {attempt} attempts: {retry_reason}"
                )));
            }
            warn!("Gateway {retry_reason} (will retry in {backoff}ms)");
            tokio::time::sleep(Duration::from_millis(backoff)).await;
            backoff *= 2;
            attempt += 1;
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(&self, init: &PaymentInit) -> Result<PaymentHandle> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let mut body = json!({
            "email": init.email,
            "amount": init.amount,
            "reference": init.reference,
            "metadata": init.metadata,
        });
        if let Some(callback) = &init.callback_url {
            body["callback_url"] = json!(callback);
        }

        let data: InitializeData = self.call(|| self.client.post(&url).json(&body)).await?;
        Ok(PaymentHandle {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayOutcome> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let data: VerifyData = self.call(|| self.client.get(&url)).await?;
        Ok(GatewayOutcome::from_paystack(&data.status))
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted gateway for ledger and API tests.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct ScriptedGateway {
        pub fail_initialize: bool,
        pub outcome: Option<GatewayOutcome>,
        pub initialized: Mutex<Vec<PaymentInit>>,
    }

    #[async_trait::async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn initialize(&self, init: &PaymentInit) -> Result<PaymentHandle> {
            if self.fail_initialize {
                return Err(LedgerError::Upstream("connection refused".into()));
            }
            self.initialized.lock().unwrap().push(init.clone());
            Ok(PaymentHandle {
                authorization_url: format!("https://checkout.test/{}", init.reference),
                access_code: Some("ac_test".into()),
            })
        }

        async fn verify(&self, _reference: &str) -> Result<GatewayOutcome> {
            self.outcome
                .ok_or_else(|| LedgerError::Upstream("no scripted outcome".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paystack_status_mapping() {
        assert_eq!(GatewayOutcome::from_paystack("success"), GatewayOutcome::Success);
        assert_eq!(GatewayOutcome::from_paystack("failed"), GatewayOutcome::Failed);
        assert_eq!(GatewayOutcome::from_paystack("abandoned"), GatewayOutcome::Failed);
        assert_eq!(GatewayOutcome::from_paystack("ongoing"), GatewayOutcome::Pending);
    }

    #[tokio::test]
    async fn disabled_gateway_reports_upstream() {
        let gw = DisabledGateway;
        assert!(!gw.is_live());
        let err = gw.verify("DON-1").await.unwrap_err();
        assert!(matches!(err, LedgerError::Upstream(_)));
    }

    #[test]
    fn envelope_parses_initialize_payload() {
        let raw = r#"{
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/0peioxfhpn",
                "access_code": "0peioxfhpn",
                "reference": "DON-20250101-ABC123"
            }
        }"#;
        let env: Envelope<InitializeData> = serde_json::from_str(raw).unwrap();
        assert!(env.status);
        let data = env.data.unwrap();
        assert_eq!(data.authorization_url, "https://checkout.paystack.com/0peioxfhpn");
        assert_eq!(data.access_code.as_deref(), Some("0peioxfhpn"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let gw = PaystackGateway::new(Client::new(), "https://api.paystack.co/", "sk_test");
        assert_eq!(gw.base_url, "https://api.paystack.co");
    }
}

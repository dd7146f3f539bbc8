use crate::domain::money::Amount;
use crate::domain::payment::{ChargeOutcome, ChargeStatus};
use crate::domain::ports::PaymentGateway;
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Currency every charge is requested in.
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Serialize)]
struct ChargeRequest<'a> {
    account: &'a str,
    amount: Amount,
    currency: &'a str,
}

/// Mobile-money provider reached over HTTPS.
///
/// Posts `{account, amount, currency}` as JSON to the configured charge URL
/// with the API key as a bearer token, and expects `{status, reference}` back.
/// Any non-2xx answer or unreadable body is an error, never a success.
pub struct HttpGateway {
    client: reqwest::Client,
    charge_url: String,
    api_key: String,
    currency: String,
}

impl HttpGateway {
    pub fn new(charge_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RegistryError::ConfigError(
                "Payment gateway API key must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RegistryError::internal)?;
        Ok(Self {
            client,
            charge_url,
            api_key,
            currency: DEFAULT_CURRENCY.to_string(),
        })
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn charge(&self, account: &str, amount: Amount) -> Result<ChargeOutcome> {
        let response = self
            .client
            .post(&self.charge_url)
            .bearer_auth(&self.api_key)
            .json(&ChargeRequest {
                account,
                amount,
                currency: &self.currency,
            })
            .send()
            .await
            .map_err(|e| RegistryError::PaymentFailed(format!("gateway unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "payment gateway rejected the charge request");
            return Err(RegistryError::PaymentFailed(format!(
                "gateway answered {}",
                status
            )));
        }

        let outcome: ChargeOutcome = response.json().await.map_err(|e| {
            RegistryError::PaymentFailed(format!("unreadable gateway response: {}", e))
        })?;
        debug!(reference = %outcome.reference, status = ?outcome.status, "gateway answered");
        Ok(outcome)
    }
}

/// An in-process gateway that answers every charge the same way.
///
/// Used for local development (`--gateway mock`) and tests; it counts the
/// charges it has seen so callers can assert nothing was double-charged.
#[derive(Debug)]
pub struct StaticGateway {
    status: ChargeStatus,
    charges: AtomicUsize,
}

impl StaticGateway {
    pub fn approving() -> Self {
        Self {
            status: ChargeStatus::Success,
            charges: AtomicUsize::new(0),
        }
    }

    pub fn declining() -> Self {
        Self {
            status: ChargeStatus::Failed,
            charges: AtomicUsize::new(0),
        }
    }

    pub fn charges(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn charge(&self, account: &str, amount: Amount) -> Result<ChargeOutcome> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        debug!(account, %amount, status = ?self.status, "static gateway charge");
        Ok(ChargeOutcome {
            status: self.status,
            reference: format!("MOCK-{}", uuid::Uuid::new_v4().simple()),
        })
    }
}

//! Paystack webhook intake.
//!
//! The `x-paystack-signature` header carries the hex HMAC-SHA512 of the raw
//! request body keyed with the secret key. It is checked in constant time
//! before the body is parsed. Every failure before that point is reported as
//! the same [`LedgerError::InvalidSignature`].
//!
//! Deliveries are at-least-once. Events that refer to already-processed or
//! unknown donations are logged and acknowledged so the gateway stops retrying;
//! only storage failures surface as errors (and are retried by the gateway).

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;
use tracing::{debug, info, warn};

use crate::errors::{LedgerError, Result};
use crate::gateway::GatewayOutcome;
use crate::ledger::Ledger;
use crate::subscriptions::{ChargeOutcome, RecurringCharge};

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

type HmacSha512 = Hmac<Sha512>;

pub fn verify_signature(secret: Option<&str>, body: &[u8], signature: Option<&str>) -> Result<()> {
    let Some(secret) = secret else {
        warn!("Webhook received but no secret key is configured");
        return Err(LedgerError::InvalidSignature);
    };
    let expected = signature
        .and_then(|s| hex::decode(s.trim()).ok())
        .ok_or(LedgerError::InvalidSignature)?;

    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| LedgerError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| LedgerError::InvalidSignature)
}

// ─────────────────────────────────────────────────────────
// Event payloads
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventData {
    pub reference: Option<String>,
    pub amount: Option<i64>,
    pub paid_at: Option<String>,
    /// Paystack sends an object, or an empty string when none was attached.
    #[serde(default)]
    pub metadata: Value,
    pub customer: Option<Customer>,
    pub subscription_code: Option<String>,
    pub authorization: Option<Authorization>,
}

#[derive(Debug, Deserialize)]
pub struct Customer {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Authorization {
    pub authorization_code: Option<String>,
}

impl EventData {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn charged_at(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.paid_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(fallback)
    }

    /// Keys a gateway subscription event may be matched on, most specific first.
    fn subscription_keys(&self) -> Vec<&str> {
        [
            self.authorization
                .as_ref()
                .and_then(|a| a.authorization_code.as_deref()),
            self.subscription_code.as_deref(),
            self.metadata_str("subscription_id"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Authenticate, parse and apply one delivery.
pub async fn receive(
    ledger: &Ledger,
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<()> {
    verify_signature(secret, body, signature)?;
    let event: WebhookEvent = serde_json::from_slice(body)
        .map_err(|e| LedgerError::InvalidInput(format!("malformed webhook payload: {e}")))?;
    info!("Paystack webhook event: {}", event.event);
    dispatch(ledger, event, now).await
}

pub async fn dispatch(ledger: &Ledger, event: WebhookEvent, now: DateTime<Utc>) -> Result<()> {
    match event.event.as_str() {
        "charge.success" => match event.data.metadata_str("subscription_id") {
            Some(subscription_id) => recurring_charge(ledger, subscription_id, &event.data, now).await,
            None => resolve_charge(ledger, &event.data, GatewayOutcome::Success, now).await,
        },
        "charge.failed" => resolve_charge(ledger, &event.data, GatewayOutcome::Failed, now).await,
        "subscription.disable" | "subscription.not_renew" => {
            subscription_stopped(ledger, &event.data, now).await
        }
        other => {
            debug!("Unhandled webhook event {other}");
            Ok(())
        }
    }
}

async fn resolve_charge(
    ledger: &Ledger,
    data: &EventData,
    outcome: GatewayOutcome,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(reference) = data.reference.as_deref() else {
        warn!("Charge event without a reference");
        return Ok(());
    };
    match ledger.verify_online(reference, outcome, now).await {
        Ok(donation) => {
            info!("Webhook settled donation {} as {}", donation.id, donation.status.as_str());
            Ok(())
        }
        Err(LedgerError::AlreadyProcessed) => {
            info!("Webhook for {reference} already processed");
            Ok(())
        }
        Err(LedgerError::DonationNotFound) => {
            warn!("Webhook for unknown reference {reference}");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn recurring_charge(
    ledger: &Ledger,
    subscription_id: &str,
    data: &EventData,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(reference) = data.reference.clone() else {
        warn!("Recurring charge for {subscription_id} without a reference");
        return Ok(());
    };
    let charge = RecurringCharge {
        subscription_id: subscription_id.to_string(),
        reference,
        amount: data.amount,
        charged_at: data.charged_at(now),
        donor_email: data.customer.as_ref().and_then(|c| c.email.clone()),
    };
    match ledger.apply_recurring_charge(charge, now).await {
        Ok(ChargeOutcome::Recorded(_) | ChargeOutcome::Duplicate) => Ok(()),
        Ok(ChargeOutcome::Inactive(status)) => {
            warn!(
                "Charge acknowledged for {} subscription {subscription_id}",
                status.as_str()
            );
            Ok(())
        }
        Err(LedgerError::SubscriptionNotFound) => {
            warn!("Recurring charge for unknown subscription {subscription_id}");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn subscription_stopped(ledger: &Ledger, data: &EventData, now: DateTime<Utc>) -> Result<()> {
    for key in data.subscription_keys() {
        match ledger.mark_subscription_failed(key, now).await {
            Ok(_) => return Ok(()),
            Err(LedgerError::SubscriptionNotFound) => continue,
            Err(e) => return Err(e),
        }
    }
    warn!("Subscription event did not match any stored subscription");
    Ok(())
}

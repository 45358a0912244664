//! Recurring donations.
//!
//! ```text
//! ACTIVE ◄──► PAUSED          (owner)
//!   │           │
//!   └────┬──────┘
//!        ▼
//!    CANCELLED                (owner, terminal)
//!
//! ACTIVE ──► FAILED           (gateway disable / not_renew, terminal)
//! ```
//!
//! A successful recurring charge writes the new donation, advances the
//! schedule and credits the campaign in one transaction. The charge's gateway
//! reference becomes the donation's `payment_reference`, so a redelivered event
//! collides on the unique index and changes nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::Caller;
use crate::db;
use crate::errors::{LedgerError, Result};
use crate::ledger::{credit, require_positive, require_text, Ledger};
use crate::models::{
    CampaignStatus, Donation, DonationStatus, DonationType, Subscription, SubscriptionInterval,
    SubscriptionStatus,
};
use crate::schedule::next_due_date;

const PROVIDER: &str = "PAYSTACK";

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubscription {
    pub amount: i64,
    pub interval: SubscriptionInterval,
    /// `None` donates to the general fund.
    pub campaign_id: Option<String>,
    pub payment_method_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Pause,
    Resume,
    Cancel,
}

impl SubscriptionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
        }
    }

    /// Target state, or `None` when the action is not legal from `from`.
    pub fn apply(&self, from: SubscriptionStatus) -> Option<SubscriptionStatus> {
        use SubscriptionStatus::*;
        match (self, from) {
            (Self::Pause, Active) => Some(Paused),
            (Self::Resume, Paused) => Some(Active),
            (Self::Cancel, Active | Paused) => Some(Cancelled),
            _ => None,
        }
    }
}

impl std::str::FromStr for SubscriptionAction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "cancel" => Ok(Self::Cancel),
            other => Err(LedgerError::InvalidInput(format!("unknown action {other}"))),
        }
    }
}

/// A successful charge reported by the gateway for a subscription.
#[derive(Debug, Clone)]
pub struct RecurringCharge {
    pub subscription_id: String,
    pub reference: String,
    /// Amount actually charged; falls back to the subscription amount.
    pub amount: Option<i64>,
    pub charged_at: DateTime<Utc>,
    pub donor_email: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    Recorded(Donation),
    /// The reference was already recorded.
    Duplicate,
    /// The subscription is not `ACTIVE`; nothing was written.
    Inactive(SubscriptionStatus),
}

impl Ledger {
    pub async fn create_subscription(
        &self,
        owner: &Caller,
        req: NewSubscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let amount = require_positive(req.amount, "amount")?;
        let next = next_due_date(req.interval, now)
            .ok_or_else(|| LedgerError::InvalidInput("next payment date out of range".into()))?;
        let ts = now.timestamp();

        let mut conn = self.pool.acquire().await?;
        let (campaign_id, currency) = match req.campaign_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                let campaign = db::get_campaign(&mut conn, id)
                    .await?
                    .ok_or(LedgerError::CampaignNotFound)?;
                if campaign.status != CampaignStatus::Active {
                    return Err(LedgerError::CampaignNotActive);
                }
                (Some(campaign.id), campaign.currency)
            }
            _ => (None, self.settings.default_currency.clone()),
        };

        let sub = Subscription {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: owner.user_id.clone(),
            campaign_id,
            amount,
            currency,
            interval: req.interval,
            status: SubscriptionStatus::Active,
            next_payment_date: next.timestamp(),
            last_payment_date: None,
            payment_method_token: req
                .payment_method_token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            provider: PROVIDER.to_string(),
            created_at: ts,
            updated_at: ts,
        };
        db::insert_subscription(&mut conn, &sub).await?;

        info!(
            "Subscription {} created for {} ({} {} {}), first charge due {}",
            sub.id,
            sub.user_id,
            sub.amount,
            sub.currency,
            sub.interval.as_str(),
            next.date_naive()
        );
        Ok(sub)
    }

    pub async fn list_subscriptions(&self, owner_id: &str) -> Result<Vec<Subscription>> {
        let mut conn = self.pool.acquire().await?;
        db::list_subscriptions_for_user(&mut conn, owner_id).await
    }

    pub async fn update_subscription(
        &self,
        subscription_id: &str,
        caller: &Caller,
        action: SubscriptionAction,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let mut conn = self.pool.acquire().await?;
        let mut sub = db::get_subscription(&mut conn, subscription_id)
            .await?
            .ok_or(LedgerError::SubscriptionNotFound)?;
        caller.require_owner(&sub.user_id)?;

        let invalid = |from: SubscriptionStatus| LedgerError::InvalidTransition {
            from: from.as_str().to_string(),
            action: action.as_str().to_string(),
        };
        let to = action.apply(sub.status).ok_or_else(|| invalid(sub.status))?;

        let ts = now.timestamp();
        if db::set_subscription_status(&mut conn, &sub.id, sub.status, to, ts).await? != 1 {
            // Lost a race with another writer; report what it left behind.
            let current = db::get_subscription(&mut conn, subscription_id)
                .await?
                .ok_or(LedgerError::SubscriptionNotFound)?;
            return Err(invalid(current.status));
        }

        info!(
            "Subscription {} {}: {} -> {}",
            sub.id,
            action.as_str(),
            sub.status.as_str(),
            to.as_str()
        );
        sub.status = to;
        sub.updated_at = ts;
        Ok(sub)
    }

    /// Record a successful recurring charge.
    pub async fn apply_recurring_charge(
        &self,
        charge: RecurringCharge,
        now: DateTime<Utc>,
    ) -> Result<ChargeOutcome> {
        let reference = require_text(&charge.reference, "reference")?;
        let ts = now.timestamp();
        let charged_at = charge.charged_at.timestamp();

        let mut tx = db::begin_write(&self.pool).await?;
        let sub = db::get_subscription(&mut tx, &charge.subscription_id)
            .await?
            .ok_or(LedgerError::SubscriptionNotFound)?;
        if sub.status != SubscriptionStatus::Active {
            info!(
                "Ignoring charge {reference} for {} subscription {}",
                sub.status.as_str(),
                sub.id
            );
            return Ok(ChargeOutcome::Inactive(sub.status));
        }

        let amount = require_positive(charge.amount.unwrap_or(sub.amount), "amount")?;
        let next = next_due_date(sub.interval, charge.charged_at).ok_or_else(|| {
            LedgerError::Integrity(format!("no next payment date after {charged_at}"))
        })?;

        let donation = Donation {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            currency: sub.currency.clone(),
            campaign_id: sub.campaign_id.clone(),
            donor_id: Some(sub.user_id.clone()),
            status: DonationStatus::Success,
            donation_type: DonationType::Online,
            payment_reference: Some(reference.to_string()),
            receipt_code: None,
            approval_status: None,
            received_by: None,
            approved_by: None,
            approved_at: None,
            flag_reason: None,
            notes: None,
            is_anonymous: false,
            subscription_id: Some(sub.id.clone()),
            created_at: ts,
            updated_at: ts,
        };
        match db::insert_donation(&mut tx, &donation).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                info!("Charge {reference} already recorded for subscription {}", sub.id);
                return Ok(ChargeOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        if db::advance_subscription(&mut tx, &sub.id, charged_at, next.timestamp(), ts).await? != 1 {
            let status = db::get_subscription(&mut tx, &sub.id)
                .await?
                .map(|s| s.status)
                .ok_or(LedgerError::SubscriptionNotFound)?;
            warn!("Subscription {} left ACTIVE mid-charge; discarding {reference}", sub.id);
            return Ok(ChargeOutcome::Inactive(status));
        }

        credit(&mut tx, &donation, ts).await?;
        tx.commit().await?;

        info!(
            "Recurring charge {reference} recorded for subscription {}; next due {}",
            sub.id,
            next.date_naive()
        );
        self.announce(&donation, charge.donor_email.as_deref()).await;
        Ok(ChargeOutcome::Recorded(donation))
    }

    /// Move an `ACTIVE` subscription to `FAILED` after the gateway stops
    /// renewing it. `key` is the stored payment-method token or the
    /// subscription id. Returns whether anything changed.
    pub async fn mark_subscription_failed(&self, key: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let sub = match db::get_subscription_by_token(&mut conn, key).await? {
            Some(sub) => sub,
            None => db::get_subscription(&mut conn, key)
                .await?
                .ok_or(LedgerError::SubscriptionNotFound)?,
        };

        let rows = db::set_subscription_status(
            &mut conn,
            &sub.id,
            SubscriptionStatus::Active,
            SubscriptionStatus::Failed,
            now.timestamp(),
        )
        .await?;
        if rows == 1 {
            warn!("Subscription {} marked FAILED by gateway", sub.id);
        }
        Ok(rows == 1)
    }
}

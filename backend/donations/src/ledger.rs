//! Donation state machine and campaign ledger.
//!
//! ## Online donations
//!
//! ```text
//! PENDING ──► SUCCESS   (credits the campaign)
//!    └──────► FAILED
//! ```
//!
//! ## Cash donations
//!
//! Created `SUCCESS` (the money is in hand) with `approval_status = PENDING`.
//! Only the move to `APPROVED` credits the campaign; `FLAGGED` holds the entry
//! for review and may still be approved or rejected.
//!
//! Every transition that makes a donation counted runs the status write and
//! [`credit`] in one transaction. The status write is a compare-and-set on the
//! source state, so a retried verify or a redelivered webhook changes zero
//! rows and is reported as [`LedgerError::AlreadyProcessed`] instead of
//! crediting twice.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{self, DonationFilter};
use crate::duplicate;
use crate::errors::{LedgerError, Result};
use crate::gateway::{GatewayOutcome, PaymentGateway, PaymentInit};
use crate::models::{
    ApprovalStatus, Campaign, CampaignStatus, Donation, DonationStatus, DonationType,
    SubscriptionInterval,
};
use crate::notify::{Notification, NotificationQueue};
use crate::receipt::{self, ReceiptKind};

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub duplicate_window: Duration,
    /// `None` disables expiry of stale online donations.
    pub pending_expiry: Option<Duration>,
    pub receipt_code_attempts: u32,
    pub callback_url: Option<String>,
    pub default_currency: String,
}

impl LedgerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            duplicate_window: Duration::hours(config.duplicate_window_hours),
            pending_expiry: (config.pending_expiry_hours > 0)
                .then(|| Duration::hours(config.pending_expiry_hours)),
            receipt_code_attempts: config.receipt_code_attempts.max(1),
            callback_url: config.payment_callback_url.clone(),
            default_currency: config.default_currency.clone(),
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            duplicate_window: Duration::hours(duplicate::DEFAULT_WINDOW_HOURS),
            pending_expiry: Some(Duration::hours(72)),
            receipt_code_attempts: 5,
            callback_url: None,
            default_currency: "NGN".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Ledger {
    pub(crate) pool: SqlitePool,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) notifications: NotificationQueue,
    pub(crate) settings: LedgerSettings,
}

// ─────────────────────────────────────────────────────────
// Inputs and outputs
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct OnlineDonationRequest {
    pub amount: i64,
    pub campaign_id: String,
    pub donor_email: String,
    pub donor_name: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurring_interval: Option<SubscriptionInterval>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatedDonation {
    pub donation: Donation,
    pub payment_reference: String,
    /// Hosted checkout URL; `None` when the gateway is unavailable.
    pub authorization_url: Option<String>,
    /// Handle for the gateway's inline checkout, when it issues one.
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CashDonationRequest {
    pub amount: i64,
    pub campaign_id: String,
    pub donor_email: String,
    pub donor_name: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    /// Set on resubmission after a duplicate warning.
    #[serde(default)]
    pub confirm_duplicate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CashOutcome {
    Recorded {
        donation: Donation,
        receipt_code: String,
        duplicate_warning: bool,
    },
    /// A matching entry exists in the duplicate window; nothing was written.
    NeedsConfirmation,
}

/// An approved cash donation and the campaign total it moved.
#[derive(Debug, Clone, Serialize)]
pub struct CashApproval {
    pub donation: Donation,
    pub campaign_current_amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCampaign {
    pub title: String,
    pub description: String,
    pub target_amount: i64,
    pub currency: Option<String>,
    pub branch_id: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_amount: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<CampaignStatus>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub donation_count: i64,
}

pub(crate) fn require_text<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(LedgerError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

pub(crate) fn require_positive(amount: i64, field: &'static str) -> Result<i64> {
    if amount > 0 {
        Ok(amount)
    } else {
        Err(LedgerError::InvalidInput(format!("{field} must be positive")))
    }
}

/// Apply a counted donation to its campaign total.
///
/// Shared by online verification, cash approval and recurring charges; the
/// caller holds the transaction that also wrote the donation's new state.
pub(crate) async fn credit(conn: &mut SqliteConnection, donation: &Donation, now: i64) -> Result<()> {
    if !donation.is_counted() {
        return Err(LedgerError::Integrity(format!(
            "credit requested for donation {} in uncounted state",
            donation.id
        )));
    }
    match &donation.campaign_id {
        Some(campaign_id) => db::credit_campaign(conn, campaign_id, donation.amount, now).await,
        // General-fund charge: no campaign total to move.
        None => Ok(()),
    }
}

impl Ledger {
    pub fn new(
        pool: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        notifications: NotificationQueue,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            pool,
            gateway,
            notifications,
            settings,
        }
    }

    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.gateway.as_ref()
    }

    // ─────────────────────────────────────────────────────
    // Online donations
    // ─────────────────────────────────────────────────────

    pub async fn initiate_online(
        &self,
        req: OnlineDonationRequest,
        now: DateTime<Utc>,
    ) -> Result<InitiatedDonation> {
        let amount = require_positive(req.amount, "amount")?;
        let campaign_id = require_text(&req.campaign_id, "campaign_id")?;
        let email = require_text(&req.donor_email, "donor_email")?;
        let ts = now.timestamp();

        let mut conn = self.pool.acquire().await?;
        let campaign = db::get_campaign(&mut conn, campaign_id)
            .await?
            .ok_or(LedgerError::CampaignNotFound)?;
        if campaign.status != CampaignStatus::Active {
            return Err(LedgerError::CampaignNotActive);
        }

        let donor = db::find_or_create_donor(&mut conn, email, req.donor_name.as_deref(), ts).await?;

        let mut donation = Donation {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            currency: campaign.currency.clone(),
            campaign_id: Some(campaign.id.clone()),
            donor_id: Some(donor.id.clone()),
            status: DonationStatus::Pending,
            donation_type: DonationType::Online,
            payment_reference: None,
            receipt_code: None,
            approval_status: None,
            received_by: None,
            approved_by: None,
            approved_at: None,
            flag_reason: None,
            notes: None,
            is_anonymous: req.is_anonymous,
            subscription_id: None,
            created_at: ts,
            updated_at: ts,
        };
        let reference = self
            .insert_with_code(&mut conn, &mut donation, ReceiptKind::Online, now)
            .await?;
        drop(conn);

        info!(
            "Online donation {} created for campaign {} ({} {})",
            donation.id, campaign.id, amount, campaign.currency
        );

        // Recording and capture are decoupled: a gateway failure leaves a
        // PENDING donation with no redirect.
        let init = PaymentInit {
            email: donor.email.clone(),
            amount,
            reference: reference.clone(),
            callback_url: self.settings.callback_url.clone(),
            metadata: json!({
                "donation_id": donation.id,
                "campaign_id": campaign.id,
                "is_recurring": req.is_recurring,
                "recurring_interval": req.recurring_interval,
                "donor_name": req.donor_name,
            }),
        };
        let (authorization_url, access_code) = match self.gateway.initialize(&init).await {
            Ok(handle) => (Some(handle.authorization_url), handle.access_code),
            Err(e) => {
                warn!("Payment initialisation unavailable for {reference}: {e}");
                (None, None)
            }
        };

        Ok(InitiatedDonation {
            donation,
            payment_reference: reference,
            authorization_url,
            access_code,
        })
    }

    pub async fn verify_online(
        &self,
        reference: &str,
        outcome: GatewayOutcome,
        now: DateTime<Utc>,
    ) -> Result<Donation> {
        let reference = require_text(reference, "reference")?;
        let to = match outcome {
            GatewayOutcome::Success => DonationStatus::Success,
            GatewayOutcome::Failed => DonationStatus::Failed,
            GatewayOutcome::Pending => {
                return Err(LedgerError::InvalidInput(
                    "payment has not completed at the gateway".into(),
                ))
            }
        };
        let ts = now.timestamp();

        let mut tx = db::begin_write(&self.pool).await?;
        let mut donation = pending_online(&mut tx, reference).await?;

        if db::resolve_pending_online(&mut tx, &donation.id, to, ts).await? != 1 {
            return Err(LedgerError::AlreadyProcessed);
        }
        donation.status = to;
        donation.updated_at = ts;

        if to == DonationStatus::Success {
            credit(&mut tx, &donation, ts).await?;
        }
        tx.commit().await?;

        info!(
            "Donation {} resolved {} via {reference}",
            donation.id,
            to.as_str()
        );
        if to == DonationStatus::Success {
            self.announce(&donation, None).await;
        }
        Ok(donation)
    }

    /// The online donation behind `reference`, provided it still awaits an
    /// outcome. Checked before the gateway is asked about the reference.
    pub async fn open_online(&self, reference: &str) -> Result<Donation> {
        let reference = require_text(reference, "reference")?;
        let mut conn = self.pool.acquire().await?;
        pending_online(&mut conn, reference).await
    }

    // ─────────────────────────────────────────────────────
    // Cash donations
    // ─────────────────────────────────────────────────────

    /// `recorder_id` must already have been checked for staff privilege.
    pub async fn record_cash(
        &self,
        req: CashDonationRequest,
        recorder_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CashOutcome> {
        let amount = require_positive(req.amount, "amount")?;
        let campaign_id = require_text(&req.campaign_id, "campaign_id")?;
        let email = require_text(&req.donor_email, "donor_email")?;
        let ts = now.timestamp();

        let mut conn = self.pool.acquire().await?;
        let campaign = db::get_campaign(&mut conn, campaign_id)
            .await?
            .ok_or(LedgerError::CampaignNotFound)?;

        let suspected = duplicate::is_duplicate(
            &mut conn,
            amount,
            email,
            &campaign.id,
            self.settings.duplicate_window,
            now,
        )
        .await?;
        if suspected && !req.confirm_duplicate {
            info!(
                "Cash entry of {amount} for {} looks like a duplicate; awaiting confirmation",
                campaign.id
            );
            return Ok(CashOutcome::NeedsConfirmation);
        }

        let donor = db::find_or_create_donor(&mut conn, email, req.donor_name.as_deref(), ts).await?;

        let mut donation = Donation {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            currency: campaign.currency.clone(),
            campaign_id: Some(campaign.id.clone()),
            donor_id: Some(donor.id.clone()),
            status: DonationStatus::Success,
            donation_type: DonationType::Cash,
            payment_reference: None,
            receipt_code: None,
            approval_status: Some(ApprovalStatus::Pending),
            received_by: Some(recorder_id.to_string()),
            approved_by: None,
            approved_at: None,
            flag_reason: None,
            notes: req.notes.filter(|n| !n.trim().is_empty()),
            is_anonymous: req.is_anonymous,
            subscription_id: None,
            created_at: ts,
            updated_at: ts,
        };
        let receipt_code = self
            .insert_with_code(&mut conn, &mut donation, ReceiptKind::Cash, now)
            .await?;
        drop(conn);

        info!(
            "Cash donation {} ({receipt_code}) recorded by {recorder_id}, awaiting approval",
            donation.id
        );
        self.announce(&donation, None).await;

        Ok(CashOutcome::Recorded {
            donation,
            receipt_code,
            duplicate_warning: suspected,
        })
    }

    /// `approver_id` must already have been checked for super-admin privilege.
    pub async fn approve_cash(
        &self,
        donation_id: &str,
        approver_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CashApproval> {
        let ts = now.timestamp();
        let mut tx = db::begin_write(&self.pool).await?;
        let mut donation = self.open_cash_review(&mut tx, donation_id).await?;
        let campaign_id = donation.campaign_id.clone().ok_or_else(|| {
            LedgerError::Integrity(format!("cash donation {} has no campaign", donation.id))
        })?;

        let rows = db::review_cash(
            &mut tx,
            &donation.id,
            &[ApprovalStatus::Pending, ApprovalStatus::Flagged],
            ApprovalStatus::Approved,
            approver_id,
            None,
            ts,
        )
        .await?;
        if rows != 1 {
            return Err(LedgerError::AlreadyProcessed);
        }
        donation.approval_status = Some(ApprovalStatus::Approved);
        donation.approved_by = Some(approver_id.to_string());
        donation.approved_at = Some(ts);
        donation.updated_at = ts;

        credit(&mut tx, &donation, ts).await?;
        let campaign = db::get_campaign(&mut tx, &campaign_id)
            .await?
            .ok_or(LedgerError::CampaignNotFound)?;
        tx.commit().await?;

        info!(
            "Cash donation {} approved by {approver_id}; campaign {campaign_id} now at {}",
            donation.id, campaign.current_amount
        );
        Ok(CashApproval {
            donation,
            campaign_current_amount: campaign.current_amount,
        })
    }

    pub async fn flag_cash(
        &self,
        donation_id: &str,
        reviewer_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Donation> {
        let reason = require_text(reason, "reason")?;
        let ts = now.timestamp();
        let mut conn = self.pool.acquire().await?;
        let mut donation = self.open_cash_review(&mut conn, donation_id).await?;
        if donation.approval_status != Some(ApprovalStatus::Pending) {
            return Err(LedgerError::AlreadyProcessed);
        }

        let rows = db::review_cash(
            &mut conn,
            &donation.id,
            &[ApprovalStatus::Pending],
            ApprovalStatus::Flagged,
            reviewer_id,
            Some(reason),
            ts,
        )
        .await?;
        if rows != 1 {
            return Err(LedgerError::AlreadyProcessed);
        }
        donation.approval_status = Some(ApprovalStatus::Flagged);
        donation.flag_reason = Some(reason.to_string());
        donation.approved_by = Some(reviewer_id.to_string());
        donation.approved_at = Some(ts);
        donation.updated_at = ts;

        warn!("Cash donation {} flagged by {reviewer_id}: {reason}", donation.id);
        Ok(donation)
    }

    pub async fn reject_cash(
        &self,
        donation_id: &str,
        reviewer_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Donation> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let ts = now.timestamp();
        let mut conn = self.pool.acquire().await?;
        let mut donation = self.open_cash_review(&mut conn, donation_id).await?;

        let rows = db::review_cash(
            &mut conn,
            &donation.id,
            &[ApprovalStatus::Pending, ApprovalStatus::Flagged],
            ApprovalStatus::Rejected,
            reviewer_id,
            reason,
            ts,
        )
        .await?;
        if rows != 1 {
            return Err(LedgerError::AlreadyProcessed);
        }
        donation.approval_status = Some(ApprovalStatus::Rejected);
        if let Some(reason) = reason {
            donation.flag_reason = Some(reason.to_string());
        }
        donation.approved_by = Some(reviewer_id.to_string());
        donation.approved_at = Some(ts);
        donation.updated_at = ts;

        info!("Cash donation {} rejected by {reviewer_id}", donation.id);
        Ok(donation)
    }

    /// Load a cash donation a reviewer may still act on.
    async fn open_cash_review(&self, conn: &mut SqliteConnection, donation_id: &str) -> Result<Donation> {
        let donation = db::get_donation(conn, donation_id)
            .await?
            .ok_or(LedgerError::DonationNotFound)?;
        if donation.donation_type != DonationType::Cash {
            return Err(LedgerError::NotCashDonation);
        }
        match donation.approval_status {
            Some(status) if status.is_open() => Ok(donation),
            _ => Err(LedgerError::AlreadyProcessed),
        }
    }

    // ─────────────────────────────────────────────────────
    // Queries and housekeeping
    // ─────────────────────────────────────────────────────

    pub async fn get_donation(&self, donation_id: &str) -> Result<Donation> {
        let mut conn = self.pool.acquire().await?;
        db::get_donation(&mut conn, donation_id)
            .await?
            .ok_or(LedgerError::DonationNotFound)
    }

    pub async fn list_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>> {
        let mut conn = self.pool.acquire().await?;
        db::list_donations(&mut conn, filter).await
    }

    /// Fail online donations left `PENDING` past the expiry window.
    pub async fn expire_stale_pending(&self, now: DateTime<Utc>) -> Result<u64> {
        let Some(expiry) = self.settings.pending_expiry else {
            return Ok(0);
        };
        let cutoff = (now - expiry).timestamp();
        let mut conn = self.pool.acquire().await?;
        db::expire_pending_online(&mut conn, cutoff, now.timestamp()).await
    }

    // ─────────────────────────────────────────────────────
    // Campaigns
    // ─────────────────────────────────────────────────────

    /// `creator_id` must already have been checked for staff privilege.
    pub async fn create_campaign(
        &self,
        req: NewCampaign,
        creator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let title = require_text(&req.title, "title")?;
        let description = require_text(&req.description, "description")?;
        let target = require_positive(req.target_amount, "target_amount")?;
        check_dates(req.start_date, req.end_date)?;
        let ts = now.timestamp();

        let campaign = Campaign {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            target_amount: target,
            current_amount: 0,
            currency: req
                .currency
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| self.settings.default_currency.clone()),
            status: CampaignStatus::Active,
            creator_id: creator_id.to_string(),
            branch_id: req.branch_id,
            start_date: req.start_date,
            end_date: req.end_date,
            created_at: ts,
            updated_at: ts,
        };
        let mut conn = self.pool.acquire().await?;
        db::insert_campaign(&mut conn, &campaign).await?;
        info!("Campaign {} created by {creator_id}", campaign.id);
        Ok(campaign)
    }

    pub async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
        branch_id: Option<&str>,
    ) -> Result<Vec<Campaign>> {
        let mut conn = self.pool.acquire().await?;
        db::list_campaigns(&mut conn, status, branch_id).await
    }

    pub async fn get_campaign(&self, campaign_id: &str) -> Result<CampaignDetail> {
        let mut conn = self.pool.acquire().await?;
        let campaign = db::get_campaign(&mut conn, campaign_id)
            .await?
            .ok_or(LedgerError::CampaignNotFound)?;
        let donation_count = db::count_campaign_donations(&mut conn, campaign_id).await?;
        Ok(CampaignDetail {
            campaign,
            donation_count,
        })
    }

    /// Edit campaign details. The running total is not editable here.
    pub async fn update_campaign(
        &self,
        campaign_id: &str,
        changes: CampaignChanges,
        editor: &crate::auth::Caller,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let mut conn = self.pool.acquire().await?;
        let mut campaign = db::get_campaign(&mut conn, campaign_id)
            .await?
            .ok_or(LedgerError::CampaignNotFound)?;
        if campaign.creator_id != editor.user_id && editor.require_super_admin().is_err() {
            return Err(LedgerError::Forbidden(
                "only the creator or a super administrator may edit this campaign".into(),
            ));
        }

        if let Some(title) = &changes.title {
            campaign.title = require_text(title, "title")?.to_string();
        }
        if let Some(description) = &changes.description {
            campaign.description = require_text(description, "description")?.to_string();
        }
        if let Some(target) = changes.target_amount {
            campaign.target_amount = require_positive(target, "target_amount")?;
        }
        if let Some(currency) = &changes.currency {
            campaign.currency = require_text(currency, "currency")?.to_ascii_uppercase();
        }
        if let Some(status) = changes.status {
            if !campaign.status.can_become(status) {
                return Err(LedgerError::InvalidInput(format!(
                    "campaign cannot move from {} to {}",
                    campaign.status.as_str(),
                    status.as_str()
                )));
            }
            campaign.status = status;
        }
        if changes.start_date.is_some() {
            campaign.start_date = changes.start_date;
        }
        if changes.end_date.is_some() {
            campaign.end_date = changes.end_date;
        }
        check_dates(campaign.start_date, campaign.end_date)?;
        campaign.updated_at = now.timestamp();

        db::update_campaign_details(&mut conn, &campaign).await?;
        // Re-read so the returned total reflects concurrent credits.
        db::get_campaign(&mut conn, campaign_id)
            .await?
            .ok_or(LedgerError::CampaignNotFound)
    }

    /// Remove a campaign that never received a donation.
    pub async fn delete_campaign(&self, campaign_id: &str) -> Result<()> {
        let mut tx = db::begin_write(&self.pool).await?;
        if db::get_campaign(&mut tx, campaign_id).await?.is_none() {
            return Err(LedgerError::CampaignNotFound);
        }
        if db::count_campaign_donations(&mut tx, campaign_id).await? > 0 {
            return Err(LedgerError::CampaignHasDonations);
        }
        db::delete_campaign(&mut tx, campaign_id).await?;
        tx.commit().await?;
        info!("Campaign {campaign_id} deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────

    /// Insert `donation` under a freshly generated receipt code (cash) or
    /// payment reference (online), regenerating on a uniqueness collision.
    pub(crate) async fn insert_with_code(
        &self,
        conn: &mut SqliteConnection,
        donation: &mut Donation,
        kind: ReceiptKind,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let attempts = self.settings.receipt_code_attempts.max(1);
        for attempt in 1..=attempts {
            let code = receipt::generate(kind, now, &mut rand::thread_rng());
            match kind {
                ReceiptKind::Cash => donation.receipt_code = Some(code.clone()),
                ReceiptKind::Online => donation.payment_reference = Some(code.clone()),
            }
            match db::insert_donation(conn, donation).await {
                Ok(()) => return Ok(code),
                Err(e) if e.is_unique_violation() => {
                    warn!("{} code collision on attempt {attempt}: {code}", kind.prefix());
                }
                Err(e) => return Err(e),
            }
        }
        Err(LedgerError::Integrity(format!(
            "no unique {} code after {attempts} attempts",
            kind.prefix()
        )))
    }

    /// Queue a donor confirmation. Lookup failures are logged and swallowed.
    pub(crate) async fn announce(&self, donation: &Donation, donor_email: Option<&str>) {
        let lookup = async {
            let mut conn = self.pool.acquire().await?;
            let donor = match &donation.donor_id {
                Some(id) => db::get_user(&mut conn, id).await?,
                None => None,
            };
            let campaign_title = match &donation.campaign_id {
                Some(id) => db::get_campaign(&mut conn, id).await?.map(|c| c.title),
                None => None,
            };
            Ok::<_, LedgerError>((donor, campaign_title))
        };

        let (donor, campaign_title) = match lookup.await {
            Ok(found) => found,
            Err(e) => {
                warn!("Skipping confirmation for donation {}: {e}", donation.id);
                return;
            }
        };
        let email = donor_email
            .map(String::from)
            .or_else(|| donor.as_ref().map(|d| d.email.clone()));
        let Some(donor_email) = email else {
            warn!("No contact address for donation {}", donation.id);
            return;
        };

        self.notifications.publish(Notification::DonationConfirmed {
            donation_id: donation.id.clone(),
            donor_email,
            donor_name: donor.and_then(|d| d.name),
            amount: donation.amount,
            currency: donation.currency.clone(),
            campaign_title,
            receipt_code: donation
                .receipt_code
                .clone()
                .or_else(|| donation.payment_reference.clone()),
            method: donation.donation_type,
        });
    }
}

async fn pending_online(conn: &mut SqliteConnection, reference: &str) -> Result<Donation> {
    let donation = db::get_donation_by_reference(conn, reference)
        .await?
        .ok_or(LedgerError::DonationNotFound)?;
    if donation.donation_type != DonationType::Online || donation.status != DonationStatus::Pending {
        return Err(LedgerError::AlreadyProcessed);
    }
    Ok(donation)
}

fn check_dates(start: Option<i64>, end: Option<i64>) -> Result<()> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(LedgerError::InvalidInput(
            "end_date must not precede start_date".into(),
        )),
        _ => Ok(()),
    }
}

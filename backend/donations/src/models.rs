//! Ledger records as stored in / read from the database.
//!
//! Money is held in minor currency units (kobo for NGN) as `i64`; timestamps are
//! unix seconds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Active,
    Completed,
    Archived,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Forward-only lifecycle: `ACTIVE -> COMPLETED -> ARCHIVED`, `ACTIVE -> ARCHIVED`.
    pub fn can_become(&self, next: CampaignStatus) -> bool {
        *self == next
            || matches!(
                (self, next),
                (Self::Active, Self::Completed)
                    | (Self::Active, Self::Archived)
                    | (Self::Completed, Self::Archived)
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Pending,
    Success,
    Failed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationType {
    Online,
    Cash,
}

/// Review state of a cash donation.
///
/// ```text
/// PENDING ──► APPROVED
///    │  └───► REJECTED
///    └──► FLAGGED ──► APPROVED | REJECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Flagged,
    Rejected,
}

impl ApprovalStatus {
    /// States a reviewer may still act on.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Flagged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionInterval {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl SubscriptionInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Quarterly => "QUARTERLY",
            Self::Yearly => "YEARLY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
    Failed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Donor,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DONOR" => Some(Self::Donor),
            "ADMIN" => Some(Self::Admin),
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: String,
    pub title: String,
    pub description: String,
    pub target_amount: i64,
    pub current_amount: i64,
    pub currency: String,
    pub status: CampaignStatus,
    pub creator_id: String,
    pub branch_id: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Donation {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    /// `None` only for recurring charges to the general fund.
    pub campaign_id: Option<String>,
    pub donor_id: Option<String>,
    pub status: DonationStatus,
    pub donation_type: DonationType,
    pub payment_reference: Option<String>,
    pub receipt_code: Option<String>,
    pub approval_status: Option<ApprovalStatus>,
    pub received_by: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<i64>,
    pub flag_reason: Option<String>,
    pub notes: Option<String>,
    pub is_anonymous: bool,
    pub subscription_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Donation {
    /// Whether this donation is already reflected in its campaign's `current_amount`.
    pub fn is_counted(&self) -> bool {
        match self.donation_type {
            DonationType::Online => self.status == DonationStatus::Success,
            DonationType::Cash => self.approval_status == Some(ApprovalStatus::Approved),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub campaign_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub interval: SubscriptionInterval,
    pub status: SubscriptionStatus,
    pub next_payment_date: i64,
    pub last_payment_date: Option<i64>,
    pub payment_method_token: Option<String>,
    pub provider: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donation(kind: DonationType, status: DonationStatus, approval: Option<ApprovalStatus>) -> Donation {
        Donation {
            id: "d1".into(),
            amount: 500,
            currency: "NGN".into(),
            campaign_id: Some("c1".into()),
            donor_id: None,
            status,
            donation_type: kind,
            payment_reference: None,
            receipt_code: None,
            approval_status: approval,
            received_by: None,
            approved_by: None,
            approved_at: None,
            flag_reason: None,
            notes: None,
            is_anonymous: false,
            subscription_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn counted_state_per_type() {
        assert!(donation(DonationType::Online, DonationStatus::Success, None).is_counted());
        assert!(!donation(DonationType::Online, DonationStatus::Pending, None).is_counted());
        assert!(!donation(DonationType::Online, DonationStatus::Failed, None).is_counted());

        // Cash is SUCCESS from the start; only approval counts.
        assert!(!donation(
            DonationType::Cash,
            DonationStatus::Success,
            Some(ApprovalStatus::Pending)
        )
        .is_counted());
        assert!(!donation(
            DonationType::Cash,
            DonationStatus::Success,
            Some(ApprovalStatus::Flagged)
        )
        .is_counted());
        assert!(donation(
            DonationType::Cash,
            DonationStatus::Success,
            Some(ApprovalStatus::Approved)
        )
        .is_counted());
    }

    #[test]
    fn campaign_status_is_forward_only() {
        assert!(CampaignStatus::Active.can_become(CampaignStatus::Completed));
        assert!(CampaignStatus::Active.can_become(CampaignStatus::Archived));
        assert!(CampaignStatus::Completed.can_become(CampaignStatus::Archived));
        assert!(!CampaignStatus::Archived.can_become(CampaignStatus::Active));
        assert!(!CampaignStatus::Completed.can_become(CampaignStatus::Active));
    }

    #[test]
    fn role_header_parsing() {
        assert_eq!(Role::from_header("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::from_header(" ADMIN "), Some(Role::Admin));
        assert_eq!(Role::from_header("DONOR"), Some(Role::Donor));
        assert_eq!(Role::from_header("root"), None);
        assert!(Role::Admin.is_staff());
        assert!(!Role::Donor.is_staff());
    }

    #[test]
    fn enums_serialize_screaming_case() {
        assert_eq!(
            serde_json::to_string(&ApprovalStatus::Flagged).unwrap(),
            "\"FLAGGED\""
        );
        assert_eq!(
            serde_json::from_str::<SubscriptionInterval>("\"QUARTERLY\"").unwrap(),
            SubscriptionInterval::Quarterly
        );
    }
}

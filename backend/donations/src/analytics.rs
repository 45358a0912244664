//! Fundraising dashboard.
//!
//! Every figure is computed over counted donations only (online `SUCCESS`,
//! cash `APPROVED`), the same set campaign totals are built from. Days are
//! UTC calendar days.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::db;
use crate::errors::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::models::CampaignStatus;

pub const DEFAULT_DAYS: u32 = 30;
pub const MAX_DAYS: u32 = 365;
const TOP_CAMPAIGNS: i64 = 5;
const TOP_DONORS: i64 = 10;
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Totals {
    pub amount: i64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailyTrend {
    /// `YYYY-MM-DD`
    pub date: String,
    pub amount: i64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TopCampaign {
    pub id: String,
    pub title: String,
    pub target_amount: i64,
    pub current_amount: i64,
    pub currency: String,
    pub donation_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TopDonor {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub total_amount: i64,
    pub donation_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_raised: i64,
    pub total_donations: i64,
    pub total_donors: i64,
    pub active_campaigns: i64,
    pub todays_amount: i64,
    pub todays_count: i64,
    /// Whole minor units, rounded down.
    pub average_donation: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub summary: Summary,
    /// One entry per day that received counted donations, oldest first.
    pub trends: Vec<DailyTrend>,
    pub top_campaigns: Vec<TopCampaign>,
    pub top_donors: Vec<TopDonor>,
}

/// Build the dashboard as of `now`, with trends covering today and the `days`
/// days before it.
pub async fn dashboard(conn: &mut SqliteConnection, days: u32, now: DateTime<Utc>) -> Result<Dashboard> {
    let ts = now.timestamp();
    let today = ts - ts.rem_euclid(SECONDS_PER_DAY);
    let tomorrow = today + SECONDS_PER_DAY;
    let window_start = today - i64::from(days) * SECONDS_PER_DAY;

    let all_time = db::counted_totals_between(&mut *conn, i64::MIN, i64::MAX).await?;
    let todays = db::counted_totals_between(&mut *conn, today, tomorrow).await?;
    let total_donors = db::count_counted_donors(&mut *conn).await?;
    let active_campaigns = db::count_campaigns_with_status(&mut *conn, CampaignStatus::Active).await?;
    let trends = db::daily_totals(&mut *conn, window_start, tomorrow).await?;
    let top_campaigns = db::top_campaigns(&mut *conn, TOP_CAMPAIGNS).await?;
    let top_donors = db::top_donors(conn, TOP_DONORS).await?;

    let average_donation = if all_time.count > 0 {
        all_time.amount / all_time.count
    } else {
        0
    };

    Ok(Dashboard {
        summary: Summary {
            total_raised: all_time.amount,
            total_donations: all_time.count,
            total_donors,
            active_campaigns,
            todays_amount: todays.amount,
            todays_count: todays.count,
            average_donation,
        },
        trends,
        top_campaigns,
        top_donors,
    })
}

impl Ledger {
    pub async fn dashboard(&self, days: Option<u32>, now: DateTime<Utc>) -> Result<Dashboard> {
        let days = days.unwrap_or(DEFAULT_DAYS);
        if !(1..=MAX_DAYS).contains(&days) {
            return Err(LedgerError::InvalidInput(format!(
                "days must be between 1 and {MAX_DAYS}"
            )));
        }
        let mut conn = self.pool.acquire().await?;
        dashboard(&mut conn, days, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};
    use crate::gateway::{DisabledGateway, GatewayOutcome};
    use crate::ledger::tests::{at, ledger_with};
    use crate::ledger::OnlineDonationRequest;
    use std::sync::Arc;

    fn gift(campaign_id: &str, amount: i64, email: &str, anonymous: bool) -> OnlineDonationRequest {
        OnlineDonationRequest {
            amount,
            campaign_id: campaign_id.to_string(),
            donor_email: email.to_string(),
            donor_name: None,
            is_anonymous: anonymous,
            is_recurring: false,
            recurring_interval: None,
        }
    }

    #[tokio::test]
    async fn dashboard_counts_only_counted_donations() {
        let pool = test_pool().await;
        let a = fixtures::campaign(&pool, 100_000, CampaignStatus::Active).await;
        let b = fixtures::campaign(&pool, 100_000, CampaignStatus::Active).await;
        fixtures::campaign(&pool, 100_000, CampaignStatus::Archived).await;
        let (ledger, _rx) = ledger_with(pool.clone(), Arc::new(DisabledGateway));
        let now = at(2025, 3, 10, 15);

        // Approved cash today and back in January; one entry left unapproved.
        let today_cash = fixtures::donation_for(
            &pool,
            &a.id,
            "samuel@example.org",
            5_000,
            at(2025, 3, 10, 9).timestamp(),
        )
        .await;
        ledger.approve_cash(&today_cash.id, "pastor", now).await.unwrap();
        let old_cash =
            fixtures::donation_for(&pool, &a.id, "old@example.org", 4_000, at(2025, 1, 1, 0).timestamp())
                .await;
        ledger.approve_cash(&old_cash.id, "pastor", now).await.unwrap();
        fixtures::donation_for(&pool, &a.id, "ruth@example.org", 2_000, at(2025, 3, 8, 9).timestamp())
            .await;

        let paid = ledger
            .initiate_online(gift(&b.id, 3_000, "grace@example.org", false), at(2025, 3, 9, 12))
            .await
            .unwrap();
        ledger
            .verify_online(&paid.payment_reference, GatewayOutcome::Success, now)
            .await
            .unwrap();
        let anonymous = ledger
            .initiate_online(gift(&b.id, 1_000, "anon@example.org", true), at(2025, 3, 10, 8))
            .await
            .unwrap();
        ledger
            .verify_online(&anonymous.payment_reference, GatewayOutcome::Success, now)
            .await
            .unwrap();
        let failed = ledger
            .initiate_online(gift(&a.id, 9_999, "grace@example.org", false), at(2025, 3, 10, 10))
            .await
            .unwrap();
        ledger
            .verify_online(&failed.payment_reference, GatewayOutcome::Failed, now)
            .await
            .unwrap();

        let d = ledger.dashboard(Some(7), now).await.unwrap();
        assert_eq!(
            d.summary,
            Summary {
                total_raised: 13_000,
                total_donations: 4,
                total_donors: 4,
                active_campaigns: 2,
                todays_amount: 6_000,
                todays_count: 2,
                average_donation: 3_250,
            }
        );

        let trend: Vec<_> = d.trends.iter().map(|t| (t.date.as_str(), t.amount, t.count)).collect();
        assert_eq!(trend, vec![("2025-03-09", 3_000, 1), ("2025-03-10", 6_000, 2)]);

        let campaigns: Vec<_> = d
            .top_campaigns
            .iter()
            .map(|c| (c.id.as_str(), c.current_amount, c.donation_count))
            .collect();
        assert_eq!(campaigns, vec![(a.id.as_str(), 9_000, 2), (b.id.as_str(), 4_000, 2)]);

        let donors: Vec<_> = d.top_donors.iter().map(|t| (t.email.as_str(), t.total_amount)).collect();
        assert_eq!(
            donors,
            vec![
                ("samuel@example.org", 5_000),
                ("old@example.org", 4_000),
                ("grace@example.org", 3_000),
            ]
        );
    }

    #[tokio::test]
    async fn empty_ledger_has_zero_average() {
        let pool = test_pool().await;
        let (ledger, _rx) = ledger_with(pool, Arc::new(DisabledGateway));

        let d = ledger.dashboard(None, at(2025, 3, 10, 15)).await.unwrap();
        assert_eq!(d.summary.total_raised, 0);
        assert_eq!(d.summary.average_donation, 0);
        assert!(d.trends.is_empty());
        assert!(d.top_campaigns.is_empty());
        assert!(d.top_donors.is_empty());
    }

    #[tokio::test]
    async fn window_must_be_in_range() {
        let pool = test_pool().await;
        let (ledger, _rx) = ledger_with(pool, Arc::new(DisabledGateway));
        let now = at(2025, 3, 10, 15);

        for days in [0, MAX_DAYS + 1] {
            let err = ledger.dashboard(Some(days), now).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidInput(_)), "{days}");
        }
    }
}

//! Duplicate detector for cash entries.
//!
//! Donors are matched on contact e-mail rather than user id because the donor
//! record may not exist yet when staff type the entry in. A hit is advisory:
//! the caller may resubmit with an explicit override.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;

use crate::db;
use crate::errors::Result;

pub const DEFAULT_WINDOW_HOURS: i64 = 24;

pub async fn is_duplicate(
    conn: &mut SqliteConnection,
    amount: i64,
    donor_email: &str,
    campaign_id: &str,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<bool> {
    let since = (now - window).timestamp();
    db::recent_matching_donation_exists(conn, campaign_id, donor_email.trim(), amount, since).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};
    use crate::models::CampaignStatus;
    use chrono::TimeZone;

    fn window() -> Duration {
        Duration::hours(DEFAULT_WINDOW_HOURS)
    }

    #[tokio::test]
    async fn same_donor_campaign_amount_within_window_is_duplicate() {
        let pool = test_pool().await;
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let c = fixtures::campaign(&pool, 100_000, CampaignStatus::Active).await;
        let earlier = (now - Duration::hours(3)).timestamp();
        fixtures::donation_for(&pool, &c.id, "d@example.org", 5_000, earlier).await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(is_duplicate(&mut conn, 5_000, "d@example.org", &c.id, window(), now)
            .await
            .unwrap());
        // Contact identity matches regardless of case.
        assert!(is_duplicate(&mut conn, 5_000, "D@Example.org", &c.id, window(), now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn outside_window_or_different_amount_is_not_duplicate() {
        let pool = test_pool().await;
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let c = fixtures::campaign(&pool, 100_000, CampaignStatus::Active).await;
        let old = (now - Duration::hours(25)).timestamp();
        fixtures::donation_for(&pool, &c.id, "d@example.org", 5_000, old).await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(!is_duplicate(&mut conn, 5_000, "d@example.org", &c.id, window(), now)
            .await
            .unwrap());
        assert!(!is_duplicate(&mut conn, 4_000, "d@example.org", &c.id, window(), now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn other_campaign_or_donor_is_not_duplicate() {
        let pool = test_pool().await;
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let a = fixtures::campaign(&pool, 100_000, CampaignStatus::Active).await;
        let b = fixtures::campaign(&pool, 100_000, CampaignStatus::Active).await;
        fixtures::donation_for(&pool, &a.id, "d@example.org", 5_000, now.timestamp()).await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(!is_duplicate(&mut conn, 5_000, "d@example.org", &b.id, window(), now)
            .await
            .unwrap());
        assert!(!is_duplicate(&mut conn, 5_000, "e@example.org", &a.id, window(), now)
            .await
            .unwrap());
    }
}

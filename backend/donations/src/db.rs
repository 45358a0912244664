//! Database layer: migrations, queries, and the campaign credit primitive.
//!
//! Functions take `&mut SqliteConnection` so the same statement runs on a pooled
//! connection or inside an open transaction (`&mut *tx`).

use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction,
};
use tracing::info;

use crate::analytics::{DailyTrend, TopCampaign, TopDonor, Totals};
use crate::errors::{LedgerError, Result};
use crate::models::{
    ApprovalStatus, Campaign, CampaignStatus, Donation, DonationStatus, Subscription,
    SubscriptionStatus, User,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet. Writers queue on
    // the busy timeout rather than failing with SQLITE_BUSY.
    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// Open a transaction that holds the write lock from its first statement.
///
/// A deferred transaction that reads before writing cannot wait for the lock
/// when another writer commits first; SQLite fails the upgrade instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Single-connection in-memory pool with the schema applied.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

const CAMPAIGN_COLUMNS: &str = "id, title, description, target_amount, current_amount, currency, \
     status, creator_id, branch_id, start_date, end_date, created_at, updated_at";

const DONATION_COLUMNS: &str = "id, amount, currency, campaign_id, donor_id, status, donation_type, \
     payment_reference, receipt_code, approval_status, received_by, approved_by, approved_at, \
     flag_reason, notes, is_anonymous, subscription_id, created_at, updated_at";

/// Donations that count toward a campaign total.
const COUNTED: &str = "((donation_type = 'ONLINE' AND status = 'SUCCESS') \
     OR (donation_type = 'CASH' AND approval_status = 'APPROVED'))";

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, campaign_id, amount, currency, interval, status, \
     next_payment_date, last_payment_date, payment_method_token, provider, created_at, updated_at";

// ─────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────

pub async fn find_user_by_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, created_at FROM users WHERE email = ?1",
    )
    .bind(email)
    .fetch_optional(conn)
    .await?;
    Ok(user)
}

pub async fn get_user(conn: &mut SqliteConnection, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, created_at FROM users WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(user)
}

/// Look the donor up by e-mail, creating a `DONOR` account on first contact.
pub async fn find_or_create_donor(
    conn: &mut SqliteConnection,
    email: &str,
    name: Option<&str>,
    now: i64,
) -> Result<User> {
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, role, created_at)
        VALUES (?1, ?2, ?3, 'DONOR', ?4)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(name)
    .bind(email)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    find_user_by_email(conn, email)
        .await?
        .ok_or_else(|| LedgerError::Integrity(format!("donor {email} vanished after upsert")))
}

// ─────────────────────────────────────────────────────────
// Campaigns
// ─────────────────────────────────────────────────────────

pub async fn insert_campaign(conn: &mut SqliteConnection, c: &Campaign) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO campaigns
            (id, title, description, target_amount, current_amount, currency, status,
             creator_id, branch_id, start_date, end_date, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&c.id)
    .bind(&c.title)
    .bind(&c.description)
    .bind(c.target_amount)
    .bind(c.current_amount)
    .bind(&c.currency)
    .bind(c.status)
    .bind(&c.creator_id)
    .bind(&c.branch_id)
    .bind(c.start_date)
    .bind(c.end_date)
    .bind(c.created_at)
    .bind(c.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_campaign(conn: &mut SqliteConnection, id: &str) -> Result<Option<Campaign>> {
    let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1");
    let campaign = sqlx::query_as::<_, Campaign>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(campaign)
}

pub async fn list_campaigns(
    conn: &mut SqliteConnection,
    status: Option<CampaignStatus>,
    branch_id: Option<&str>,
) -> Result<Vec<Campaign>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE 1 = 1"));
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(branch_id) = branch_id {
        qb.push(" AND branch_id = ").push_bind(branch_id.to_string());
    }
    qb.push(" ORDER BY created_at DESC, id ASC");

    let rows = qb.build_query_as::<Campaign>().fetch_all(conn).await?;
    Ok(rows)
}

/// Persist the editable fields of a campaign. `current_amount` is not written
/// here: only [`credit_campaign`] moves it.
pub async fn update_campaign_details(conn: &mut SqliteConnection, c: &Campaign) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET    title = ?2, description = ?3, target_amount = ?4, currency = ?5, status = ?6,
               start_date = ?7, end_date = ?8, updated_at = ?9
        WHERE  id = ?1
        "#,
    )
    .bind(&c.id)
    .bind(&c.title)
    .bind(&c.description)
    .bind(c.target_amount)
    .bind(&c.currency)
    .bind(c.status)
    .bind(c.start_date)
    .bind(c.end_date)
    .bind(c.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_campaign(conn: &mut SqliteConnection, id: &str) -> Result<u64> {
    let rows = sqlx::query("DELETE FROM campaigns WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(rows)
}

pub async fn count_campaign_donations(conn: &mut SqliteConnection, campaign_id: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM donations WHERE campaign_id = ?1")
        .bind(campaign_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Atomically add `amount` to a campaign's running total.
///
/// The increment happens inside the UPDATE statement, never as a
/// read-modify-write in application code. Callers run it in the same
/// transaction as the status write that makes the donation counted.
pub async fn credit_campaign(
    conn: &mut SqliteConnection,
    campaign_id: &str,
    amount: i64,
    now: i64,
) -> Result<()> {
    let rows = sqlx::query(
        "UPDATE campaigns SET current_amount = current_amount + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(campaign_id)
    .bind(amount)
    .bind(now)
    .execute(conn)
    .await?
    .rows_affected();

    if rows != 1 {
        return Err(LedgerError::Integrity(format!(
            "credit of {amount} targeted missing campaign {campaign_id}"
        )));
    }
    Ok(())
}

/// Sum of every donation on the campaign that is in a counted state.
pub async fn counted_total(conn: &mut SqliteConnection, campaign_id: &str) -> Result<i64> {
    let sql = format!(
        "SELECT COALESCE(SUM(amount), 0) FROM donations WHERE campaign_id = ?1 AND {COUNTED}"
    );
    let (total,): (i64,) = sqlx::query_as(&sql)
        .bind(campaign_id)
        .fetch_one(conn)
        .await?;
    Ok(total)
}

// ─────────────────────────────────────────────────────────
// Analytics aggregates
// ─────────────────────────────────────────────────────────

/// Sum and count of counted donations created in `[from, to)`.
pub async fn counted_totals_between(conn: &mut SqliteConnection, from: i64, to: i64) -> Result<Totals> {
    let sql = format!(
        "SELECT COALESCE(SUM(amount), 0) AS amount, COUNT(*) AS count \
         FROM donations WHERE created_at >= ?1 AND created_at < ?2 AND {COUNTED}"
    );
    let totals = sqlx::query_as::<_, Totals>(&sql)
        .bind(from)
        .bind(to)
        .fetch_one(conn)
        .await?;
    Ok(totals)
}

pub async fn count_counted_donors(conn: &mut SqliteConnection) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(DISTINCT donor_id) FROM donations WHERE donor_id IS NOT NULL AND {COUNTED}"
    );
    let (n,): (i64,) = sqlx::query_as(&sql).fetch_one(conn).await?;
    Ok(n)
}

pub async fn count_campaigns_with_status(
    conn: &mut SqliteConnection,
    status: CampaignStatus,
) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE status = ?1")
        .bind(status)
        .fetch_one(conn)
        .await?;
    Ok(n)
}

/// Per-UTC-day totals of counted donations created in `[from, to)`, oldest first.
pub async fn daily_totals(conn: &mut SqliteConnection, from: i64, to: i64) -> Result<Vec<DailyTrend>> {
    let sql = format!(
        "SELECT date(created_at, 'unixepoch') AS date, SUM(amount) AS amount, COUNT(*) AS count \
         FROM donations WHERE created_at >= ?1 AND created_at < ?2 AND {COUNTED} \
         GROUP BY date ORDER BY date ASC"
    );
    let rows = sqlx::query_as::<_, DailyTrend>(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Active campaigns with the highest totals.
pub async fn top_campaigns(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<TopCampaign>> {
    let sql = format!(
        "SELECT c.id, c.title, c.target_amount, c.current_amount, c.currency, \
                (SELECT COUNT(*) FROM donations WHERE campaign_id = c.id AND {COUNTED}) \
                    AS donation_count \
         FROM campaigns c WHERE c.status = 'ACTIVE' \
         ORDER BY c.current_amount DESC, c.created_at ASC LIMIT ?1"
    );
    let rows = sqlx::query_as::<_, TopCampaign>(&sql)
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Donors ranked by counted giving; anonymous gifts are left out.
pub async fn top_donors(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<TopDonor>> {
    let sql = format!(
        "SELECT u.id, u.name, u.email, SUM(d.amount) AS total_amount, COUNT(*) AS donation_count \
         FROM donations d JOIN users u ON u.id = d.donor_id \
         WHERE d.is_anonymous = 0 AND {COUNTED} \
         GROUP BY u.id, u.name, u.email \
         ORDER BY total_amount DESC, u.id ASC LIMIT ?1"
    );
    let rows = sqlx::query_as::<_, TopDonor>(&sql)
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Donation writes
// ─────────────────────────────────────────────────────────

pub async fn insert_donation(conn: &mut SqliteConnection, d: &Donation) -> Result<()> {
    let sql = format!(
        "INSERT INTO donations ({DONATION_COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
    );
    sqlx::query(&sql)
        .bind(&d.id)
        .bind(d.amount)
        .bind(&d.currency)
        .bind(&d.campaign_id)
        .bind(&d.donor_id)
        .bind(d.status)
        .bind(d.donation_type)
        .bind(&d.payment_reference)
        .bind(&d.receipt_code)
        .bind(d.approval_status)
        .bind(&d.received_by)
        .bind(&d.approved_by)
        .bind(d.approved_at)
        .bind(&d.flag_reason)
        .bind(&d.notes)
        .bind(d.is_anonymous)
        .bind(&d.subscription_id)
        .bind(d.created_at)
        .bind(d.updated_at)
        .execute(conn)
        .await?;
    Ok(())
}

/// Move an online donation out of `PENDING`. Returns the number of rows
/// changed: `0` means another request already resolved it.
pub async fn resolve_pending_online(
    conn: &mut SqliteConnection,
    donation_id: &str,
    to: DonationStatus,
    now: i64,
) -> Result<u64> {
    let rows = sqlx::query(
        r#"
        UPDATE donations
        SET    status = ?2, updated_at = ?3
        WHERE  id = ?1 AND donation_type = 'ONLINE' AND status = 'PENDING'
        "#,
    )
    .bind(donation_id)
    .bind(to)
    .bind(now)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(rows)
}

/// Record a reviewer decision on a cash donation, guarded on the approval
/// states the decision may leave from.
pub async fn review_cash(
    conn: &mut SqliteConnection,
    donation_id: &str,
    from: &[ApprovalStatus],
    to: ApprovalStatus,
    reviewer_id: &str,
    reason: Option<&str>,
    now: i64,
) -> Result<u64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE donations SET approval_status = ");
    qb.push_bind(to)
        .push(", approved_by = ")
        .push_bind(reviewer_id.to_string())
        .push(", approved_at = ")
        .push_bind(now)
        .push(", updated_at = ")
        .push_bind(now);
    if let Some(reason) = reason {
        qb.push(", flag_reason = ").push_bind(reason.to_string());
    }
    qb.push(" WHERE id = ")
        .push_bind(donation_id.to_string())
        .push(" AND donation_type = 'CASH' AND approval_status IN (");
    {
        let mut states = qb.separated(", ");
        for state in from {
            states.push_bind(*state);
        }
        states.push_unseparated(")");
    }

    let rows = qb.build().execute(conn).await?.rows_affected();
    Ok(rows)
}

/// Fail online donations still `PENDING` that were created before `cutoff`.
pub async fn expire_pending_online(conn: &mut SqliteConnection, cutoff: i64, now: i64) -> Result<u64> {
    let rows = sqlx::query(
        r#"
        UPDATE donations
        SET    status = 'FAILED', updated_at = ?2
        WHERE  donation_type = 'ONLINE' AND status = 'PENDING' AND created_at < ?1
        "#,
    )
    .bind(cutoff)
    .bind(now)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Donation reads
// ─────────────────────────────────────────────────────────

pub async fn get_donation(conn: &mut SqliteConnection, id: &str) -> Result<Option<Donation>> {
    let sql = format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1");
    let donation = sqlx::query_as::<_, Donation>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(donation)
}

pub async fn get_donation_by_reference(
    conn: &mut SqliteConnection,
    reference: &str,
) -> Result<Option<Donation>> {
    let sql = format!("SELECT {DONATION_COLUMNS} FROM donations WHERE payment_reference = ?1");
    let donation = sqlx::query_as::<_, Donation>(&sql)
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(donation)
}

#[derive(Debug, Default, Clone)]
pub struct DonationFilter {
    pub campaign_id: Option<String>,
    pub donor_id: Option<String>,
    pub status: Option<DonationStatus>,
    pub cash_only: bool,
    pub approval_status: Option<ApprovalStatus>,
}

/// Fetch donations matching `filter`, newest first.
pub async fn list_donations(conn: &mut SqliteConnection, filter: &DonationFilter) -> Result<Vec<Donation>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {DONATION_COLUMNS} FROM donations WHERE 1 = 1"));
    if let Some(campaign_id) = &filter.campaign_id {
        qb.push(" AND campaign_id = ").push_bind(campaign_id.clone());
    }
    if let Some(donor_id) = &filter.donor_id {
        qb.push(" AND donor_id = ").push_bind(donor_id.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if filter.cash_only {
        qb.push(" AND donation_type = 'CASH'");
    }
    if let Some(approval) = filter.approval_status {
        qb.push(" AND approval_status = ").push_bind(approval);
    }
    qb.push(" ORDER BY created_at DESC, id ASC");

    let rows = qb.build_query_as::<Donation>().fetch_all(conn).await?;
    Ok(rows)
}

/// True when a donation for the same campaign, donor e-mail and amount was
/// created at or after `since`.
pub async fn recent_matching_donation_exists(
    conn: &mut SqliteConnection,
    campaign_id: &str,
    donor_email: &str,
    amount: i64,
    since: i64,
) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT 1
        FROM   donations d
        JOIN   users u ON u.id = d.donor_id
        WHERE  d.campaign_id = ?1
          AND  u.email = ?2
          AND  d.amount = ?3
          AND  d.created_at >= ?4
        LIMIT  1
        "#,
    )
    .bind(campaign_id)
    .bind(donor_email)
    .bind(amount)
    .bind(since)
    .fetch_optional(conn)
    .await?;
    Ok(row.is_some())
}

// ─────────────────────────────────────────────────────────
// Subscriptions
// ─────────────────────────────────────────────────────────

pub async fn insert_subscription(conn: &mut SqliteConnection, s: &Subscription) -> Result<()> {
    let sql = format!(
        "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
    );
    sqlx::query(&sql)
        .bind(&s.id)
        .bind(&s.user_id)
        .bind(&s.campaign_id)
        .bind(s.amount)
        .bind(&s.currency)
        .bind(s.interval)
        .bind(s.status)
        .bind(s.next_payment_date)
        .bind(s.last_payment_date)
        .bind(&s.payment_method_token)
        .bind(&s.provider)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn get_subscription(conn: &mut SqliteConnection, id: &str) -> Result<Option<Subscription>> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1");
    let sub = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(sub)
}

pub async fn get_subscription_by_token(
    conn: &mut SqliteConnection,
    token: &str,
) -> Result<Option<Subscription>> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE payment_method_token = ?1");
    let sub = sqlx::query_as::<_, Subscription>(&sql)
        .bind(token)
        .fetch_optional(conn)
        .await?;
    Ok(sub)
}

pub async fn list_subscriptions_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<Subscription>> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?1 ORDER BY created_at DESC, id ASC"
    );
    let rows = sqlx::query_as::<_, Subscription>(&sql)
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Compare-and-set on subscription status. Returns rows changed.
pub async fn set_subscription_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: SubscriptionStatus,
    to: SubscriptionStatus,
    now: i64,
) -> Result<u64> {
    let rows = sqlx::query(
        "UPDATE subscriptions SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(now)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(rows)
}

/// Record a successful charge on an `ACTIVE` subscription.
pub async fn advance_subscription(
    conn: &mut SqliteConnection,
    id: &str,
    charged_at: i64,
    next_payment_date: i64,
    now: i64,
) -> Result<u64> {
    let rows = sqlx::query(
        r#"
        UPDATE subscriptions
        SET    last_payment_date = ?2, next_payment_date = ?3, updated_at = ?4
        WHERE  id = ?1 AND status = 'ACTIVE'
        "#,
    )
    .bind(id)
    .bind(charged_at)
    .bind(next_payment_date)
    .bind(now)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(rows)
}

#[cfg(test)]
pub mod fixtures {
    //! Row builders shared by the module tests.

    use super::*;
    use crate::models::{CampaignStatus, DonationType};

    pub async fn campaign(pool: &SqlitePool, target: i64, status: CampaignStatus) -> Campaign {
        let c = Campaign {
            id: uuid::Uuid::new_v4().to_string(),
            title: "Roof Repairs".into(),
            description: "New roof for the main hall".into(),
            target_amount: target,
            current_amount: 0,
            currency: "NGN".into(),
            status,
            creator_id: "staff-1".into(),
            branch_id: None,
            start_date: None,
            end_date: None,
            created_at: 0,
            updated_at: 0,
        };
        let mut conn = pool.acquire().await.unwrap();
        insert_campaign(&mut conn, &c).await.unwrap();
        c
    }

    pub async fn donation_for(
        pool: &SqlitePool,
        campaign_id: &str,
        donor_email: &str,
        amount: i64,
        created_at: i64,
    ) -> Donation {
        let mut conn = pool.acquire().await.unwrap();
        let donor = find_or_create_donor(&mut conn, donor_email, None, created_at)
            .await
            .unwrap();
        let d = Donation {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            currency: "NGN".into(),
            campaign_id: Some(campaign_id.to_string()),
            donor_id: Some(donor.id),
            status: DonationStatus::Success,
            donation_type: DonationType::Cash,
            payment_reference: None,
            receipt_code: None,
            approval_status: Some(ApprovalStatus::Pending),
            received_by: Some("staff-1".into()),
            approved_by: None,
            approved_at: None,
            flag_reason: None,
            notes: None,
            is_anonymous: false,
            subscription_id: None,
            created_at,
            updated_at: created_at,
        };
        insert_donation(&mut conn, &d).await.unwrap();
        d
    }
}

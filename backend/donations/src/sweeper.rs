//! Background task that fails online donations abandoned at checkout.
//!
//! A donation still `PENDING` past the expiry window is moved to `FAILED` with
//! the same conditional update verification uses, so a late verify or webhook
//! for it reports `AlreadyProcessed` and never credits.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::ledger::Ledger;

/// Run until `shutdown` fires, sweeping every `interval`.
pub async fn run(ledger: Ledger, interval: Duration, shutdown: CancellationToken) {
    if ledger.settings.pending_expiry.is_none() {
        info!("Pending expiry disabled; sweeper not started");
        return;
    }
    info!("Sweeper starting, interval {}s", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match ledger.expire_stale_pending(Utc::now()).await {
            Ok(0) => {}
            Ok(n) => info!("Expired {n} abandoned online donations"),
            Err(e) => error!("Sweep failed: {e}"),
        }
    }
    info!("Sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};
    use crate::gateway::{DisabledGateway, GatewayOutcome};
    use crate::ledger::tests::ledger_with;
    use crate::ledger::OnlineDonationRequest;
    use crate::models::{CampaignStatus, DonationStatus};
    use std::sync::Arc;

    #[tokio::test]
    async fn sweeps_on_first_tick_and_stops_on_cancel() {
        let pool = test_pool().await;
        let c = fixtures::campaign(&pool, 10_000, CampaignStatus::Active).await;
        let (ledger, _rx) = ledger_with(pool.clone(), Arc::new(DisabledGateway));

        let long_ago = Utc::now() - chrono::Duration::days(10);
        let started = ledger
            .initiate_online(
                OnlineDonationRequest {
                    amount: 100,
                    campaign_id: c.id.clone(),
                    donor_email: "late@example.org".into(),
                    donor_name: None,
                    is_anonymous: false,
                    is_recurring: false,
                    recurring_interval: None,
                },
                long_ago,
            )
            .await
            .unwrap();

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(ledger.clone(), Duration::from_secs(3600), token.clone()));

        // The first tick fires immediately.
        let mut expired = false;
        for _ in 0..50 {
            let d = ledger.get_donation(&started.donation.id).await.unwrap();
            if d.status == DonationStatus::Failed {
                expired = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(expired);

        token.cancel();
        handle.await.unwrap();

        let err = ledger
            .verify_online(&started.payment_reference, GatewayOutcome::Success, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::errors::LedgerError::AlreadyProcessed));
    }

    #[tokio::test]
    async fn disabled_expiry_returns_immediately() {
        let pool = test_pool().await;
        let (mut ledger, _rx) = ledger_with(pool, Arc::new(DisabledGateway));
        ledger.settings.pending_expiry = None;

        // Never cancelled; would hang if the loop started.
        run(ledger, Duration::from_millis(10), CancellationToken::new()).await;
    }
}

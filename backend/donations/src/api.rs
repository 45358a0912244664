//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analytics::Dashboard;
use crate::auth::Caller;
use crate::db::DonationFilter;
use crate::errors::Result;
use crate::gateway::GatewayOutcome;
use crate::ledger::{
    CampaignChanges, CampaignDetail, CashApproval, CashDonationRequest, CashOutcome,
    InitiatedDonation, Ledger, NewCampaign, OnlineDonationRequest,
};
use crate::models::{ApprovalStatus, Campaign, CampaignStatus, Donation, DonationStatus, Subscription};
use crate::reconcile::Reconciliation;
use crate::subscriptions::{NewSubscription, SubscriptionAction};
use crate::webhook;

#[derive(Clone)]
pub struct ApiState {
    pub ledger: Ledger,
    /// HMAC key for webhook deliveries; `None` rejects every delivery.
    pub webhook_secret: Option<String>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/campaigns/:id",
            get(get_campaign).put(update_campaign).delete(delete_campaign),
        )
        .route("/campaigns/:id/reconcile", get(reconcile_campaign))
        .route("/donations", get(list_donations).post(initiate_donation))
        .route("/donations/verify", post(verify_donation))
        .route("/donations/cash", get(list_cash_donations).post(record_cash_donation))
        .route("/donations/:id", get(get_donation))
        .route("/donations/:id/approve", put(approve_cash_donation))
        .route("/donations/:id/flag", put(flag_cash_donation))
        .route("/donations/:id/reject", put(reject_cash_donation))
        .route("/subscriptions", get(list_subscriptions).post(create_subscription))
        .route("/subscriptions/:id", patch(update_subscription))
        .route("/analytics/dashboard", get(analytics_dashboard))
        .route("/webhooks/paystack", post(paystack_webhook))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignQuery {
    pub status: Option<CampaignStatus>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DonationQuery {
    pub campaign_id: Option<String>,
    pub donor_id: Option<String>,
    pub status: Option<DonationStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CashQuery {
    pub approval_status: Option<ApprovalStatus>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub reference: String,
    /// Honoured only when no gateway is configured.
    pub status: Option<GatewayOutcome>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub action: String,
}

#[derive(Serialize)]
pub struct CashRecordedResponse {
    pub donation: Donation,
    pub receipt_code: String,
    pub duplicate_warning: bool,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /campaigns`
pub async fn list_campaigns(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<CampaignQuery>,
) -> Result<Json<ListResponse<Campaign>>> {
    let campaigns = state
        .ledger
        .list_campaigns(q.status, q.branch_id.as_deref())
        .await?;
    Ok(Json(campaigns.into()))
}

/// `POST /campaigns`
pub async fn create_campaign(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Json(req): Json<NewCampaign>,
) -> Result<(StatusCode, Json<Campaign>)> {
    caller.require_staff()?;
    let campaign = state
        .ledger
        .create_campaign(req, &caller.user_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// `GET /campaigns/:id`
pub async fn get_campaign(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<CampaignDetail>> {
    Ok(Json(state.ledger.get_campaign(&id).await?))
}

/// `PUT /campaigns/:id`
pub async fn update_campaign(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(changes): Json<CampaignChanges>,
) -> Result<Json<Campaign>> {
    let campaign = state
        .ledger
        .update_campaign(&id, changes, &caller, Utc::now())
        .await?;
    Ok(Json(campaign))
}

/// `DELETE /campaigns/:id`
pub async fn delete_campaign(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    caller.require_staff()?;
    state.ledger.delete_campaign(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /campaigns/:id/reconcile`
pub async fn reconcile_campaign(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Reconciliation>> {
    caller.require_staff()?;
    Ok(Json(state.ledger.reconcile_campaign(&id).await?))
}

/// `GET /donations`
pub async fn list_donations(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<DonationQuery>,
) -> Result<Json<ListResponse<Donation>>> {
    let filter = DonationFilter {
        campaign_id: q.campaign_id,
        donor_id: q.donor_id,
        status: q.status,
        ..Default::default()
    };
    Ok(Json(state.ledger.list_donations(&filter).await?.into()))
}

/// `POST /donations`
pub async fn initiate_donation(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<OnlineDonationRequest>,
) -> Result<(StatusCode, Json<InitiatedDonation>)> {
    let started = state.ledger.initiate_online(req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// `POST /donations/verify`
///
/// With a live gateway the outcome is whatever the gateway reports for the
/// reference; otherwise the caller-asserted status is used, defaulting to
/// success. Unknown or already-resolved references are refused before the
/// gateway is called.
pub async fn verify_donation(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Donation>> {
    let gateway = state.ledger.gateway();
    let outcome = if gateway.is_live() {
        state.ledger.open_online(&req.reference).await?;
        gateway.verify(req.reference.trim()).await?
    } else {
        req.status.unwrap_or(GatewayOutcome::Success)
    };
    let donation = state
        .ledger
        .verify_online(&req.reference, outcome, Utc::now())
        .await?;
    Ok(Json(donation))
}

/// `GET /donations/cash`
pub async fn list_cash_donations(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Query(q): Query<CashQuery>,
) -> Result<Json<ListResponse<Donation>>> {
    caller.require_staff()?;
    let filter = DonationFilter {
        cash_only: true,
        approval_status: q.approval_status,
        ..Default::default()
    };
    Ok(Json(state.ledger.list_donations(&filter).await?.into()))
}

/// `POST /donations/cash`
pub async fn record_cash_donation(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Json(req): Json<CashDonationRequest>,
) -> Result<Response> {
    caller.require_staff()?;
    let outcome = state
        .ledger
        .record_cash(req, &caller.user_id, Utc::now())
        .await?;

    Ok(match outcome {
        CashOutcome::NeedsConfirmation => (
            StatusCode::CONFLICT,
            Json(json!({
                "warning": "A donation with the same amount, donor and campaign was recorded recently",
                "requires_confirmation": true,
            })),
        )
            .into_response(),
        CashOutcome::Recorded {
            donation,
            receipt_code,
            duplicate_warning,
        } => (
            StatusCode::CREATED,
            Json(CashRecordedResponse {
                donation,
                receipt_code,
                duplicate_warning,
            }),
        )
            .into_response(),
    })
}

/// `GET /donations/:id`
pub async fn get_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Donation>> {
    Ok(Json(state.ledger.get_donation(&id).await?))
}

/// `PUT /donations/:id/approve`
pub async fn approve_cash_donation(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CashApproval>> {
    caller.require_super_admin()?;
    let approval = state
        .ledger
        .approve_cash(&id, &caller.user_id, Utc::now())
        .await?;
    Ok(Json(approval))
}

/// `PUT /donations/:id/flag`
pub async fn flag_cash_donation(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Donation>> {
    caller.require_staff()?;
    let reason = req.reason.unwrap_or_default();
    let donation = state
        .ledger
        .flag_cash(&id, &caller.user_id, &reason, Utc::now())
        .await?;
    Ok(Json(donation))
}

/// `PUT /donations/:id/reject`
pub async fn reject_cash_donation(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(id): Path<String>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<Donation>> {
    caller.require_super_admin()?;
    let reason = body.and_then(|Json(r)| r.reason);
    let donation = state
        .ledger
        .reject_cash(&id, &caller.user_id, reason.as_deref(), Utc::now())
        .await?;
    Ok(Json(donation))
}

/// `GET /subscriptions`
pub async fn list_subscriptions(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
) -> Result<Json<ListResponse<Subscription>>> {
    Ok(Json(state.ledger.list_subscriptions(&caller.user_id).await?.into()))
}

/// `POST /subscriptions`
pub async fn create_subscription(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Json(req): Json<NewSubscription>,
) -> Result<(StatusCode, Json<Subscription>)> {
    let sub = state
        .ledger
        .create_subscription(&caller, req, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

/// `PATCH /subscriptions/:id`
pub async fn update_subscription(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> Result<Json<Subscription>> {
    let action: SubscriptionAction = req.action.parse()?;
    let sub = state
        .ledger
        .update_subscription(&id, &caller, action, Utc::now())
        .await?;
    Ok(Json(sub))
}

/// `GET /analytics/dashboard?days=`
pub async fn analytics_dashboard(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Dashboard>> {
    caller.require_staff()?;
    Ok(Json(state.ledger.dashboard(q.days, Utc::now()).await?))
}

/// `POST /webhooks/paystack`
pub async fn paystack_webhook(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get(webhook::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    webhook::receive(
        &state.ledger,
        state.webhook_secret.as_deref(),
        signature,
        &body,
        Utc::now(),
    )
    .await?;
    Ok(Json(json!({ "received": true })))
}

//! Application-wide error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Campaign not found")]
    CampaignNotFound,

    #[error("Campaign is not active")]
    CampaignNotActive,

    #[error("Campaign has donations; archive it instead")]
    CampaignHasDonations,

    #[error("Donation not found")]
    DonationNotFound,

    #[error("Only cash donations require approval")]
    NotCashDonation,

    #[error("Donation has already been processed")]
    AlreadyProcessed,

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("Cannot {action} a subscription that is {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Payment gateway error: {0}")]
    Upstream(String),

    #[error("Ledger integrity violation: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Coarse classification callers use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    Upstream,
    Integrity,
    Internal,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_)
            | Self::InvalidInput(_)
            | Self::CampaignNotActive
            | Self::NotCashDonation => ErrorKind::Validation,
            Self::CampaignNotFound | Self::DonationNotFound | Self::SubscriptionNotFound => {
                ErrorKind::NotFound
            }
            Self::AlreadyProcessed | Self::InvalidTransition { .. } | Self::CampaignHasDonations => {
                ErrorKind::Conflict
            }
            Self::Unauthenticated | Self::Forbidden(_) | Self::InvalidSignature => {
                ErrorKind::Authorization
            }
            Self::Upstream(_) | Self::Http(_) => ErrorKind::Upstream,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Database(_) | Self::Migrate(_) | Self::Json(_) | Self::Config(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => match self.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
                ErrorKind::Integrity | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// True when the store rejected a write because of a `UNIQUE` constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Internal | ErrorKind::Integrity => {
                error!("Request failed: {self}");
                "Internal server error".to_string()
            }
            ErrorKind::Upstream => {
                error!("Upstream failure: {self}");
                "Payment gateway unavailable".to_string()
            }
            _ => self.to_string(),
        };

        (
            self.status_code(),
            Json(ErrorResponse {
                error: message,
                kind,
            }),
        )
            .into_response()
    }
}

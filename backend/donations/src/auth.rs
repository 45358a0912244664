//! Caller identity and capability checks.
//!
//! Sessions are issued by the upstream authentication layer, which forwards
//! the signed-in user as `x-user-id` / `x-user-role`. Handlers check
//! capabilities here and pass an already-authorized identity into the ledger.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::{LedgerError, Result};
use crate::models::Role;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    /// `ADMIN` or `SUPER_ADMIN`: may record, flag, and list cash donations.
    pub fn require_staff(&self) -> Result<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(LedgerError::Forbidden("administrators only".into()))
        }
    }

    /// `SUPER_ADMIN`: may approve or reject cash donations.
    pub fn require_super_admin(&self) -> Result<()> {
        if self.role == Role::SuperAdmin {
            Ok(())
        } else {
            Err(LedgerError::Forbidden("super administrators only".into()))
        }
    }

    pub fn require_owner(&self, owner_id: &str) -> Result<()> {
        if self.user_id == owner_id {
            Ok(())
        } else {
            Err(LedgerError::Forbidden("not the owner".into()))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn caller_from_parts(parts: &Parts) -> Result<Caller> {
    let user_id = header(parts, USER_ID_HEADER).ok_or(LedgerError::Unauthenticated)?;
    let role = match header(parts, USER_ROLE_HEADER) {
        None => Role::Donor,
        Some(raw) => Role::from_header(raw)
            .ok_or_else(|| LedgerError::InvalidInput(format!("unknown role {raw}")))?,
    };
    Ok(Caller {
        user_id: user_id.to_string(),
        role,
    })
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = LedgerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        caller_from_parts(parts)
    }
}

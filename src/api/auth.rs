//! Bearer-token extractor and role guards

use super::error::ApiError;
use super::SharedState;
use crate::auth::Claims;
use crate::error::{Error, Result};
use crate::identity;
use crate::model::{Account, FacultyProfile, Profile, Role, StaffProfile, StudentProfile};
use crate::storage::Database;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The authenticated caller. Extracting it validates the bearer token and
/// reloads the account, so a deleted account is rejected even with a live
/// token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account: Account,
    pub claims: Claims,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::unauthorized("Authentication credentials were not provided"))?;

        let claims = state.keys.validate(token)?;
        let account_id = claims.account_id()?;

        let db = state.db.lock().await;
        let account = db
            .get_account(account_id)?
            .ok_or_else(|| Error::unauthorized("Account no longer exists"))?;

        Ok(AuthUser { account, claims })
    }
}

impl AuthUser {
    pub fn role(&self) -> Role {
        self.account.role
    }

    /// Reject callers whose role is not `role`
    pub fn require(&self, role: Role) -> Result<()> {
        if self.account.role == role {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "This endpoint is only available to {} accounts",
                role
            )))
        }
    }

    pub fn student(&self, db: &Database) -> Result<StudentProfile> {
        self.require(Role::Student)?;
        match identity::resolve(db, &self.account)?.profile {
            Profile::Student(s) => Ok(s),
            _ => Err(Error::not_found("Student profile not found")),
        }
    }

    pub fn faculty(&self, db: &Database) -> Result<FacultyProfile> {
        self.require(Role::Faculty)?;
        match identity::resolve(db, &self.account)?.profile {
            Profile::Faculty(f) => Ok(f),
            _ => Err(Error::not_found("Faculty profile not found")),
        }
    }

    /// Management or placement-cell employee record
    pub fn staff(&self, db: &Database, role: Role) -> Result<StaffProfile> {
        self.require(role)?;
        match identity::resolve(db, &self.account)?.profile {
            Profile::Staff(s) => Ok(s),
            _ => Err(Error::not_found("Employee not found")),
        }
    }
}

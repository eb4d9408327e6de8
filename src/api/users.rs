use super::error::{bad_json, ApiResult};
use super::{AuthUser, SharedState};
use crate::auth::{self, LoginRequest, LoginResponse};
use crate::error::Error;
use crate::identity::{self, ResolvedBy};
use crate::model::{Account, Profile};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

pub async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(req) = payload.map_err(bad_json)?;
    let pending = {
        let db = state.db.lock().await;
        auth::begin_login(&db, &req)?
    };

    // password hashing is slow; keep it off the runtime and outside the lock
    let response = tokio::task::spawn_blocking(move || pending.finish(&state.keys))
        .await
        .map_err(|e| Error::Other(e.into()))??;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct Me {
    pub user: Account,
    pub profile: Option<Profile>,
    pub resolved_by: Option<ResolvedBy>,
}

/// The caller's account with its profile. A missing profile is reported as
/// null rather than an error so admins and half-mapped accounts still see
/// themselves.
pub async fn me(State(state): State<SharedState>, user: AuthUser) -> ApiResult<Me> {
    let db = state.db.lock().await;
    let (profile, resolved_by) = if user.account.role.has_profile() {
        match identity::resolve(&db, &user.account) {
            Ok(resolved) => (Some(resolved.profile), Some(resolved.by)),
            Err(Error::NotFound(_)) => (None, None),
            Err(e) => return Err(e.into()),
        }
    } else {
        (None, None)
    };

    Ok(Json(Me {
        user: user.account,
        profile,
        resolved_by,
    }))
}

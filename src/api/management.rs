use super::error::ApiResult;
use super::{AuthUser, SharedState};
use crate::error::{Error, Result};
use crate::model::{FacultyProfile, Notification, Role, StaffProfile, StudentProfile};
use crate::notify;
use crate::storage::{ClassFilter, FeeSummary, StudentFee};
use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// Default size of the recent-notifications feed
const RECENT_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
pub struct Count {
    pub total: usize,
}

/// Query filters here are strict: a value that is not an integer is a 400
fn int_filter(params: &HashMap<String, String>, key: &str) -> Result<Option<i64>> {
    match params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            warn!("invalid {} filter: {}", key, raw);
            Error::validation(format!("Invalid {} filter: {}", key, raw))
        }),
    }
}

pub async fn profile(State(state): State<SharedState>, user: AuthUser) -> ApiResult<StaffProfile> {
    let db = state.db.lock().await;
    Ok(Json(user.staff(&db, Role::Management)?))
}

pub async fn student_count(State(state): State<SharedState>, user: AuthUser) -> ApiResult<Count> {
    user.require(Role::Management)?;
    let db = state.db.lock().await;
    Ok(Json(Count {
        total: db.count_students()?,
    }))
}

pub async fn faculty_count(State(state): State<SharedState>, user: AuthUser) -> ApiResult<Count> {
    user.require(Role::Management)?;
    let db = state.db.lock().await;
    Ok(Json(Count {
        total: db.count_faculty()?,
    }))
}

pub async fn fee_summary(State(state): State<SharedState>, user: AuthUser) -> ApiResult<FeeSummary> {
    user.require(Role::Management)?;
    let db = state.db.lock().await;
    Ok(Json(db.fee_summary()?))
}

pub async fn student_fees(
    State(state): State<SharedState>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<StudentFee>> {
    user.require(Role::Management)?;
    let year = int_filter(&params, "year")?;
    let branch = int_filter(&params, "branch")?;

    let db = state.db.lock().await;
    Ok(Json(db.list_student_fees(year, branch)?))
}

pub async fn students(
    State(state): State<SharedState>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<StudentProfile>> {
    user.require(Role::Management)?;
    let filter = ClassFilter {
        year_id: int_filter(&params, "year")?,
        branch_id: int_filter(&params, "branch")?,
        section_id: int_filter(&params, "section")?,
    };

    let db = state.db.lock().await;
    let students = db.list_students(filter, Some(state.listing_limit))?;
    info!("retrieved {} students with {:?}", students.len(), filter);
    Ok(Json(students))
}

pub async fn faculty(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<FacultyProfile>> {
    user.require(Role::Management)?;
    let db = state.db.lock().await;
    Ok(Json(db.list_faculty(Some(state.listing_limit))?))
}

pub async fn recent_notifications(
    State(state): State<SharedState>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Notification>> {
    user.require(Role::Management)?;
    let limit = match int_filter(&params, "limit")? {
        Some(n) if n < 0 => return Err(Error::validation("limit must not be negative").into()),
        Some(n) => n as usize,
        None => RECENT_LIMIT,
    };

    let db = state.db.lock().await;
    Ok(Json(notify::recent(&db, limit)?))
}

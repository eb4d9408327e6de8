use super::error::ApiResult;
use super::{AuthUser, SharedState};
use crate::error::Error;
use crate::model::{AcademicRecord, AttendanceRecord, Backlog, ExamMark, FeeRecord, StudentProfile};
use axum::extract::State;
use axum::Json;
use serde::Serialize;

pub async fn profile(State(state): State<SharedState>, user: AuthUser) -> ApiResult<StudentProfile> {
    let db = state.db.lock().await;
    Ok(Json(user.student(&db)?))
}

pub async fn academics(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<AcademicRecord>> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    Ok(Json(db.list_academics(student.student_id)?))
}

pub async fn backlogs(State(state): State<SharedState>, user: AuthUser) -> ApiResult<Vec<Backlog>> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    Ok(Json(db.list_backlogs(student.student_id)?))
}

#[derive(Debug, Serialize)]
pub struct ExamRow {
    #[serde(flatten)]
    pub mark: ExamMark,
    pub total_marks: i64,
}

pub async fn exam_data(State(state): State<SharedState>, user: AuthUser) -> ApiResult<Vec<ExamRow>> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    let rows = db
        .list_exam_marks(student.student_id)?
        .into_iter()
        .map(|mark| ExamRow {
            total_marks: mark.total(),
            mark,
        })
        .collect();
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
pub struct FeeView {
    #[serde(flatten)]
    pub fee: FeeRecord,
    pub remaining: i64,
    pub status: &'static str,
}

pub async fn fees(State(state): State<SharedState>, user: AuthUser) -> ApiResult<FeeView> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    let fee = db
        .get_fee(student.student_id)?
        .ok_or_else(|| Error::not_found("Fee record not found"))?;
    Ok(Json(FeeView {
        remaining: fee.remaining(),
        status: fee.status(),
        fee,
    }))
}

#[derive(Debug, Serialize)]
pub struct AttendanceRow {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub classes_held: usize,
    pub classes_attended: usize,
    pub percentage: f64,
}

pub async fn attendance(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<AttendanceRow>> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    let rows = db
        .list_attendance(student.student_id)?
        .into_iter()
        .map(|record| AttendanceRow {
            classes_held: record.classes_held(),
            classes_attended: record.classes_attended(),
            percentage: record.percentage(),
            record,
        })
        .collect();
    Ok(Json(rows))
}

use super::error::ApiResult;
use super::{AuthUser, SharedState};
use crate::model::{cgpa_estimate, ClassSection, FacultyCourse, FacultyProfile};
use crate::storage::ClassFilter;
use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

pub async fn profile(State(state): State<SharedState>, user: AuthUser) -> ApiResult<FacultyProfile> {
    let db = state.db.lock().await;
    Ok(Json(user.faculty(&db)?))
}

pub async fn assignments(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<FacultyCourse>> {
    let db = state.db.lock().await;
    let faculty = user.faculty(&db)?;
    Ok(Json(db.list_faculty_courses(faculty.faculty_id)?))
}

/// A taught student with their progress indicators
#[derive(Debug, Serialize)]
pub struct TaughtStudent {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub roll_no: i64,
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    pub phone_no: String,
    pub cgpa: f64,
    pub backlogs: usize,
}

/// Students in the classes this faculty member teaches. Filters that do
/// not parse as integers are ignored here.
pub async fn students(
    State(state): State<SharedState>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<TaughtStudent>> {
    let filter = ClassFilter {
        year_id: lenient(&params, "year"),
        branch_id: lenient(&params, "branch"),
        section_id: lenient(&params, "section"),
    };

    let db = state.db.lock().await;
    let faculty = user.faculty(&db)?;

    let mut classes: Vec<ClassSection> = db
        .list_faculty_courses(faculty.faculty_id)?
        .iter()
        .map(FacultyCourse::class)
        .collect();
    classes.sort_by_key(|c| (c.year_id, c.branch_id, c.section_id));
    classes.dedup();

    let students: Vec<_> = db
        .list_students_in_classes(&classes)?
        .into_iter()
        .filter(|s| filter.matches(s))
        .collect();

    let ids: Vec<i64> = students.iter().map(|s| s.student_id).collect();
    let backlogs = db.backlog_counts(&ids)?;
    let marks = db.exam_marks_by_student()?;

    let rows: Vec<TaughtStudent> = students
        .into_iter()
        .map(|s| TaughtStudent {
            id: s.student_id,
            name: s.full_name(),
            cgpa: marks.get(&s.student_id).map_or(0.0, |m| cgpa_estimate(m)),
            backlogs: backlogs.get(&s.student_id).copied().unwrap_or(0),
            email: s.email,
            roll_no: s.roll_no,
            year_id: s.year_id,
            branch_id: s.branch_id,
            section_id: s.section_id,
            phone_no: s.phone_no,
        })
        .collect();

    info!(
        "retrieved {} students for faculty {}",
        rows.len(),
        faculty.faculty_id
    );
    Ok(Json(rows))
}

fn lenient(params: &HashMap<String, String>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.trim().parse().ok())
}

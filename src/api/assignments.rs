//! Assignment submission and grading routes
//!
//! Student routes always act on the caller's own records and faculty routes
//! on records the caller owns; anything else is reported as not found.

use super::error::{bad_json, bad_query, ApiError, ApiResult};
use super::{AuthUser, SharedState};
use crate::coursework::{self, AssignmentCard, AssignmentView, DownloadInfo};
use crate::storage::{GradingOverview, GradingQueue};
use crate::error::Error;
use crate::model::Role;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::path::Component;

/// Stored name when the client does not send one
const DEFAULT_UPLOAD_NAME: &str = "assignment.pdf";

// ==================== Student ====================

pub async fn student_list(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<AssignmentView>> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    Ok(Json(coursework::student_assignments(&db, &student)?))
}

pub async fn student_cards(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<AssignmentCard>> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    Ok(Json(coursework::student_cards(&db, &student)?))
}

pub async fn student_detail(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<AssignmentView> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    Ok(Json(coursework::student_assignment(&db, &student, id)?))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: Option<String>,
}

/// The request body is the raw PDF
pub async fn upload(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<AssignmentView> {
    let Query(query) = query.map_err(bad_query)?;
    let file_name = query
        .file_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME);

    let db = state.db.lock().await;
    let student = user.student(&db)?;
    let view = coursework::upload(&db, &state.store, &student, id, file_name, &body)?;
    Ok(Json(view))
}

pub async fn student_download(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<DownloadInfo> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    Ok(Json(coursework::student_download(&db, &state.store, &student, id)?))
}

/// 201 when the record is new, 200 when it already existed
pub async fn create(
    State(state): State<SharedState>,
    user: AuthUser,
    Path((faculty_id, course_id)): Path<(i64, String)>,
) -> Result<(StatusCode, Json<AssignmentCard>), ApiError> {
    let db = state.db.lock().await;
    let student = user.student(&db)?;
    let (card, created) = coursework::create_if_missing(&db, &student, faculty_id, &course_id)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(card)))
}

// ==================== Faculty ====================

pub async fn overview(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<GradingOverview> {
    let db = state.db.lock().await;
    let faculty = user.faculty(&db)?;
    Ok(Json(coursework::faculty_overview(&db, &faculty)?))
}

pub async fn pending(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<AssignmentView>> {
    let db = state.db.lock().await;
    let faculty = user.faculty(&db)?;
    Ok(Json(coursework::faculty_queue(&db, &faculty, GradingQueue::Pending)?))
}

pub async fn graded(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<AssignmentView>> {
    let db = state.db.lock().await;
    let faculty = user.faculty(&db)?;
    Ok(Json(coursework::faculty_queue(&db, &faculty, GradingQueue::Graded)?))
}

pub async fn faculty_detail(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<AssignmentView> {
    let db = state.db.lock().await;
    let faculty = user.faculty(&db)?;
    Ok(Json(coursework::faculty_assignment(&db, &faculty, id)?))
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub marks_awarded: Option<i64>,
}

pub async fn grade(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
    payload: Result<Json<GradeRequest>, JsonRejection>,
) -> ApiResult<AssignmentView> {
    let Json(req) = payload.map_err(bad_json)?;
    let db = state.db.lock().await;
    let faculty = user.faculty(&db)?;
    Ok(Json(coursework::grade(&db, &faculty, id, req.marks_awarded)?))
}

pub async fn faculty_download(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<DownloadInfo> {
    let db = state.db.lock().await;
    let faculty = user.faculty(&db)?;
    Ok(Json(coursework::faculty_download(&db, &state.store, &faculty, id)?))
}

// ==================== Files ====================

/// Serve a stored upload to the assignment's student, its faculty member,
/// or management and admin accounts. Anyone else gets not found.
pub async fn media(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(relative): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let not_found = || Error::not_found("File not found");
    if !std::path::Path::new(&relative)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(not_found().into());
    }

    {
        let db = state.db.lock().await;
        let assignment = db.find_assignment_by_file(&relative)?.ok_or_else(not_found)?;
        let allowed = match user.role() {
            Role::Student => user.student(&db)?.student_id == assignment.student_id,
            Role::Faculty => user.faculty(&db)?.faculty_id == assignment.faculty_id,
            Role::Management | Role::Admin => true,
            Role::Placement => false,
        };
        if !allowed {
            return Err(not_found().into());
        }
    }

    let bytes = tokio::fs::read(state.store.root().join(&relative))
        .await
        .map_err(|_| not_found())?;
    Ok(([(CONTENT_TYPE, "application/pdf")], bytes))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::model::Role;
    use crate::storage::fixtures::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    fn seeded() -> Harness {
        Harness::new(|db| {
            db.insert_student(&student(1, 2, 1, 1)).unwrap();
            db.insert_student(&student(2, 2, 1, 1)).unwrap();
            db.insert_faculty(&faculty(10)).unwrap();
            db.insert_faculty(&faculty(11)).unwrap();
            db.insert_faculty_course(&course(10, (2, 1, 1), "CS201")).unwrap();
            account(db, "student1@college.edu", Role::Student, Some(1));
            account(db, "student2@college.edu", Role::Student, Some(2));
            account(db, "faculty10@college.edu", Role::Faculty, Some(10));
            account(db, "faculty11@college.edu", Role::Faculty, Some(11));
        })
    }

    async fn upload(h: &Harness, token: &str, id: i64, bytes: &'static [u8]) -> (StatusCode, serde_json::Value) {
        h.send(
            Request::put(format!(
                "/api/assignments/student/assignments/{}/upload/?file_name=report.pdf",
                id
            ))
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/pdf")
            .body(Body::from(bytes))
            .unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn test_submit_and_grade_lifecycle() {
        let h = seeded();
        let student = h.token("student1@college.edu").await;
        let faculty = h.token("faculty10@college.edu").await;

        let (status, card) = h
            .json(
                "POST",
                "/api/assignments/student/assignments/create/10/CS201/",
                &student,
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(card["status"], "not_submitted");
        let id = card["assignment_id"].as_i64().unwrap();

        let (status, _) = h
            .json(
                "POST",
                "/api/assignments/student/assignments/create/10/CS201/",
                &student,
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, view) = upload(&h, &student, id, b"%PDF-1.7 body").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["status"], "submitted");
        assert_eq!(view["file_name"], "report.pdf");

        let (_, pending) = h.get("/api/assignments/faculty/assignments/pending/", &faculty).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let uri = format!("/api/assignments/faculty/assignments/{}/grade/", id);
        let (status, body) = h.json("PATCH", &uri, &faculty, json!({"marks_awarded": 11})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Marks must be between 0 and 10");

        let (status, graded) = h.json("PATCH", &uri, &faculty, json!({"marks_awarded": 8})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(graded["status"], "graded");
        assert_eq!(graded["marks_awarded"], 8);

        let (_, overview) = h
            .get("/api/assignments/faculty/assignments/overview/", &faculty)
            .await;
        assert_eq!(overview["graded"], 1);
        assert_eq!(overview["pending_grading"], 0);

        let (_, feed) = h.get("/api/notifications/", &student).await;
        assert_eq!(feed[0]["title"], "Assignment Graded - CS201");

        let (_, download) = h
            .get(
                &format!("/api/assignments/faculty/assignments/{}/download/", id),
                &faculty,
            )
            .await;
        assert_eq!(download["student_roll_no"], 1);

        let url = download["download_url"].as_str().unwrap();
        let response = h.raw_get(url, &faculty).await;
        assert_eq!(response.0, StatusCode::OK);
        assert_eq!(response.1, b"%PDF-1.7 body".to_vec());

        let (status, _) = h.get("/media/../academia.toml", &faculty).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_records_are_private_to_their_owners() {
        let h = seeded();
        let student = h.token("student1@college.edu").await;
        let (_, card) = h
            .json(
                "POST",
                "/api/assignments/student/assignments/create/10/CS201/",
                &student,
                json!({}),
            )
            .await;
        let id = card["assignment_id"].as_i64().unwrap();

        let other_student = h.token("student2@college.edu").await;
        let (status, _) = upload(&h, &other_student, id, b"%PDF").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let other_faculty = h.token("faculty11@college.edu").await;
        let (status, _) = h
            .get(&format!("/api/assignments/faculty/assignments/{}/", id), &other_faculty)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // faculty routes reject students outright
        let (status, _) = h
            .get("/api/assignments/faculty/assignments/pending/", &student)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cards_list_taught_courses() {
        let h = seeded();
        let student = h.token("student1@college.edu").await;
        let (status, cards) = h
            .get("/api/assignments/student/assignments/cards/", &student)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cards.as_array().unwrap().len(), 1);
        assert!(cards[0]["assignment_id"].is_null());
        assert_eq!(cards[0]["faculty_id"], 10);
    }

    #[tokio::test]
    async fn test_media_is_limited_to_owners() {
        let h = Harness::new(|db| {
            db.insert_student(&student(1, 2, 1, 1)).unwrap();
            db.insert_student(&student(2, 2, 1, 1)).unwrap();
            db.insert_faculty(&faculty(10)).unwrap();
            db.insert_faculty(&faculty(11)).unwrap();
            db.insert_faculty_course(&course(10, (2, 1, 1), "CS201")).unwrap();
            account(db, "student1@college.edu", Role::Student, Some(1));
            account(db, "student2@college.edu", Role::Student, Some(2));
            account(db, "faculty10@college.edu", Role::Faculty, Some(10));
            account(db, "faculty11@college.edu", Role::Faculty, Some(11));
            account(db, "dean@college.edu", Role::Management, None);
        });
        let owner = h.token("student1@college.edu").await;
        let (_, card) = h
            .json(
                "POST",
                "/api/assignments/student/assignments/create/10/CS201/",
                &owner,
                json!({}),
            )
            .await;
        let id = card["assignment_id"].as_i64().unwrap();
        let (_, view) = upload(&h, &owner, id, b"SECRET-ESSAY").await;
        assert_eq!(view["status"], "submitted");

        let (_, download) = h
            .get(&format!("/api/assignments/student/assignments/{}/download/", id), &owner)
            .await;
        let url = download["download_url"].as_str().unwrap().to_string();

        for email in ["student1@college.edu", "faculty10@college.edu", "dean@college.edu"] {
            let token = h.token(email).await;
            let (status, body) = h.raw_get(&url, &token).await;
            assert_eq!(status, StatusCode::OK, "{}", email);
            assert_eq!(body, b"SECRET-ESSAY".to_vec());
        }

        for email in ["student2@college.edu", "faculty11@college.edu"] {
            let token = h.token(email).await;
            let (status, body) = h.raw_get(&url, &token).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", email);
            assert_ne!(body, b"SECRET-ESSAY".to_vec());
        }

        // a file on disk with no assignment behind it
        let (status, _) = h
            .get("/media/assignments/2000/01/01/assignment.pdf", &owner)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

use super::error::{bad_json, ApiError};
use super::{AuthUser, SharedState};
use crate::model::{Notification, Role};
use crate::notify::{self, PublishOutcome, PublishRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

/// Students see what is addressed to them; every other role sees broadcasts
pub async fn list(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let db = state.db.lock().await;
    let notifications = match user.role() {
        Role::Student => notify::visible_for(&db, &user.student(&db)?)?,
        _ => notify::broadcasts(&db)?,
    };
    Ok(Json(notifications))
}

pub async fn create(
    State(state): State<SharedState>,
    user: AuthUser,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishOutcome>), ApiError> {
    let Json(req) = payload.map_err(bad_json)?;
    let db = state.db.lock().await;
    let outcome = notify::publish(&db, user.role(), &req)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::model::Role;
    use crate::storage::fixtures::*;
    use axum::http::StatusCode;
    use serde_json::json;

    fn seeded() -> Harness {
        Harness::new(|db| {
            db.insert_student(&student(1, 2, 1, 1)).unwrap();
            db.insert_student(&student(2, 3, 1, 1)).unwrap();
            db.insert_faculty(&faculty(10)).unwrap();
            account(db, "student1@college.edu", Role::Student, Some(1));
            account(db, "student2@college.edu", Role::Student, Some(2));
            account(db, "faculty10@college.edu", Role::Faculty, Some(10));
        })
    }

    #[tokio::test]
    async fn test_publish_fans_out_and_filters_visibility() {
        let h = seeded();
        let faculty = h.token("faculty10@college.edu").await;

        let (status, body) = h
            .json(
                "POST",
                "/api/notifications/",
                &faculty,
                json!({
                    "title": "Lab record submission",
                    "description": "Bring your records",
                    "due_date": "2026-11-02",
                    "priority": "High",
                    "targets": [
                        {"year_id": 2, "branch_id": 1, "section_id": 1},
                        {"student_id": 2}
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], 2);

        let first = h.token("student1@college.edu").await;
        let (_, body) = h.get("/api/notifications/", &first).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["title"], "Lab record submission");

        let second = h.token("student2@college.edu").await;
        let (_, body) = h.get("/api/notifications/", &second).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["student_id"], 2);

        // not a broadcast, so the publisher's own feed stays empty
        let (_, body) = h.get("/api/notifications/", &faculty).await;
        assert_eq!(body.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_students_cannot_publish() {
        let h = seeded();
        let token = h.token("student1@college.edu").await;
        let (status, _) = h
            .json(
                "POST",
                "/api/notifications/",
                &token,
                json!({"title": "x", "due_date": "2026-11-02"}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let h = seeded();
        let token = h.token("faculty10@college.edu").await;
        let (status, body) = h
            .json("POST", "/api/notifications/", &token, json!({"targets": "everyone"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}

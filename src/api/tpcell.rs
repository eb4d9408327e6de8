use super::error::ApiResult;
use super::{AuthUser, SharedState};
use crate::model::{cgpa_estimate, ExamMark, Role, StaffProfile};
use axum::extract::State;
use axum::Json;
use serde::Serialize;

pub async fn profile(State(state): State<SharedState>, user: AuthUser) -> ApiResult<StaffProfile> {
    let db = state.db.lock().await;
    Ok(Json(user.staff(&db, Role::Placement)?))
}

/// Placement readiness across the whole student body
#[derive(Debug, Serialize)]
pub struct PlacementStats {
    pub total_students: usize,
    pub students_with_backlogs: usize,
    /// Students without any backlog
    pub eligible_students: usize,
    /// Over every exam row, not averaged per student
    pub avg_cgpa: f64,
}

pub async fn stats(State(state): State<SharedState>, user: AuthUser) -> ApiResult<PlacementStats> {
    let db = state.db.lock().await;
    // the caller must map to a placement-cell employee
    user.staff(&db, Role::Placement)?;

    let total_students = db.count_students()?;
    let students_with_backlogs = db.count_students_with_backlogs()?;
    let all_marks: Vec<ExamMark> = db.exam_marks_by_student()?.into_values().flatten().collect();

    Ok(Json(PlacementStats {
        total_students,
        students_with_backlogs,
        eligible_students: total_students.saturating_sub(students_with_backlogs),
        avg_cgpa: cgpa_estimate(&all_marks),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::model::{Backlog, ExamMark, Role};
    use crate::storage::fixtures::*;
    use axum::http::StatusCode;

    fn mark(student_id: i64, total_each: i64) -> ExamMark {
        ExamMark {
            student_id,
            year_id: 1,
            branch_id: 1,
            section_id: 1,
            semester_id: 1,
            mid_id: 1,
            course_id: "CS101".to_string(),
            mid_marks: total_each,
            quiz_marks: total_each,
            assignment_marks: total_each,
        }
    }

    #[tokio::test]
    async fn test_stats() {
        let h = Harness::new(|db| {
            db.insert_staff(&staff(Role::Placement, 3)).unwrap();
            account(db, "placement3@college.edu", Role::Placement, Some(3));
            // same numeric id under another role must not satisfy the lookup
            db.insert_staff(&staff(Role::Management, 3)).unwrap();
            account(db, "management3@college.edu", Role::Management, Some(3));
            for id in 1..=4 {
                db.insert_student(&student(id, 1, 1, 1)).unwrap();
            }
            for semester_id in [1, 2] {
                db.insert_backlog(&Backlog {
                    student_id: 2,
                    semester_id,
                    course_id: "MA101".to_string(),
                })
                .unwrap();
            }
            db.insert_exam_mark(&mark(1, 10)).unwrap();
            db.insert_exam_mark(&mark(2, 5)).unwrap();
        });

        let token = h.token("placement3@college.edu").await;
        let (status, body) = h.get("/api/tpcell/stats/", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_students"], 4);
        assert_eq!(body["students_with_backlogs"], 1);
        assert_eq!(body["eligible_students"], 3);
        assert_eq!(body["avg_cgpa"], 7.5);

        let (_, body) = h.get("/api/tpcell/profile/", &token).await;
        assert_eq!(body["emp_id"], 3);

        let other = h.token("management3@college.edu").await;
        let (status, _) = h.get("/api/tpcell/stats/", &other).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

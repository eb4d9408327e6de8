use super::{now, Database};
use crate::error::Result;
use crate::model::{Assignment, ClassSection};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const ASSIGNMENT_COLUMNS: &str = "assignment_id, student_id, faculty_id, course_id, year_id, \
     branch_id, section_id, pdf_ref, file_size, submitted_at, marks, graded_at, created_at, updated_at";

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        assignment_id: row.get(0)?,
        student_id: row.get(1)?,
        faculty_id: row.get(2)?,
        course_id: row.get(3)?,
        year_id: row.get(4)?,
        branch_id: row.get(5)?,
        section_id: row.get(6)?,
        pdf_ref: row.get(7)?,
        file_size: row.get(8)?,
        submitted_at: row.get(9)?,
        marks: row.get(10)?,
        graded_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Which of a faculty member's assignments to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingQueue {
    /// File uploaded, no marks yet
    Pending,
    /// Marks awarded
    Graded,
}

/// Per-faculty assignment counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct GradingOverview {
    pub total_assignments: usize,
    pub pending_grading: usize,
    pub graded: usize,
}

impl Database {
    // ==================== Assignments ====================

    /// Insert an empty assignment record unless one exists for the
    /// (student, faculty, course) triple. Returns the id and whether it was created.
    pub fn insert_assignment_if_missing(
        &self,
        student_id: i64,
        faculty_id: i64,
        course_id: &str,
        class: ClassSection,
    ) -> Result<(i64, bool)> {
        let ts = now();
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO assignments (
                student_id, faculty_id, course_id, year_id, branch_id, section_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                student_id,
                faculty_id,
                course_id,
                class.year_id,
                class.branch_id,
                class.section_id,
                ts,
            ],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT assignment_id FROM assignments WHERE student_id = ?1 AND faculty_id = ?2 AND course_id = ?3",
            params![student_id, faculty_id, course_id],
            |row| row.get(0),
        )?;

        Ok((id, inserted > 0))
    }

    pub fn get_assignment(&self, assignment_id: i64) -> Result<Option<Assignment>> {
        let sql = format!(
            "SELECT {} FROM assignments WHERE assignment_id = ?1",
            ASSIGNMENT_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, [assignment_id], assignment_from_row)
            .optional()?)
    }

    pub fn find_assignment(
        &self,
        student_id: i64,
        faculty_id: i64,
        course_id: &str,
    ) -> Result<Option<Assignment>> {
        let sql = format!(
            "SELECT {} FROM assignments WHERE student_id = ?1 AND faculty_id = ?2 AND course_id = ?3",
            ASSIGNMENT_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![student_id, faculty_id, course_id], assignment_from_row)
            .optional()?)
    }

    /// The assignment whose stored file is `pdf_ref`
    pub fn find_assignment_by_file(&self, pdf_ref: &str) -> Result<Option<Assignment>> {
        let sql = format!("SELECT {} FROM assignments WHERE pdf_ref = ?1", ASSIGNMENT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [pdf_ref], assignment_from_row)
            .optional()?)
    }

    /// A student's assignments, newest record first
    pub fn list_student_assignments(&self, student_id: i64) -> Result<Vec<Assignment>> {
        let sql = format!(
            "SELECT {} FROM assignments WHERE student_id = ?1 ORDER BY created_at DESC, assignment_id DESC",
            ASSIGNMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([student_id], assignment_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_faculty_assignments(&self, faculty_id: i64, queue: GradingQueue) -> Result<Vec<Assignment>> {
        let filter = match queue {
            GradingQueue::Pending => {
                "pdf_ref IS NOT NULL AND marks IS NULL ORDER BY submitted_at DESC, assignment_id DESC"
            }
            GradingQueue::Graded => "marks IS NOT NULL ORDER BY graded_at DESC, assignment_id DESC",
        };
        let sql = format!(
            "SELECT {} FROM assignments WHERE faculty_id = ?1 AND {}",
            ASSIGNMENT_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([faculty_id], assignment_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn grading_overview(&self, faculty_id: i64) -> Result<GradingOverview> {
        let (total, pending, graded): (i64, i64, i64) = self.conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN marks IS NULL THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN marks IS NOT NULL THEN 1 ELSE 0 END), 0)
            FROM assignments WHERE faculty_id = ?1
            "#,
            [faculty_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(GradingOverview {
            total_assignments: total as usize,
            pending_grading: pending as usize,
            graded: graded as usize,
        })
    }

    /// Replace the uploaded file. `submitted_at` is only set the first time.
    pub fn record_submission(&self, assignment_id: i64, pdf_ref: &str, file_size: i64) -> Result<()> {
        let ts = now();
        self.conn.execute(
            r#"
            UPDATE assignments
            SET pdf_ref = ?1,
                file_size = ?2,
                submitted_at = COALESCE(submitted_at, ?3),
                updated_at = ?3
            WHERE assignment_id = ?4
            "#,
            params![pdf_ref, file_size, ts, assignment_id],
        )?;
        Ok(())
    }

    /// Set marks. `graded_at` is only set the first time.
    pub fn record_grade(&self, assignment_id: i64, marks: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE assignments
            SET marks = ?1,
                graded_at = COALESCE(graded_at, ?2),
                updated_at = ?2
            WHERE assignment_id = ?3
            "#,
            params![marks, at, assignment_id],
        )?;
        Ok(())
    }
}

use super::Database;
use crate::error::Result;
use crate::model::{AcademicRecord, AttendanceRecord, Backlog, ExamMark, FeeRecord};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::collections::HashMap;

const FEE_COLUMNS: &str = "student_id, mode_of_admission, fee_total, paid_amount, \
     remaining_amount, library_fine, equipment_fine, paid_crt_fee";

const EXAM_COLUMNS: &str = "student_id, year_id, branch_id, section_id, semester_id, mid_id, \
     course_id, mid_marks, quiz_marks, assignment_marks";

const ATTENDANCE_COLUMNS: &str =
    "student_id, semester_id, course_id, year_id, branch_id, section_id, class_records";

fn fee_from_row(row: &Row<'_>) -> rusqlite::Result<FeeRecord> {
    Ok(FeeRecord {
        student_id: row.get(0)?,
        mode_of_admission: row.get(1)?,
        fee_total: row.get(2)?,
        paid_amount: row.get(3)?,
        remaining_amount: row.get(4)?,
        library_fine: row.get(5)?,
        equipment_fine: row.get(6)?,
        paid_crt_fee: row.get(7)?,
    })
}

fn exam_from_row(row: &Row<'_>) -> rusqlite::Result<ExamMark> {
    Ok(ExamMark {
        student_id: row.get(0)?,
        year_id: row.get(1)?,
        branch_id: row.get(2)?,
        section_id: row.get(3)?,
        semester_id: row.get(4)?,
        mid_id: row.get(5)?,
        course_id: row.get(6)?,
        mid_marks: row.get(7)?,
        quiz_marks: row.get(8)?,
        assignment_marks: row.get(9)?,
    })
}

fn attendance_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let raw: String = row.get(6)?;
    let class_records = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    Ok(AttendanceRecord {
        student_id: row.get(0)?,
        semester_id: row.get(1)?,
        course_id: row.get(2)?,
        year_id: row.get(3)?,
        branch_id: row.get(4)?,
        section_id: row.get(5)?,
        class_records,
    })
}

/// Totals across every fee row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FeeSummary {
    pub total_expected: i64,
    pub total_collected: i64,
    pub total_pending: i64,
    pub students_paid: usize,
    pub students_pending: usize,
}

/// A fee row joined with the owning student's name and class
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StudentFee {
    pub student_id: i64,
    pub name: String,
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    #[serde(flatten)]
    pub fee: FeeRecord,
}

impl Database {
    // ==================== Academics ====================

    /// Returns false when the (student, semester, course) row already exists
    pub fn insert_academic(&self, r: &AcademicRecord) -> Result<bool> {
        let n = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO academics (student_id, semester_id, course_code, marks, attendance)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![r.student_id, r.semester_id, r.course_code, r.marks, r.attendance],
        )?;
        Ok(n > 0)
    }

    pub fn list_academics(&self, student_id: i64) -> Result<Vec<AcademicRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT student_id, semester_id, course_code, marks, attendance
            FROM academics WHERE student_id = ?1
            ORDER BY semester_id, course_code
            "#,
        )?;
        let rows = stmt.query_map([student_id], |row| {
            Ok(AcademicRecord {
                student_id: row.get(0)?,
                semester_id: row.get(1)?,
                course_code: row.get(2)?,
                marks: row.get(3)?,
                attendance: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ==================== Backlogs ====================

    pub fn insert_backlog(&self, b: &Backlog) -> Result<bool> {
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO backlogs (student_id, semester_id, course_id) VALUES (?1, ?2, ?3)",
            params![b.student_id, b.semester_id, b.course_id],
        )?;
        Ok(n > 0)
    }

    pub fn list_backlogs(&self, student_id: i64) -> Result<Vec<Backlog>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT student_id, semester_id, course_id FROM backlogs
            WHERE student_id = ?1 ORDER BY semester_id, course_id
            "#,
        )?;
        let rows = stmt.query_map([student_id], |row| {
            Ok(Backlog {
                student_id: row.get(0)?,
                semester_id: row.get(1)?,
                course_id: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Backlog count per student for the given ids; students without backlogs are absent
    pub fn backlog_counts(&self, student_ids: &[i64]) -> Result<HashMap<i64, usize>> {
        if student_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; student_ids.len()].join(", ");
        let sql = format!(
            "SELECT student_id, COUNT(*) FROM backlogs WHERE student_id IN ({}) GROUP BY student_id",
            placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(student_ids), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
    }

    /// Number of distinct students with at least one backlog
    pub fn count_students_with_backlogs(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT student_id) FROM backlogs",
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    // ==================== Fees ====================

    pub fn insert_fee(&self, f: &FeeRecord) -> Result<bool> {
        let n = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO fees ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                FEE_COLUMNS
            ),
            params![
                f.student_id,
                f.mode_of_admission,
                f.fee_total,
                f.paid_amount,
                f.remaining_amount,
                f.library_fine,
                f.equipment_fine,
                f.paid_crt_fee,
            ],
        )?;
        Ok(n > 0)
    }

    pub fn get_fee(&self, student_id: i64) -> Result<Option<FeeRecord>> {
        let sql = format!("SELECT {} FROM fees WHERE student_id = ?1", FEE_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [student_id], fee_from_row)
            .optional()?)
    }

    pub fn fee_summary(&self) -> Result<FeeSummary> {
        let sql = format!("SELECT {} FROM fees", FEE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], fee_from_row)?;

        let mut summary = FeeSummary::default();
        for row in rows {
            let fee = row?;
            summary.total_expected += fee.fee_total;
            summary.total_collected += fee.paid_crt_fee;
            summary.total_pending += fee.remaining();
            if fee.is_paid() {
                summary.students_paid += 1;
            } else {
                summary.students_pending += 1;
            }
        }
        Ok(summary)
    }

    /// Fee rows joined with students, optionally narrowed by year and branch
    pub fn list_student_fees(&self, year_id: Option<i64>, branch_id: Option<i64>) -> Result<Vec<StudentFee>> {
        let mut sql = String::from(
            r#"
            SELECT s.student_id, s.first_name, s.last_name, s.year_id, s.branch_id, s.sec_id,
                   f.mode_of_admission, f.fee_total, f.paid_amount, f.remaining_amount,
                   f.library_fine, f.equipment_fine, f.paid_crt_fee
            FROM fees f JOIN students s ON s.student_id = f.student_id
            WHERE 1 = 1
            "#,
        );
        let mut values = Vec::new();
        if let Some(year) = year_id {
            sql.push_str(" AND s.year_id = ?");
            values.push(year);
        }
        if let Some(branch) = branch_id {
            sql.push_str(" AND s.branch_id = ?");
            values.push(branch);
        }
        sql.push_str(" ORDER BY s.student_id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            let student_id: i64 = row.get(0)?;
            let first: String = row.get(1)?;
            let last: String = row.get(2)?;
            Ok(StudentFee {
                student_id,
                name: format!("{} {}", first, last).trim().to_string(),
                year_id: row.get(3)?,
                branch_id: row.get(4)?,
                section_id: row.get(5)?,
                fee: FeeRecord {
                    student_id,
                    mode_of_admission: row.get(6)?,
                    fee_total: row.get(7)?,
                    paid_amount: row.get(8)?,
                    remaining_amount: row.get(9)?,
                    library_fine: row.get(10)?,
                    equipment_fine: row.get(11)?,
                    paid_crt_fee: row.get(12)?,
                },
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ==================== Exam marks ====================

    pub fn insert_exam_mark(&self, m: &ExamMark) -> Result<bool> {
        let n = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO exam_marks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                EXAM_COLUMNS
            ),
            params![
                m.student_id,
                m.year_id,
                m.branch_id,
                m.section_id,
                m.semester_id,
                m.mid_id,
                m.course_id,
                m.mid_marks,
                m.quiz_marks,
                m.assignment_marks,
            ],
        )?;
        Ok(n > 0)
    }

    pub fn list_exam_marks(&self, student_id: i64) -> Result<Vec<ExamMark>> {
        let sql = format!(
            "SELECT {} FROM exam_marks WHERE student_id = ?1 ORDER BY semester_id, mid_id, course_id",
            EXAM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([student_id], exam_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every exam row grouped by student
    pub fn exam_marks_by_student(&self) -> Result<HashMap<i64, Vec<ExamMark>>> {
        let sql = format!("SELECT {} FROM exam_marks", EXAM_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut grouped: HashMap<i64, Vec<ExamMark>> = HashMap::new();
        for row in stmt.query_map([], exam_from_row)? {
            let mark = row?;
            grouped.entry(mark.student_id).or_default().push(mark);
        }
        Ok(grouped)
    }

    // ==================== Attendance ====================

    pub fn insert_attendance(&self, a: &AttendanceRecord) -> Result<bool> {
        let records = serde_json::to_string(&a.class_records)?;
        let n = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO attendance ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                ATTENDANCE_COLUMNS
            ),
            params![
                a.student_id,
                a.semester_id,
                a.course_id,
                a.year_id,
                a.branch_id,
                a.section_id,
                records,
            ],
        )?;
        Ok(n > 0)
    }

    pub fn list_attendance(&self, student_id: i64) -> Result<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {} FROM attendance WHERE student_id = ?1 ORDER BY semester_id, course_id",
            ATTENDANCE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([student_id], attendance_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::profiles::fixtures::*;
    use super::*;

    fn fee(student_id: i64, total: i64, paid: i64) -> FeeRecord {
        FeeRecord {
            student_id,
            mode_of_admission: "Convener".to_string(),
            fee_total: total,
            paid_amount: paid,
            remaining_amount: None,
            library_fine: 0,
            equipment_fine: 0,
            paid_crt_fee: paid,
        }
    }

    #[test]
    fn test_fee_summary_and_listing() {
        let db = Database::open_in_memory().unwrap();
        db.insert_student(&student(1, 2, 1, 1)).unwrap();
        db.insert_student(&student(2, 3, 1, 1)).unwrap();
        assert!(db.insert_fee(&fee(1, 1000, 1000)).unwrap());
        assert!(db.insert_fee(&fee(2, 1000, 250)).unwrap());
        assert!(!db.insert_fee(&fee(2, 5, 5)).unwrap());

        let summary = db.fee_summary().unwrap();
        assert_eq!(summary.total_expected, 2000);
        assert_eq!(summary.total_collected, 1250);
        assert_eq!(summary.total_pending, 750);
        assert_eq!(summary.students_paid, 1);
        assert_eq!(summary.students_pending, 1);

        let year3 = db.list_student_fees(Some(3), None).unwrap();
        assert_eq!(year3.len(), 1);
        assert_eq!(year3[0].student_id, 2);
        assert_eq!(year3[0].name, "Student No2");
    }

    #[test]
    fn test_fact_rows_require_student() {
        let db = Database::open_in_memory().unwrap();
        let err = db.insert_backlog(&Backlog {
            student_id: 99,
            semester_id: 1,
            course_id: "CS101".to_string(),
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_backlog_counts() {
        let db = Database::open_in_memory().unwrap();
        db.insert_student(&student(1, 2, 1, 1)).unwrap();
        db.insert_student(&student(2, 2, 1, 1)).unwrap();
        for course in ["CS101", "CS102"] {
            db.insert_backlog(&Backlog {
                student_id: 1,
                semester_id: 1,
                course_id: course.to_string(),
            })
            .unwrap();
        }

        let counts = db.backlog_counts(&[1, 2]).unwrap();
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&2), None);
        assert_eq!(db.count_students_with_backlogs().unwrap(), 1);
    }

    #[test]
    fn test_attendance_records_roundtrip_through_json() {
        let db = Database::open_in_memory().unwrap();
        db.insert_student(&student(1, 2, 1, 1)).unwrap();
        let record = AttendanceRecord {
            student_id: 1,
            semester_id: 3,
            course_id: "CS201".to_string(),
            year_id: 2,
            branch_id: 1,
            section_id: 1,
            class_records: vec![Some(1), None, Some(0)],
        };
        assert!(db.insert_attendance(&record).unwrap());
        assert!(!db.insert_attendance(&record).unwrap());

        let stored = db.list_attendance(1).unwrap();
        assert_eq!(stored, vec![record]);
    }
}

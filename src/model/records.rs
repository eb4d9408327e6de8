//! Per-student fact tables

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicRecord {
    pub student_id: i64,
    pub semester_id: i64,
    pub course_code: String,
    /// `-1` marks a backlog
    pub marks: Option<i64>,
    pub attendance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backlog {
    pub student_id: i64,
    pub semester_id: i64,
    pub course_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub student_id: i64,
    pub mode_of_admission: String,
    pub fee_total: i64,
    pub paid_amount: i64,
    pub remaining_amount: Option<i64>,
    pub library_fine: i64,
    pub equipment_fine: i64,
    pub paid_crt_fee: i64,
}

impl FeeRecord {
    /// Outstanding amount, derived when the source left it blank
    pub fn remaining(&self) -> i64 {
        self.remaining_amount
            .unwrap_or_else(|| (self.fee_total - self.paid_crt_fee).max(0))
    }

    pub fn is_paid(&self) -> bool {
        self.fee_total > 0 && self.paid_crt_fee >= self.fee_total
    }

    pub fn status(&self) -> &'static str {
        if self.is_paid() {
            "Paid"
        } else {
            "Pending"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamMark {
    pub student_id: i64,
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    pub semester_id: i64,
    pub mid_id: i64,
    pub course_id: String,
    pub mid_marks: i64,
    pub quiz_marks: i64,
    pub assignment_marks: i64,
}

impl ExamMark {
    /// Each component is out of 10, so a row totals at most 30
    pub const MAX_TOTAL: i64 = 30;

    pub fn total(&self) -> i64 {
        self.mid_marks + self.quiz_marks + self.assignment_marks
    }
}

/// Estimate a 10-point CGPA from mid-exam rows
pub fn cgpa_estimate(marks: &[ExamMark]) -> f64 {
    if marks.is_empty() {
        return 0.0;
    }
    let total: i64 = marks.iter().map(ExamMark::total).sum();
    let scale = (marks.len() as i64 * ExamMark::MAX_TOTAL) as f64;
    round2(total as f64 / scale * 10.0)
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: i64,
    pub semester_id: i64,
    pub course_id: String,
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    /// One slot per class; `None` where no class was recorded
    pub class_records: Vec<Option<i64>>,
}

impl AttendanceRecord {
    /// Maximum number of class slots tracked per course
    pub const SLOTS: usize = 50;

    pub fn classes_held(&self) -> usize {
        self.class_records.iter().filter(|r| r.is_some()).count()
    }

    pub fn classes_attended(&self) -> usize {
        self.class_records
            .iter()
            .filter(|r| matches!(r, Some(v) if *v > 0))
            .count()
    }

    pub fn percentage(&self) -> f64 {
        let held = self.classes_held();
        if held == 0 {
            return 0.0;
        }
        round2(self.classes_attended() as f64 / held as f64 * 100.0)
    }
}

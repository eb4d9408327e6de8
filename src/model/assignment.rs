//! Coursework submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a coursework submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    NotSubmitted,
    Submitted,
    Graded,
}

impl AssignmentStatus {
    /// Status is derived, never stored
    pub fn of(has_file: bool, marks: Option<i64>, graded_at: Option<&DateTime<Utc>>) -> Self {
        if marks.is_some() && graded_at.is_some() {
            AssignmentStatus::Graded
        } else if has_file && marks.is_none() {
            AssignmentStatus::Submitted
        } else {
            AssignmentStatus::NotSubmitted
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentStatus::NotSubmitted => write!(f, "not_submitted"),
            AssignmentStatus::Submitted => write!(f, "submitted"),
            AssignmentStatus::Graded => write!(f, "graded"),
        }
    }
}

/// One submission record per (student, faculty, course)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: i64,
    pub student_id: i64,
    pub faculty_id: i64,
    pub course_id: String,
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    /// Path of the uploaded PDF, relative to the upload directory
    pub pdf_ref: Option<String>,
    /// Size of the uploaded file in bytes
    pub file_size: Option<i64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub marks: Option<i64>,
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub const MIN_MARKS: i64 = 0;
    pub const MAX_MARKS: i64 = 10;

    pub fn status(&self) -> AssignmentStatus {
        AssignmentStatus::of(self.pdf_ref.is_some(), self.marks, self.graded_at.as_ref())
    }

    pub fn is_submitted(&self) -> bool {
        self.pdf_ref.is_some() && self.submitted_at.is_some()
    }

    pub fn is_graded(&self) -> bool {
        self.status() == AssignmentStatus::Graded
    }

    /// Bare file name of the uploaded PDF
    pub fn file_name(&self) -> Option<&str> {
        self.pdf_ref
            .as_deref()
            .map(|p| p.rsplit('/').next().unwrap_or(p))
    }

    /// File size in KiB, rounded to two places
    pub fn file_size_kb(&self) -> Option<f64> {
        self.file_size
            .map(|b| super::records::round2(b as f64 / 1024.0))
    }
}

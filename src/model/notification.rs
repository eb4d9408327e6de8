//! Addressed notifications

use super::{ClassSection, StudentProfile};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Addressing value that matches any value on its axis
pub const WILDCARD: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(crate::error::Error::validation(format!(
                "priority must be Low, Medium or High (got '{}')",
                other
            ))),
        }
    }
}

/// Who a notification row is addressed to. Each axis is 0 for "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Audience {
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    pub student_id: i64,
}

impl Audience {
    pub const BROADCAST: Audience = Audience {
        year_id: WILDCARD,
        branch_id: WILDCARD,
        section_id: WILDCARD,
        student_id: WILDCARD,
    };

    pub fn class(class: ClassSection) -> Self {
        Self {
            year_id: class.year_id,
            branch_id: class.branch_id,
            section_id: class.section_id,
            student_id: WILDCARD,
        }
    }

    /// Addressed to one student; the class axes are informational only
    pub fn student(student: &StudentProfile) -> Self {
        Self {
            student_id: student.student_id,
            ..Self::class(student.class())
        }
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// A non-zero student axis is an exact target on its own. Otherwise
    /// every class axis must be the wildcard or equal the student's value.
    pub fn matches(&self, student: &StudentProfile) -> bool {
        if self.student_id != WILDCARD {
            return self.student_id == student.student_id;
        }
        axis_matches(self.year_id, student.year_id)
            && axis_matches(self.branch_id, student.branch_id)
            && axis_matches(self.section_id, student.section_id)
    }
}

fn axis_matches(axis: i64, value: i64) -> bool {
    axis == WILDCARD || axis == value
}

/// A write-time target supplied by the publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationTarget {
    Student { student_id: i64 },
    Class { year_id: i64, branch_id: i64, section_id: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(flatten)]
    pub audience: Audience,
    pub semester_id: Option<i64>,
    pub notification_type: String,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to store a notification row
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub audience: Audience,
    pub semester_id: Option<i64>,
    pub notification_type: String,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub priority: Priority,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: i64, year: i64, branch: i64, section: i64) -> StudentProfile {
        StudentProfile {
            student_id: id,
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: format!("s{}@college.edu", id),
            gender: "F".to_string(),
            year_id: year,
            branch_id: branch,
            section_id: section,
            roll_no: id,
            phone_no: "9000000000".to_string(),
            ssc_marks: None,
            inter_marks: None,
            password_hash: String::new(),
        }
    }

    #[test]
    fn test_class_audience_visibility() {
        let audience = Audience::class(ClassSection::new(2, 1, 1));
        assert!(audience.matches(&student(1, 2, 1, 1)));
        assert!(audience.matches(&student(2, 2, 1, 1)));
        assert!(!audience.matches(&student(3, 1, 1, 1)));
    }

    #[test]
    fn test_broadcast_matches_everyone() {
        assert!(Audience::BROADCAST.is_broadcast());
        assert!(Audience::BROADCAST.matches(&student(1, 4, 3, 2)));
        assert!(Audience::BROADCAST.matches(&student(2, 1, 1, 1)));
    }

    #[test]
    fn test_partial_wildcard() {
        let audience = Audience {
            year_id: 3,
            ..Audience::BROADCAST
        };
        assert!(audience.matches(&student(1, 3, 5, 2)));
        assert!(!audience.matches(&student(2, 2, 5, 2)));
    }

    #[test]
    fn test_student_axis_overrides_class_axes() {
        let audience = Audience {
            year_id: 1,
            branch_id: 1,
            section_id: 1,
            student_id: 42,
        };
        // class triple disagrees, student id wins
        assert!(audience.matches(&student(42, 3, 2, 2)));
        assert!(!audience.matches(&student(43, 1, 1, 1)));
    }

    #[test]
    fn test_target_deserialization() {
        let t: NotificationTarget = serde_json::from_str(r#"{"student_id": 7}"#).unwrap();
        assert_eq!(t, NotificationTarget::Student { student_id: 7 });

        let t: NotificationTarget =
            serde_json::from_str(r#"{"year_id": 2, "branch_id": 1, "section_id": 3}"#).unwrap();
        assert_eq!(
            t,
            NotificationTarget::Class {
                year_id: 2,
                branch_id: 1,
                section_id: 3
            }
        );
    }
}

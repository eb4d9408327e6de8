//! Domain model
//!
//! Accounts are the authentication identities; profiles hold the
//! role-specific attributes. The two are joined by email first and by the
//! composite `(role, id)` key second.

mod assignment;
mod notification;
mod profile;
mod records;

pub use assignment::{Assignment, AssignmentStatus};
pub use notification::{Audience, NewNotification, Notification, NotificationTarget, Priority, WILDCARD};
pub use profile::{ClassSection, FacultyCourse, FacultyProfile, Profile, StaffProfile, StudentProfile};
pub use records::{cgpa_estimate, AcademicRecord, AttendanceRecord, Backlog, ExamMark, FeeRecord};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role tag carried by every account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Management,
    /// Training & placement cell
    #[serde(alias = "tpcell")]
    Placement,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Management => "management",
            Role::Placement => "placement",
            Role::Admin => "admin",
        }
    }

    /// Whether accounts of this role have a profile table
    pub fn has_profile(&self) -> bool {
        !matches!(self, Role::Admin)
    }

    /// Roles allowed to publish notifications
    pub fn can_publish(&self) -> bool {
        !matches!(self, Role::Student)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "management" => Ok(Role::Management),
            "placement" | "tpcell" => Ok(Role::Placement),
            "admin" => Ok(Role::Admin),
            other => Err(crate::error::Error::validation(format!(
                "unknown role: {}",
                other
            ))),
        }
    }
}

/// Composite profile key. Numeric ids are only unique within a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileKey {
    pub role: Role,
    pub id: i64,
}

impl ProfileKey {
    pub fn new(role: Role, id: i64) -> Self {
        Self { role, id }
    }
}

impl std::fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

/// Authentication identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Mirrors the profile's numeric key; may be null until backfilled
    pub external_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
}

impl Account {
    /// Profile key implied by the external id, if one is set
    pub fn profile_key(&self) -> Option<ProfileKey> {
        self.external_id.map(|id| ProfileKey::new(self.role, id))
    }
}

/// Fields needed to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub external_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
}

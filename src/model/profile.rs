//! Role profiles

use super::{ProfileKey, Role};
use serde::{Deserialize, Serialize};

/// A (year, branch, section) class triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassSection {
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
}

impl ClassSection {
    pub fn new(year_id: i64, branch_id: i64, section_id: i64) -> Self {
        Self {
            year_id,
            branch_id,
            section_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    pub roll_no: i64,
    pub phone_no: String,
    pub ssc_marks: Option<f64>,
    pub inter_marks: Option<f64>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

impl StudentProfile {
    pub fn class(&self) -> ClassSection {
        ClassSection::new(self.year_id, self.branch_id, self.section_id)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyProfile {
    pub faculty_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub department: String,
    pub designation: String,
    pub qualifications: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

impl FacultyProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Management and placement-cell employees share one shape
#[derive(Debug, Clone, Serialize)]
pub struct StaffProfile {
    #[serde(skip)]
    pub role: Role,
    pub emp_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub designation: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

/// Which classes a faculty member teaches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacultyCourse {
    pub faculty_id: i64,
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    pub course_id: String,
}

impl FacultyCourse {
    pub fn class(&self) -> ClassSection {
        ClassSection::new(self.year_id, self.branch_id, self.section_id)
    }
}

/// A resolved role profile
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Student(StudentProfile),
    Faculty(FacultyProfile),
    Staff(StaffProfile),
}

impl Profile {
    pub fn key(&self) -> ProfileKey {
        match self {
            Profile::Student(s) => ProfileKey::new(Role::Student, s.student_id),
            Profile::Faculty(f) => ProfileKey::new(Role::Faculty, f.faculty_id),
            Profile::Staff(s) => ProfileKey::new(s.role, s.emp_id),
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Profile::Student(s) => &s.email,
            Profile::Faculty(f) => &f.email,
            Profile::Staff(s) => &s.email,
        }
    }
}

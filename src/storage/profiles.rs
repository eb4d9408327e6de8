use super::{is_unique_violation, Database};
use crate::error::{Error, Result};
use crate::model::{
    ClassSection, FacultyCourse, FacultyProfile, Profile, ProfileKey, Role, StaffProfile,
    StudentProfile,
};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

const STUDENT_COLUMNS: &str = "student_id, first_name, last_name, email, gender, year_id, \
     branch_id, sec_id, roll_no, phone_no, ssc_marks, inter_marks, password_hash";

const FACULTY_COLUMNS: &str = "faculty_id, first_name, last_name, email, gender, department, \
     designation, qualifications, password_hash";

const STAFF_COLUMNS: &str =
    "role, emp_id, first_name, last_name, email, gender, designation, password_hash";

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<StudentProfile> {
    Ok(StudentProfile {
        student_id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        gender: row.get(4)?,
        year_id: row.get(5)?,
        branch_id: row.get(6)?,
        section_id: row.get(7)?,
        roll_no: row.get(8)?,
        phone_no: row.get(9)?,
        ssc_marks: row.get(10)?,
        inter_marks: row.get(11)?,
        password_hash: row.get(12)?,
    })
}

fn faculty_from_row(row: &Row<'_>) -> rusqlite::Result<FacultyProfile> {
    Ok(FacultyProfile {
        faculty_id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        gender: row.get(4)?,
        department: row.get(5)?,
        designation: row.get(6)?,
        qualifications: row.get(7)?,
        password_hash: row.get(8)?,
    })
}

fn staff_from_row(row: &Row<'_>) -> rusqlite::Result<StaffProfile> {
    Ok(StaffProfile {
        role: row.get(0)?,
        emp_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        gender: row.get(5)?,
        designation: row.get(6)?,
        password_hash: row.get(7)?,
    })
}

fn conflict_or(e: rusqlite::Error, what: impl FnOnce() -> String) -> Error {
    if is_unique_violation(&e) {
        Error::Conflict(what())
    } else {
        e.into()
    }
}

/// Optional (year, branch, section) filter for student listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassFilter {
    pub year_id: Option<i64>,
    pub branch_id: Option<i64>,
    pub section_id: Option<i64>,
}

impl ClassFilter {
    pub fn matches(&self, s: &StudentProfile) -> bool {
        self.year_id.map_or(true, |v| v == s.year_id)
            && self.branch_id.map_or(true, |v| v == s.branch_id)
            && self.section_id.map_or(true, |v| v == s.section_id)
    }

    /// Build the WHERE fragment and its bound values
    fn clause(&self) -> (String, Vec<i64>) {
        let mut parts = Vec::new();
        let mut values = Vec::new();
        for (column, value) in [
            ("year_id", self.year_id),
            ("branch_id", self.branch_id),
            ("sec_id", self.section_id),
        ] {
            if let Some(v) = value {
                parts.push(format!("{} = ?", column));
                values.push(v);
            }
        }
        if parts.is_empty() {
            ("1 = 1".to_string(), values)
        } else {
            (parts.join(" AND "), values)
        }
    }
}

impl Database {
    // ==================== Students ====================

    pub fn insert_student(&self, s: &StudentProfile) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO students ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    STUDENT_COLUMNS
                ),
                params![
                    s.student_id,
                    s.first_name,
                    s.last_name,
                    s.email,
                    s.gender,
                    s.year_id,
                    s.branch_id,
                    s.section_id,
                    s.roll_no,
                    s.phone_no,
                    s.ssc_marks,
                    s.inter_marks,
                    s.password_hash,
                ],
            )
            .map_err(|e| conflict_or(e, || format!("student {} already exists", s.student_id)))?;
        Ok(())
    }

    pub fn student_exists(&self, student_id: i64) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM students WHERE student_id = ?1",
                [student_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_student(&self, student_id: i64) -> Result<Option<StudentProfile>> {
        let sql = format!("SELECT {} FROM students WHERE student_id = ?1", STUDENT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [student_id], student_from_row)
            .optional()?)
    }

    pub fn get_student_by_email(&self, email: &str) -> Result<Option<StudentProfile>> {
        let sql = format!("SELECT {} FROM students WHERE email = ?1", STUDENT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [email], student_from_row)
            .optional()?)
    }

    /// Students matching the filter, ordered by id, at most `limit` rows
    pub fn list_students(&self, filter: ClassFilter, limit: Option<usize>) -> Result<Vec<StudentProfile>> {
        let (clause, values) = filter.clause();
        let mut sql = format!(
            "SELECT {} FROM students WHERE {} ORDER BY student_id",
            STUDENT_COLUMNS, clause
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), student_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Students in any of the given classes
    pub fn list_students_in_classes(&self, classes: &[ClassSection]) -> Result<Vec<StudentProfile>> {
        let mut students = Vec::new();
        let sql = format!(
            "SELECT {} FROM students WHERE year_id = ?1 AND branch_id = ?2 AND sec_id = ?3 ORDER BY student_id",
            STUDENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        for class in classes {
            let rows = stmt.query_map(
                params![class.year_id, class.branch_id, class.section_id],
                student_from_row,
            )?;
            for row in rows {
                students.push(row?);
            }
        }
        students.sort_by_key(|s| s.student_id);
        students.dedup_by_key(|s| s.student_id);
        Ok(students)
    }

    pub fn count_students(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    // ==================== Faculty ====================

    pub fn insert_faculty(&self, f: &FacultyProfile) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO faculty ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    FACULTY_COLUMNS
                ),
                params![
                    f.faculty_id,
                    f.first_name,
                    f.last_name,
                    f.email,
                    f.gender,
                    f.department,
                    f.designation,
                    f.qualifications,
                    f.password_hash,
                ],
            )
            .map_err(|e| conflict_or(e, || format!("faculty {} already exists", f.faculty_id)))?;
        Ok(())
    }

    pub fn get_faculty(&self, faculty_id: i64) -> Result<Option<FacultyProfile>> {
        let sql = format!("SELECT {} FROM faculty WHERE faculty_id = ?1", FACULTY_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [faculty_id], faculty_from_row)
            .optional()?)
    }

    pub fn get_faculty_by_email(&self, email: &str) -> Result<Option<FacultyProfile>> {
        let sql = format!("SELECT {} FROM faculty WHERE email = ?1", FACULTY_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [email], faculty_from_row)
            .optional()?)
    }

    pub fn list_faculty(&self, limit: Option<usize>) -> Result<Vec<FacultyProfile>> {
        let mut sql = format!("SELECT {} FROM faculty ORDER BY faculty_id", FACULTY_COLUMNS);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], faculty_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_faculty(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM faculty", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    // ==================== Staff ====================

    pub fn insert_staff(&self, s: &StaffProfile) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO staff ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    STAFF_COLUMNS
                ),
                params![
                    s.role,
                    s.emp_id,
                    s.first_name,
                    s.last_name,
                    s.email,
                    s.gender,
                    s.designation,
                    s.password_hash,
                ],
            )
            .map_err(|e| {
                conflict_or(e, || format!("{} employee {} already exists", s.role, s.emp_id))
            })?;
        Ok(())
    }

    pub fn get_staff(&self, role: Role, emp_id: i64) -> Result<Option<StaffProfile>> {
        let sql = format!(
            "SELECT {} FROM staff WHERE role = ?1 AND emp_id = ?2",
            STAFF_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![role, emp_id], staff_from_row)
            .optional()?)
    }

    pub fn get_staff_by_email(&self, role: Role, email: &str) -> Result<Option<StaffProfile>> {
        let sql = format!(
            "SELECT {} FROM staff WHERE role = ?1 AND email = ?2",
            STAFF_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![role, email], staff_from_row)
            .optional()?)
    }

    // ==================== Any role ====================

    /// Look up the profile table for `role` by email
    pub fn find_profile_by_email(&self, role: Role, email: &str) -> Result<Option<Profile>> {
        Ok(match role {
            Role::Student => self.get_student_by_email(email)?.map(Profile::Student),
            Role::Faculty => self.get_faculty_by_email(email)?.map(Profile::Faculty),
            Role::Management | Role::Placement => {
                self.get_staff_by_email(role, email)?.map(Profile::Staff)
            }
            Role::Admin => None,
        })
    }

    /// Look up a profile by its composite key
    pub fn find_profile_by_key(&self, key: ProfileKey) -> Result<Option<Profile>> {
        Ok(match key.role {
            Role::Student => self.get_student(key.id)?.map(Profile::Student),
            Role::Faculty => self.get_faculty(key.id)?.map(Profile::Faculty),
            Role::Management | Role::Placement => {
                self.get_staff(key.role, key.id)?.map(Profile::Staff)
            }
            Role::Admin => None,
        })
    }

    /// Every profile key with its stored password hash
    pub fn list_profile_hashes(&self) -> Result<Vec<(ProfileKey, String)>> {
        let mut out = Vec::new();

        let mut stmt = self
            .conn
            .prepare("SELECT student_id, password_hash FROM students")?;
        for row in stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))? {
            let (id, hash) = row?;
            out.push((ProfileKey::new(Role::Student, id), hash));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT faculty_id, password_hash FROM faculty")?;
        for row in stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))? {
            let (id, hash) = row?;
            out.push((ProfileKey::new(Role::Faculty, id), hash));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT role, emp_id, password_hash FROM staff")?;
        for row in stmt.query_map([], |r| {
            Ok((r.get::<_, Role>(0)?, r.get::<_, i64>(1)?, r.get::<_, String>(2)?))
        })? {
            let (role, id, hash) = row?;
            out.push((ProfileKey::new(role, id), hash));
        }

        Ok(out)
    }

    pub fn set_profile_password_hash(&self, key: ProfileKey, hash: &str) -> Result<()> {
        match key.role {
            Role::Student => self.conn.execute(
                "UPDATE students SET password_hash = ?1 WHERE student_id = ?2",
                params![hash, key.id],
            )?,
            Role::Faculty => self.conn.execute(
                "UPDATE faculty SET password_hash = ?1 WHERE faculty_id = ?2",
                params![hash, key.id],
            )?,
            Role::Management | Role::Placement => self.conn.execute(
                "UPDATE staff SET password_hash = ?1 WHERE role = ?2 AND emp_id = ?3",
                params![hash, key.role, key.id],
            )?,
            Role::Admin => 0,
        };
        Ok(())
    }

    // ==================== Faculty courses ====================

    /// Record that a faculty member teaches a course to a class.
    /// Returns false when the row already existed.
    pub fn insert_faculty_course(&self, c: &FacultyCourse) -> Result<bool> {
        let n = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO faculty_courses (
                faculty_id, year_id, branch_id, section_id, course_id
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![c.faculty_id, c.year_id, c.branch_id, c.section_id, c.course_id],
        )?;
        Ok(n > 0)
    }

    pub fn list_faculty_courses(&self, faculty_id: i64) -> Result<Vec<FacultyCourse>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT faculty_id, year_id, branch_id, section_id, course_id
            FROM faculty_courses WHERE faculty_id = ?1
            ORDER BY year_id, branch_id, section_id, course_id
            "#,
        )?;
        let rows = stmt.query_map([faculty_id], faculty_course_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Courses taught to a class, one per course id
    pub fn list_courses_for_class(&self, class: ClassSection) -> Result<Vec<FacultyCourse>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT MIN(faculty_id), year_id, branch_id, section_id, course_id
            FROM faculty_courses
            WHERE year_id = ?1 AND branch_id = ?2 AND section_id = ?3
            GROUP BY course_id
            ORDER BY course_id
            "#,
        )?;
        let rows = stmt.query_map(
            params![class.year_id, class.branch_id, class.section_id],
            faculty_course_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Whether `faculty_id` teaches `course_id` to `class`
    pub fn faculty_teaches(&self, faculty_id: i64, course_id: &str, class: ClassSection) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                r#"
                SELECT 1 FROM faculty_courses
                WHERE faculty_id = ?1 AND course_id = ?2
                  AND year_id = ?3 AND branch_id = ?4 AND section_id = ?5
                "#,
                params![faculty_id, course_id, class.year_id, class.branch_id, class.section_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn faculty_course_from_row(row: &Row<'_>) -> rusqlite::Result<FacultyCourse> {
    Ok(FacultyCourse {
        faculty_id: row.get(0)?,
        year_id: row.get(1)?,
        branch_id: row.get(2)?,
        section_id: row.get(3)?,
        course_id: row.get(4)?,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn student(id: i64, year: i64, branch: i64, section: i64) -> StudentProfile {
        StudentProfile {
            student_id: id,
            first_name: "Student".to_string(),
            last_name: format!("No{}", id),
            email: format!("student{}@college.edu", id),
            gender: "F".to_string(),
            year_id: year,
            branch_id: branch,
            section_id: section,
            roll_no: id,
            phone_no: "9000000000".to_string(),
            ssc_marks: Some(91.5),
            inter_marks: None,
            password_hash: "plain".to_string(),
        }
    }

    pub fn faculty(id: i64) -> FacultyProfile {
        FacultyProfile {
            faculty_id: id,
            first_name: "Faculty".to_string(),
            last_name: format!("No{}", id),
            email: format!("faculty{}@college.edu", id),
            gender: "M".to_string(),
            department: "CSE".to_string(),
            designation: "Assistant Professor".to_string(),
            qualifications: "M.Tech".to_string(),
            password_hash: "plain".to_string(),
        }
    }

    pub fn staff(role: Role, id: i64) -> StaffProfile {
        StaffProfile {
            role,
            emp_id: id,
            first_name: "Staff".to_string(),
            last_name: format!("No{}", id),
            email: format!("{}{}@college.edu", role, id),
            gender: "F".to_string(),
            designation: "Officer".to_string(),
            password_hash: "plain".to_string(),
        }
    }

    pub fn course(faculty_id: i64, class: (i64, i64, i64), course_id: &str) -> FacultyCourse {
        FacultyCourse {
            faculty_id,
            year_id: class.0,
            branch_id: class.1,
            section_id: class.2,
            course_id: course_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_student_roundtrip_and_filters() {
        let db = Database::open_in_memory().unwrap();
        db.insert_student(&student(1, 2, 1, 1)).unwrap();
        db.insert_student(&student(2, 2, 1, 2)).unwrap();
        db.insert_student(&student(3, 3, 1, 1)).unwrap();

        let s = db.get_student_by_email("student1@college.edu").unwrap().unwrap();
        assert_eq!(s.student_id, 1);
        assert_eq!(s.ssc_marks, Some(91.5));

        let year2 = db
            .list_students(
                ClassFilter {
                    year_id: Some(2),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(year2.len(), 2);

        let limited = db.list_students(ClassFilter::default(), Some(1)).unwrap();
        assert_eq!(limited.len(), 1);

        let err = db.insert_student(&student(1, 1, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_staff_tables_share_id_space_safely() {
        let db = Database::open_in_memory().unwrap();
        db.insert_staff(&staff(Role::Management, 1)).unwrap();
        db.insert_staff(&staff(Role::Placement, 1)).unwrap();

        let m = db.get_staff(Role::Management, 1).unwrap().unwrap();
        let p = db.get_staff(Role::Placement, 1).unwrap().unwrap();
        assert_eq!(m.email, "management1@college.edu");
        assert_eq!(p.email, "placement1@college.edu");
    }

    #[test]
    fn test_courses_for_class() {
        let db = Database::open_in_memory().unwrap();
        db.insert_faculty(&faculty(10)).unwrap();
        db.insert_faculty(&faculty(11)).unwrap();
        assert!(db.insert_faculty_course(&course(10, (2, 1, 1), "CS201")).unwrap());
        assert!(!db.insert_faculty_course(&course(10, (2, 1, 1), "CS201")).unwrap());
        db.insert_faculty_course(&course(11, (2, 1, 1), "CS202")).unwrap();
        db.insert_faculty_course(&course(11, (3, 1, 1), "CS301")).unwrap();

        let courses = db.list_courses_for_class(ClassSection::new(2, 1, 1)).unwrap();
        let ids: Vec<_> = courses.iter().map(|c| c.course_id.as_str()).collect();
        assert_eq!(ids, vec!["CS201", "CS202"]);

        assert!(db.faculty_teaches(10, "CS201", ClassSection::new(2, 1, 1)).unwrap());
        assert!(!db.faculty_teaches(10, "CS201", ClassSection::new(3, 1, 1)).unwrap());
    }
}

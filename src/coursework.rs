//! Coursework submission and grading
//!
//! An assignment row moves `not_submitted -> submitted -> graded`. The status
//! is never stored; it is derived from the file reference, marks and grading
//! time on every read. Grading emits a notification to the student in the
//! same transaction as the marks update.

use crate::error::{Error, Result};
use crate::model::{
    Assignment, AssignmentStatus, Audience, FacultyProfile, NewNotification, Priority,
    StudentProfile,
};
use crate::storage::{now, Database, GradingOverview, GradingQueue};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Notification kind emitted when marks are awarded
pub const GRADED_NOTIFICATION: &str = "assignment_graded";

/// Assignment as listed to students and faculty
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    pub assignment_id: i64,
    pub course_id: String,
    pub faculty_id: i64,
    pub faculty_name: String,
    pub faculty_email: String,
    pub student_id: i64,
    pub student_name: String,
    pub student_roll_no: i64,
    pub year_id: i64,
    pub branch_id: i64,
    pub section_id: i64,
    pub status: AssignmentStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub file_name: Option<String>,
    /// KiB
    pub file_size: Option<f64>,
    pub marks_awarded: Option<i64>,
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One dashboard card per course taught to the student's class
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentCard {
    /// `None` until the student creates the record
    pub assignment_id: Option<i64>,
    pub course_id: String,
    pub faculty_id: i64,
    pub faculty_name: String,
    pub faculty_email: String,
    pub status: AssignmentStatus,
    pub is_submitted: bool,
    pub is_graded: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub marks_awarded: Option<i64>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadInfo {
    pub download_url: String,
    pub file_name: String,
    /// KiB
    pub file_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_roll_no: Option<i64>,
}

/// On-disk storage for uploaded files
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `assignments/YYYY/MM/DD/` and return the stored
    /// path relative to the root. An existing name gets a random suffix.
    pub fn save(&self, file_name: &str, bytes: &[u8], at: DateTime<Utc>) -> Result<String> {
        let dir = format!(
            "assignments/{:04}/{:02}/{:02}",
            at.year(),
            at.month(),
            at.day()
        );
        std::fs::create_dir_all(self.root.join(&dir))?;

        let stem = file_stem(file_name);
        let mut relative = format!("{}/{}.pdf", dir, stem);
        if self.root.join(&relative).exists() {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            relative = format!("{}/{}_{}.pdf", dir, stem, &suffix[..7]);
        }

        std::fs::write(self.root.join(&relative), bytes)?;
        debug!("stored {} bytes at {}", bytes.len(), relative);
        Ok(relative)
    }

    pub fn url(&self, relative: &str) -> String {
        format!("/media/{}", relative)
    }
}

/// Keep the final path component, drop a `.pdf` extension in any case and
/// replace anything outside `[A-Za-z0-9._-]`
fn file_stem(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let base = match base.get(base.len().saturating_sub(4)..) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => &base[..base.len() - 4],
        _ => base,
    };
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "assignment".to_string()
    } else {
        cleaned.to_string()
    }
}

fn describe(db: &Database, a: &Assignment) -> Result<AssignmentView> {
    let faculty = db
        .get_faculty(a.faculty_id)?
        .ok_or_else(|| Error::not_found("Faculty not found"))?;
    let student = db
        .get_student(a.student_id)?
        .ok_or_else(|| Error::not_found("Student not found"))?;

    Ok(AssignmentView {
        assignment_id: a.assignment_id,
        course_id: a.course_id.clone(),
        faculty_id: a.faculty_id,
        faculty_name: faculty.full_name(),
        faculty_email: faculty.email,
        student_id: a.student_id,
        student_name: student.full_name(),
        student_roll_no: student.roll_no,
        year_id: a.year_id,
        branch_id: a.branch_id,
        section_id: a.section_id,
        status: a.status(),
        submitted_at: a.submitted_at,
        file_name: a.file_name().map(str::to_string),
        file_size: a.file_size_kb(),
        marks_awarded: a.marks,
        graded_at: a.graded_at,
        created_at: a.created_at,
        updated_at: a.updated_at,
    })
}

fn card(a: &Assignment, faculty: &FacultyProfile) -> AssignmentCard {
    AssignmentCard {
        assignment_id: Some(a.assignment_id),
        course_id: a.course_id.clone(),
        faculty_id: faculty.faculty_id,
        faculty_name: faculty.full_name(),
        faculty_email: faculty.email.clone(),
        status: a.status(),
        is_submitted: a.is_submitted(),
        is_graded: a.is_graded(),
        submitted_at: a.submitted_at,
        marks_awarded: a.marks,
        graded_at: a.graded_at,
    }
}

fn owned_by_student(db: &Database, student: &StudentProfile, id: i64) -> Result<Assignment> {
    db.get_assignment(id)?
        .filter(|a| a.student_id == student.student_id)
        .ok_or_else(|| Error::not_found("Assignment not found"))
}

fn owned_by_faculty(db: &Database, faculty: &FacultyProfile, id: i64) -> Result<Assignment> {
    db.get_assignment(id)?
        .filter(|a| a.faculty_id == faculty.faculty_id)
        .ok_or_else(|| Error::not_found("Assignment not found"))
}

// ==================== Student side ====================

/// Create the (student, faculty, course) record unless it exists.
/// The faculty member must teach the course to the student's class.
pub fn create_if_missing(
    db: &Database,
    student: &StudentProfile,
    faculty_id: i64,
    course_id: &str,
) -> Result<(AssignmentCard, bool)> {
    let faculty = db
        .get_faculty(faculty_id)?
        .ok_or_else(|| Error::not_found("Faculty not found"))?;

    if !db.faculty_teaches(faculty_id, course_id, student.class())? {
        return Err(Error::validation(
            "This faculty has not assigned this course to your section",
        ));
    }

    let (id, created) =
        db.insert_assignment_if_missing(student.student_id, faculty_id, course_id, student.class())?;
    let assignment = db
        .get_assignment(id)?
        .ok_or_else(|| Error::not_found("Assignment not found"))?;

    if created {
        info!(
            "created assignment {} for student {} ({})",
            id, student.student_id, course_id
        );
    }
    Ok((card(&assignment, &faculty), created))
}

/// Store a PDF for the student's assignment. Re-uploads replace the file
/// and leave `submitted_at`, marks and `graded_at` as they were.
pub fn upload(
    db: &Database,
    store: &FileStore,
    student: &StudentProfile,
    assignment_id: i64,
    file_name: &str,
    bytes: &[u8],
) -> Result<AssignmentView> {
    let assignment = db
        .get_assignment(assignment_id)?
        .filter(|a| a.student_id == student.student_id)
        .ok_or_else(|| {
            Error::not_found("Assignment not found. Please ensure faculty has assigned this course.")
        })?;

    if bytes.is_empty() {
        return Err(Error::validation("No file was submitted"));
    }
    if !file_name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(Error::validation("Only PDF files are accepted"));
    }

    let relative = store.save(file_name, bytes, now())?;
    db.record_submission(assignment.assignment_id, &relative, bytes.len() as i64)?;
    info!(
        "student {} uploaded assignment {}",
        student.student_id, assignment_id
    );

    let updated = owned_by_student(db, student, assignment_id)?;
    describe(db, &updated)
}

/// The student's assignment records, newest first
pub fn student_assignments(db: &Database, student: &StudentProfile) -> Result<Vec<AssignmentView>> {
    db.list_student_assignments(student.student_id)?
        .iter()
        .map(|a| describe(db, a))
        .collect()
}

/// One card per course taught to the student's class. Missing records are
/// shown as placeholders and are not created.
pub fn student_cards(db: &Database, student: &StudentProfile) -> Result<Vec<AssignmentCard>> {
    let mut cards = Vec::new();

    for course in db.list_courses_for_class(student.class())? {
        let Some(faculty) = db.get_faculty(course.faculty_id)? else {
            continue;
        };

        match db.find_assignment(student.student_id, faculty.faculty_id, &course.course_id)? {
            Some(a) => cards.push(card(&a, &faculty)),
            None => cards.push(AssignmentCard {
                assignment_id: None,
                course_id: course.course_id.clone(),
                faculty_id: faculty.faculty_id,
                faculty_name: faculty.full_name(),
                faculty_email: faculty.email.clone(),
                status: AssignmentStatus::NotSubmitted,
                is_submitted: false,
                is_graded: false,
                submitted_at: None,
                marks_awarded: None,
                graded_at: None,
            }),
        }
    }

    Ok(cards)
}

pub fn student_assignment(db: &Database, student: &StudentProfile, id: i64) -> Result<AssignmentView> {
    describe(db, &owned_by_student(db, student, id)?)
}

pub fn student_download(
    db: &Database,
    store: &FileStore,
    student: &StudentProfile,
    id: i64,
) -> Result<DownloadInfo> {
    let a = owned_by_student(db, student, id)?;
    let (Some(relative), Some(name)) = (a.pdf_ref.as_deref(), a.file_name()) else {
        return Err(Error::not_found("No file uploaded"));
    };

    Ok(DownloadInfo {
        download_url: store.url(relative),
        file_name: name.to_string(),
        file_size: a.file_size_kb(),
        student_name: None,
        student_roll_no: None,
    })
}

// ==================== Faculty side ====================

/// Award marks and notify the student. Marks must be within `[0, 10]` and
/// the assignment must have a file; `graded_at` is only set the first time.
pub fn grade(
    db: &Database,
    faculty: &FacultyProfile,
    assignment_id: i64,
    marks: Option<i64>,
) -> Result<AssignmentView> {
    let assignment = owned_by_faculty(db, faculty, assignment_id)?;

    let Some(marks) = marks else {
        return Err(Error::validation("marks_awarded is required"));
    };
    if !(Assignment::MIN_MARKS..=Assignment::MAX_MARKS).contains(&marks) {
        return Err(Error::validation("Marks must be between 0 and 10"));
    }
    if assignment.pdf_ref.is_none() {
        return Err(Error::validation("Cannot grade an assignment with no submitted file"));
    }

    let student = db
        .get_student(assignment.student_id)?
        .ok_or_else(|| Error::not_found("Student not found"))?;

    db.in_transaction(|db| {
        let at = now();
        db.record_grade(assignment_id, marks, at)?;
        db.insert_notification(&NewNotification {
            audience: Audience::student(&student),
            semester_id: None,
            notification_type: GRADED_NOTIFICATION.to_string(),
            title: format!("Assignment Graded - {}", assignment.course_id),
            description: format!(
                "Your assignment for {} has been graded. Marks: {}/10",
                assignment.course_id, marks
            ),
            due_date: at.date_naive(),
            priority: Priority::Medium,
        })?;
        Ok(())
    })?;

    info!(
        "faculty {} graded assignment {} with {}/10",
        faculty.faculty_id, assignment_id, marks
    );
    describe(db, &owned_by_faculty(db, faculty, assignment_id)?)
}

pub fn faculty_overview(db: &Database, faculty: &FacultyProfile) -> Result<GradingOverview> {
    db.grading_overview(faculty.faculty_id)
}

pub fn faculty_queue(
    db: &Database,
    faculty: &FacultyProfile,
    queue: GradingQueue,
) -> Result<Vec<AssignmentView>> {
    db.list_faculty_assignments(faculty.faculty_id, queue)?
        .iter()
        .map(|a| describe(db, a))
        .collect()
}

pub fn faculty_assignment(db: &Database, faculty: &FacultyProfile, id: i64) -> Result<AssignmentView> {
    describe(db, &owned_by_faculty(db, faculty, id)?)
}

pub fn faculty_download(
    db: &Database,
    store: &FileStore,
    faculty: &FacultyProfile,
    id: i64,
) -> Result<DownloadInfo> {
    let a = owned_by_faculty(db, faculty, id)?;
    let (Some(relative), Some(name)) = (a.pdf_ref.as_deref(), a.file_name()) else {
        return Err(Error::not_found("No file submitted"));
    };
    let student = db
        .get_student(a.student_id)?
        .ok_or_else(|| Error::not_found("Student not found"))?;

    Ok(DownloadInfo {
        download_url: store.url(relative),
        file_name: name.to_string(),
        file_size: a.file_size_kb(),
        student_name: Some(student.full_name()),
        student_roll_no: Some(student.roll_no),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fixtures::*;

    struct Setup {
        db: Database,
        store: FileStore,
        _dir: tempfile::TempDir,
        student: StudentProfile,
        faculty: FacultyProfile,
    }

    fn setup() -> Setup {
        let db = Database::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let student = student(1, 2, 1, 1);
        let faculty = faculty(10);
        db.insert_student(&student).unwrap();
        db.insert_faculty(&faculty).unwrap();
        db.insert_faculty_course(&course(10, (2, 1, 1), "CS201")).unwrap();
        db.insert_faculty_course(&course(10, (2, 1, 1), "CS202")).unwrap();
        Setup {
            db,
            store: FileStore::new(dir.path()),
            _dir: dir,
            student,
            faculty,
        }
    }

    fn submitted(s: &Setup) -> i64 {
        let (card, _) = create_if_missing(&s.db, &s.student, 10, "CS201").unwrap();
        let id = card.assignment_id.unwrap();
        upload(&s.db, &s.store, &s.student, id, "essay.pdf", b"%PDF-1.4").unwrap();
        id
    }

    #[test]
    fn test_create_requires_teaching_relation() {
        let s = setup();
        let err = create_if_missing(&s.db, &s.student, 10, "CS999").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = create_if_missing(&s.db, &s.student, 77, "CS201").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let (first, created) = create_if_missing(&s.db, &s.student, 10, "CS201").unwrap();
        assert!(created);
        assert_eq!(first.status, AssignmentStatus::NotSubmitted);
        let (second, created) = create_if_missing(&s.db, &s.student, 10, "CS201").unwrap();
        assert!(!created);
        assert_eq!(first.assignment_id, second.assignment_id);
    }

    #[test]
    fn test_upload_moves_to_submitted() {
        let s = setup();
        let id = submitted(&s);

        let view = student_assignment(&s.db, &s.student, id).unwrap();
        assert_eq!(view.status, AssignmentStatus::Submitted);
        assert_eq!(view.file_name.as_deref(), Some("essay.pdf"));
        assert!(view.submitted_at.is_some());

        let download = student_download(&s.db, &s.store, &s.student, id).unwrap();
        assert!(download.download_url.starts_with("/media/assignments/"));
    }

    #[test]
    fn test_upload_validation() {
        let s = setup();
        let (card, _) = create_if_missing(&s.db, &s.student, 10, "CS201").unwrap();
        let id = card.assignment_id.unwrap();

        let err = upload(&s.db, &s.store, &s.student, id, "essay.docx", b"data").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = upload(&s.db, &s.store, &s.student, id, "essay.pdf", b"").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let other = student(2, 2, 1, 1);
        s.db.insert_student(&other).unwrap();
        let err = upload(&s.db, &s.store, &other, id, "essay.pdf", b"x").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_grade_emits_notification() {
        let s = setup();
        let id = submitted(&s);

        let view = grade(&s.db, &s.faculty, id, Some(7)).unwrap();
        assert_eq!(view.status, AssignmentStatus::Graded);
        assert_eq!(view.marks_awarded, Some(7));

        let notes = s.db.list_notifications_for_student(&s.student).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].notification_type, GRADED_NOTIFICATION);
        assert_eq!(notes[0].title, "Assignment Graded - CS201");
        assert!(notes[0].description.ends_with("Marks: 7/10"));
        assert_eq!(notes[0].audience.student_id, 1);
        assert_eq!(notes[0].priority, Priority::Medium);
    }

    #[test]
    fn test_out_of_range_marks_change_nothing() {
        let s = setup();
        let id = submitted(&s);

        for marks in [Some(-1), Some(11), None] {
            let err = grade(&s.db, &s.faculty, id, marks).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        let a = s.db.get_assignment(id).unwrap().unwrap();
        assert_eq!(a.status(), AssignmentStatus::Submitted);
        assert!(s.db.list_notifications_for_student(&s.student).unwrap().is_empty());
    }

    #[test]
    fn test_grade_requires_ownership_and_file() {
        let s = setup();
        let (card, _) = create_if_missing(&s.db, &s.student, 10, "CS202").unwrap();
        let id = card.assignment_id.unwrap();
        let err = grade(&s.db, &s.faculty, id, Some(5)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let stranger = faculty(11);
        s.db.insert_faculty(&stranger).unwrap();
        let err = grade(&s.db, &stranger, id, Some(5)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_regrade_keeps_first_graded_at_and_reupload_keeps_marks() {
        let s = setup();
        let id = submitted(&s);
        let first = grade(&s.db, &s.faculty, id, Some(4)).unwrap();
        let second = grade(&s.db, &s.faculty, id, Some(9)).unwrap();
        assert_eq!(first.graded_at, second.graded_at);
        assert_eq!(second.marks_awarded, Some(9));

        let after = upload(&s.db, &s.store, &s.student, id, "essay.pdf", b"%PDF-2").unwrap();
        assert_eq!(after.status, AssignmentStatus::Graded);
        assert_eq!(after.marks_awarded, Some(9));
        // name collision gets a suffix
        assert_ne!(after.file_name.as_deref(), Some("essay.pdf"));
    }

    #[test]
    fn test_cards_do_not_create_rows() {
        let s = setup();
        create_if_missing(&s.db, &s.student, 10, "CS201").unwrap();

        let cards = student_cards(&s.db, &s.student).unwrap();
        assert_eq!(cards.len(), 2);
        assert!(cards[0].assignment_id.is_some());
        assert!(cards[1].assignment_id.is_none());
        assert_eq!(cards[1].status, AssignmentStatus::NotSubmitted);
        assert_eq!(s.db.get_stats().unwrap().assignments, 1);
    }

    #[test]
    fn test_faculty_queues() {
        let s = setup();
        let id = submitted(&s);
        create_if_missing(&s.db, &s.student, 10, "CS202").unwrap();

        assert_eq!(faculty_queue(&s.db, &s.faculty, GradingQueue::Pending).unwrap().len(), 1);
        grade(&s.db, &s.faculty, id, Some(8)).unwrap();
        assert!(faculty_queue(&s.db, &s.faculty, GradingQueue::Pending).unwrap().is_empty());
        assert_eq!(faculty_queue(&s.db, &s.faculty, GradingQueue::Graded).unwrap().len(), 1);

        let overview = faculty_overview(&s.db, &s.faculty).unwrap();
        assert_eq!(overview.total_assignments, 2);
        assert_eq!(overview.graded, 1);

        let download = faculty_download(&s.db, &s.store, &s.faculty, id).unwrap();
        assert_eq!(download.student_roll_no, Some(1));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("../../etc/passwd.pdf"), "passwd");
        assert_eq!(file_stem("my essay (final).pdf"), "my_essay__final_");
        assert_eq!(file_stem("Essay.PDF"), "Essay");
        assert_eq!(file_stem("..pdf"), "assignment");
        assert_eq!(file_stem(""), "assignment");
    }

    #[test]
    fn test_store_names_always_end_in_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let at = Utc::now();

        let first = store.save("Essay.PDF", b"a", at).unwrap();
        assert!(first.ends_with("/Essay.pdf"));
        let second = store.save("essay.Pdf", b"b", at).unwrap();
        assert!(second.ends_with(".pdf"));
        assert!(!second.contains(".Pdf"));
        let odd = store.save("..pdf", b"c", at).unwrap();
        assert!(odd.ends_with("/assignment.pdf"));
    }
}

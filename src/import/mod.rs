//! CSV bulk import
//!
//! Each kind has a fixed column set. Rows are processed strictly in file
//! order and committed in batches; a row whose key already exists is skipped,
//! so running the same file twice inserts nothing the second time. Every row
//! ends in a [`RowOutcome`] which is folded into an [`ImportReport`].

mod rows;

use crate::auth::hash_password;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::model::{
    AcademicRecord, AttendanceRecord, Backlog, ExamMark, FacultyCourse, FacultyProfile, FeeRecord,
    NewAccount, Role, StaffProfile, StudentProfile,
};
use crate::storage::Database;
use rows::{Columns, CsvRow, FieldResult};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// What a CSV file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    Students,
    Faculty,
    Management,
    Placement,
    FacultyCourses,
    Academics,
    Backlogs,
    Fees,
    ExamMarks,
    Attendance,
}

impl ImportKind {
    /// Columns that must be present in the header row
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ImportKind::Students => &[
                "student_id", "first_name", "last_name", "email", "gender", "year_id",
                "branch_id", "sec_id", "roll_no", "phone_no", "passcode",
            ],
            ImportKind::Faculty => &[
                "faculty_id", "first_name", "last_name", "email", "gender", "department",
                "designation", "passcode",
            ],
            ImportKind::Management | ImportKind::Placement => &[
                "emp_id", "first_name", "last_name", "email", "gender", "designation",
                "passcode",
            ],
            ImportKind::FacultyCourses => {
                &["faculty_id", "year_id", "branch_id", "section_id", "course_id"]
            }
            ImportKind::Academics => {
                &["student_id", "semester_id", "course_code", "attendance"]
            }
            ImportKind::Backlogs => &["student_id", "semester_id", "course_id"],
            ImportKind::Fees => &["student_id", "mode_of_admission", "fee_total", "paid_amount"],
            ImportKind::ExamMarks => &[
                "student_id", "year_id", "branch_id", "section_id", "semester_id", "mid_id",
                "course_id", "mid_marks", "quiz_marks", "assignment_marks",
            ],
            ImportKind::Attendance => {
                &["student_id", "year_id", "branch_id", "sec_id", "sem_id", "course_id"]
            }
        }
    }
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ImportKind::Students => "students",
            ImportKind::Faculty => "faculty",
            ImportKind::Management => "management",
            ImportKind::Placement => "placement",
            ImportKind::FacultyCourses => "faculty-courses",
            ImportKind::Academics => "academics",
            ImportKind::Backlogs => "backlogs",
            ImportKind::Fees => "fees",
            ImportKind::ExamMarks => "exam-marks",
            ImportKind::Attendance => "attendance",
        };
        write!(f, "{}", name)
    }
}

/// Result of one data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    /// Key already present
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based line in the file
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub kind: ImportKind,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: Vec<RowFailure>,
}

impl ImportReport {
    fn new(kind: ImportKind) -> Self {
        Self {
            kind,
            inserted: 0,
            skipped: 0,
            failed: Vec::new(),
        }
    }

    fn record(&mut self, line: u64, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::Failed(reason) => {
                debug!("line {}: {}", line, reason);
                self.failed.push(RowFailure { line, reason });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.failed.len()
    }
}

/// Loads CSV files into the database
pub struct Importer<'a> {
    db: &'a Database,
    batch_size: usize,
    hash_iterations: u32,
}

impl<'a> Importer<'a> {
    pub fn new(db: &'a Database, config: &AppConfig) -> Self {
        Self::with_options(db, config.import.batch_size, config.auth.hash_iterations)
    }

    pub fn with_options(db: &'a Database, batch_size: usize, hash_iterations: u32) -> Self {
        Self {
            db,
            batch_size: batch_size.max(1),
            hash_iterations,
        }
    }

    /// Import a CSV file from disk
    pub fn run_file(&self, kind: ImportKind, path: &Path) -> Result<ImportReport> {
        info!("importing {} from {:?}", kind, path);
        let file = std::fs::File::open(path)?;
        self.run(kind, file)
    }

    /// Import CSV data from any reader. Header problems fail the whole run;
    /// row problems are reported per row.
    pub fn run<R: Read>(&self, kind: ImportKind, reader: R) -> Result<ImportReport> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| Error::validation(format!("cannot read CSV header: {}", e)))?
            .clone();
        let columns = Columns::new(&headers);
        let missing = columns.missing(kind.required_columns());
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "{} import is missing column(s): {}",
                kind,
                missing.join(", ")
            )));
        }

        let mut report = ImportReport::new(kind);
        let mut batch = Vec::with_capacity(self.batch_size);

        for record in csv.records() {
            match record {
                Ok(record) => {
                    batch.push(record);
                    if batch.len() >= self.batch_size {
                        self.flush(kind, &columns, &mut batch, &mut report)?;
                    }
                }
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    report.record(line, RowOutcome::Failed(format!("unreadable row: {}", e)));
                }
            }
        }
        self.flush(kind, &columns, &mut batch, &mut report)?;

        if report.failed.is_empty() {
            info!(
                "{} import: {} inserted, {} skipped",
                kind, report.inserted, report.skipped
            );
        } else {
            warn!(
                "{} import: {} inserted, {} skipped, {} failed",
                kind,
                report.inserted,
                report.skipped,
                report.failed.len()
            );
        }
        Ok(report)
    }

    /// Commit one batch in a single transaction. Each row runs in its own
    /// savepoint so a failing row leaves no partial writes.
    fn flush(
        &self,
        kind: ImportKind,
        columns: &Columns,
        batch: &mut Vec<csv::StringRecord>,
        report: &mut ImportReport,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let outcomes = self.db.in_transaction(|db| {
            let mut outcomes = Vec::with_capacity(batch.len());
            for record in batch.iter() {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                let row = columns.row(record);
                let outcome = match db.in_savepoint(|db| self.import_row(db, kind, &row)) {
                    Ok(outcome) => outcome,
                    Err(e) => RowOutcome::Failed(e.to_string()),
                };
                outcomes.push((line, outcome));
            }
            Ok(outcomes)
        })?;

        for (line, outcome) in outcomes {
            report.record(line, outcome);
        }
        debug!("{} import: committed batch of {}", kind, batch.len());
        batch.clear();
        Ok(())
    }

    /// Parse failures become `Ok(Failed)`; storage errors are returned so
    /// the savepoint rolls the row back.
    fn import_row(&self, db: &Database, kind: ImportKind, row: &CsvRow<'_>) -> Result<RowOutcome> {
        match ParsedRow::parse(kind, row) {
            Ok(parsed) => self.store(db, parsed),
            Err(reason) => Ok(RowOutcome::Failed(reason)),
        }
    }

    fn store(&self, db: &Database, parsed: ParsedRow) -> Result<RowOutcome> {
        match parsed {
            ParsedRow::Student(mut profile, passcode) => {
                if db.student_exists(profile.student_id)? {
                    return Ok(RowOutcome::Skipped);
                }
                profile.password_hash = hash_password(&passcode, self.hash_iterations);
                self.ensure_account(
                    db,
                    profile_account(
                        Role::Student,
                        profile.student_id,
                        &profile.email,
                        &profile.first_name,
                        &profile.last_name,
                        &profile.password_hash,
                    ),
                )?;
                db.insert_student(&profile)?;
            }
            ParsedRow::Faculty(mut profile, passcode) => {
                if db.get_faculty(profile.faculty_id)?.is_some() {
                    return Ok(RowOutcome::Skipped);
                }
                profile.password_hash = hash_password(&passcode, self.hash_iterations);
                self.ensure_account(
                    db,
                    profile_account(
                        Role::Faculty,
                        profile.faculty_id,
                        &profile.email,
                        &profile.first_name,
                        &profile.last_name,
                        &profile.password_hash,
                    ),
                )?;
                db.insert_faculty(&profile)?;
            }
            ParsedRow::Staff(mut profile, passcode) => {
                if db.get_staff(profile.role, profile.emp_id)?.is_some() {
                    return Ok(RowOutcome::Skipped);
                }
                profile.password_hash = hash_password(&passcode, self.hash_iterations);
                self.ensure_account(
                    db,
                    profile_account(
                        profile.role,
                        profile.emp_id,
                        &profile.email,
                        &profile.first_name,
                        &profile.last_name,
                        &profile.password_hash,
                    ),
                )?;
                db.insert_staff(&profile)?;
            }
            ParsedRow::Course(course) => return inserted_or_skipped(db.insert_faculty_course(&course)),
            ParsedRow::Academic(record) => return inserted_or_skipped(db.insert_academic(&record)),
            ParsedRow::Backlog(backlog) => return inserted_or_skipped(db.insert_backlog(&backlog)),
            ParsedRow::Fee(fee) => return inserted_or_skipped(db.insert_fee(&fee)),
            ParsedRow::ExamMark(mark) => return inserted_or_skipped(db.insert_exam_mark(&mark)),
            ParsedRow::Attendance(record) => return inserted_or_skipped(db.insert_attendance(&record)),
        }
        Ok(RowOutcome::Inserted)
    }

    /// Accounts are keyed by email; an existing one is left untouched
    fn ensure_account(&self, db: &Database, account: NewAccount) -> Result<()> {
        if db.account_exists(&account.email)? {
            return Ok(());
        }
        db.insert_account(&account)?;
        Ok(())
    }
}

fn profile_account(role: Role, id: i64, email: &str, first_name: &str, last_name: &str, password_hash: &str) -> NewAccount {
    NewAccount {
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role,
        external_id: Some(id),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    }
}

fn inserted_or_skipped(inserted: Result<bool>) -> Result<RowOutcome> {
    inserted.map(|new| {
        if new {
            RowOutcome::Inserted
        } else {
            RowOutcome::Skipped
        }
    })
}

/// A data row converted to its typed record. Profile rows carry the
/// plain passcode until it is hashed at store time.
enum ParsedRow {
    Student(StudentProfile, String),
    Faculty(FacultyProfile, String),
    Staff(StaffProfile, String),
    Course(FacultyCourse),
    Academic(AcademicRecord),
    Backlog(Backlog),
    Fee(FeeRecord),
    ExamMark(ExamMark),
    Attendance(AttendanceRecord),
}

impl ParsedRow {
    fn parse(kind: ImportKind, row: &CsvRow<'_>) -> FieldResult<Self> {
        Ok(match kind {
            ImportKind::Students => ParsedRow::Student(
                StudentProfile {
                    student_id: row.int("student_id")?,
                    first_name: row.text("first_name")?,
                    last_name: row.opt_text("last_name"),
                    email: row.text("email")?,
                    gender: row.opt_text("gender"),
                    year_id: row.int("year_id")?,
                    branch_id: row.int("branch_id")?,
                    section_id: row.int("sec_id")?,
                    roll_no: row.int("roll_no")?,
                    phone_no: row.code("phone_no").unwrap_or_default(),
                    ssc_marks: row.opt_float("ssc_marks")?,
                    inter_marks: row.opt_float("inter_marks")?,
                    password_hash: String::new(),
                },
                row.code("passcode")?,
            ),
            ImportKind::Faculty => ParsedRow::Faculty(
                FacultyProfile {
                    faculty_id: row.int("faculty_id")?,
                    first_name: row.text("first_name")?,
                    last_name: row.opt_text("last_name"),
                    email: row.text("email")?,
                    gender: row.opt_text("gender"),
                    department: row.opt_text("department"),
                    designation: row.opt_text("designation"),
                    qualifications: row.opt_text("qualifications"),
                    password_hash: String::new(),
                },
                row.code("passcode")?,
            ),
            ImportKind::Management | ImportKind::Placement => ParsedRow::Staff(
                StaffProfile {
                    role: if kind == ImportKind::Management {
                        Role::Management
                    } else {
                        Role::Placement
                    },
                    emp_id: row.int("emp_id")?,
                    first_name: row.text("first_name")?,
                    last_name: row.opt_text("last_name"),
                    email: row.text("email")?,
                    gender: row.opt_text("gender"),
                    designation: row.opt_text("designation"),
                    password_hash: String::new(),
                },
                row.code("passcode")?,
            ),
            ImportKind::FacultyCourses => ParsedRow::Course(FacultyCourse {
                faculty_id: row.int("faculty_id")?,
                year_id: row.int("year_id")?,
                branch_id: row.int("branch_id")?,
                section_id: row.int("section_id")?,
                course_id: row.text("course_id")?,
            }),
            ImportKind::Academics => ParsedRow::Academic(AcademicRecord {
                student_id: row.int("student_id")?,
                semester_id: row.int("semester_id")?,
                course_code: row.text("course_code")?,
                marks: row.opt_int("marks")?,
                attendance: row.float("attendance")?,
            }),
            ImportKind::Backlogs => ParsedRow::Backlog(Backlog {
                student_id: row.int("student_id")?,
                semester_id: row.int("semester_id")?,
                course_id: row.text("course_id")?,
            }),
            ImportKind::Fees => ParsedRow::Fee(FeeRecord {
                student_id: row.int("student_id")?,
                mode_of_admission: row.opt_text("mode_of_admission"),
                fee_total: row.int("fee_total")?,
                paid_amount: row.opt_int("paid_amount")?.unwrap_or(0),
                remaining_amount: row.opt_int("remaining_amount")?,
                library_fine: row.opt_int("library_fine")?.unwrap_or(0),
                equipment_fine: row.opt_int("equipment_fine")?.unwrap_or(0),
                paid_crt_fee: row.opt_int("paid_crt_fee")?.unwrap_or(0),
            }),
            ImportKind::ExamMarks => ParsedRow::ExamMark(ExamMark {
                student_id: row.int("student_id")?,
                year_id: row.int("year_id")?,
                branch_id: row.int("branch_id")?,
                section_id: row.int("section_id")?,
                semester_id: row.int("semester_id")?,
                mid_id: row.int("mid_id")?,
                course_id: row.text("course_id")?,
                mid_marks: row.int("mid_marks")?,
                quiz_marks: row.int("quiz_marks")?,
                assignment_marks: row.int("assignment_marks")?,
            }),
            ImportKind::Attendance => ParsedRow::Attendance(AttendanceRecord {
                student_id: row.int("student_id")?,
                semester_id: row.int("sem_id")?,
                course_id: row.text("course_id")?,
                year_id: row.int("year_id")?,
                branch_id: row.int("branch_id")?,
                section_id: row.int("sec_id")?,
                class_records: (1..=AttendanceRecord::SLOTS)
                    .map(|slot| row.opt_int(&slot.to_string()))
                    .collect::<FieldResult<Vec<_>>>()?,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::storage::fixtures::staff;

    const STUDENTS: &str = "\
student_id,first_name,last_name,email,gender,year_id,branch_id,sec_id,roll_no,phone_no,ssc_marks,inter_marks,passcode
1,Asha,Rao,asha@college.edu,F,2,1,1,101,9000000001.0,91.5,,1234
2,Ravi,Kumar,ravi@college.edu,M,2,1,2,102,9000000002,,88,1234.0
3,Bad,Row,bad@college.edu,M,two,1,1,103,9000000003,,,1234
";

    fn importer(db: &Database) -> Importer<'_> {
        Importer::with_options(db, 2, 1_000)
    }

    #[test]
    fn test_student_import_creates_accounts() {
        let db = Database::open_in_memory().unwrap();
        let report = importer(&db).run(ImportKind::Students, STUDENTS.as_bytes()).unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].line, 4);
        assert!(report.failed[0].reason.contains("year_id"));

        let account = db
            .get_account_by_email_and_role("ravi@college.edu", Role::Student)
            .unwrap()
            .unwrap();
        assert_eq!(account.external_id, Some(2));
        assert!(verify_password("1234", &account.password_hash));

        let s = db.get_student(1).unwrap().unwrap();
        assert_eq!(s.phone_no, "9000000001");
        assert_eq!(s.inter_marks, None);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        importer(&db).run(ImportKind::Students, STUDENTS.as_bytes()).unwrap();
        let before = db.get_stats().unwrap();

        let report = importer(&db).run(ImportKind::Students, STUDENTS.as_bytes()).unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.skipped, 2);

        let after = db.get_stats().unwrap();
        assert_eq!(before.students, after.students);
        assert_eq!(before.accounts, after.accounts);
    }

    #[test]
    fn test_missing_header_rejects_file() {
        let db = Database::open_in_memory().unwrap();
        let err = importer(&db)
            .run(ImportKind::Backlogs, "student_id,course_id\n1,CS101\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("semester_id")));
    }

    #[test]
    fn test_failed_row_leaves_no_account() {
        let db = Database::open_in_memory().unwrap();
        let mut existing = staff(Role::Management, 9);
        existing.email = "meena@college.edu".to_string();
        db.insert_staff(&existing).unwrap();

        // the account insert succeeds, then the staff insert hits the email constraint
        let csv = "\
emp_id,first_name,last_name,email,gender,designation,passcode
4,Meena,Iyer,meena@college.edu,F,Dean,1234
";
        let report = importer(&db).run(ImportKind::Management, csv.as_bytes()).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(!db.account_exists("meena@college.edu").unwrap());
        assert!(db.get_staff(Role::Management, 4).unwrap().is_none());
    }

    #[test]
    fn test_fact_imports() {
        let db = Database::open_in_memory().unwrap();
        importer(&db).run(ImportKind::Students, STUDENTS.as_bytes()).unwrap();

        let fees = "\
student_id,mode_of_admission,fee_total,paid_amount,remaining_amount,library_fine,equipment_fine,paid_crt_fee
1,Convener,100000,50000,,,,50000
99,Convener,1,1,,,,1
";
        let report = importer(&db).run(ImportKind::Fees, fees.as_bytes()).unwrap();
        assert_eq!(report.inserted, 1);
        // unknown student
        assert_eq!(report.failed.len(), 1);
        assert_eq!(db.get_fee(1).unwrap().unwrap().remaining(), 50000);

        let attendance = "\
student_id,year_id,branch_id,sec_id,sem_id,course_id,1,2,3
1,2,1,1,3,CS201,1,0,
";
        let report = importer(&db).run(ImportKind::Attendance, attendance.as_bytes()).unwrap();
        assert_eq!(report.inserted, 1);
        let stored = db.list_attendance(1).unwrap();
        assert_eq!(stored[0].class_records.len(), AttendanceRecord::SLOTS);
        assert_eq!(stored[0].classes_held(), 2);
        assert_eq!(stored[0].percentage(), 50.0);
    }
}

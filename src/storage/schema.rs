//! Database schema definition

/// SQL schema for the academia database
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Authentication identities
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    external_id INTEGER,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

-- External ids are only unique within a role
CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_role_external
    ON accounts(role, external_id) WHERE external_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS students (
    student_id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    gender TEXT NOT NULL DEFAULT '',
    year_id INTEGER NOT NULL,
    branch_id INTEGER NOT NULL,
    sec_id INTEGER NOT NULL,
    roll_no INTEGER NOT NULL,
    phone_no TEXT NOT NULL DEFAULT '',
    ssc_marks REAL,
    inter_marks REAL,
    password_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_students_class ON students(year_id, branch_id, sec_id);

CREATE TABLE IF NOT EXISTS faculty (
    faculty_id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    gender TEXT NOT NULL DEFAULT '',
    department TEXT NOT NULL DEFAULT '',
    designation TEXT NOT NULL DEFAULT '',
    qualifications TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL
);

-- Management and placement-cell employees, keyed by (role, emp_id)
CREATE TABLE IF NOT EXISTS staff (
    role TEXT NOT NULL,
    emp_id INTEGER NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL,
    gender TEXT NOT NULL DEFAULT '',
    designation TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL,
    PRIMARY KEY (role, emp_id),
    UNIQUE (role, email)
);

CREATE TABLE IF NOT EXISTS faculty_courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    faculty_id INTEGER NOT NULL,
    year_id INTEGER NOT NULL,
    branch_id INTEGER NOT NULL,
    section_id INTEGER NOT NULL,
    course_id TEXT NOT NULL,
    FOREIGN KEY (faculty_id) REFERENCES faculty(faculty_id) ON DELETE CASCADE,
    UNIQUE (faculty_id, year_id, branch_id, section_id, course_id)
);

CREATE INDEX IF NOT EXISTS idx_faculty_courses_class
    ON faculty_courses(year_id, branch_id, section_id);

-- Coursework submissions
CREATE TABLE IF NOT EXISTS assignments (
    assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    faculty_id INTEGER NOT NULL,
    course_id TEXT NOT NULL,
    year_id INTEGER NOT NULL,
    branch_id INTEGER NOT NULL,
    section_id INTEGER NOT NULL,
    pdf_ref TEXT,
    file_size INTEGER,
    submitted_at TEXT,
    marks INTEGER CHECK (marks IS NULL OR (marks BETWEEN 0 AND 10)),
    graded_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (student_id) REFERENCES students(student_id) ON DELETE CASCADE,
    FOREIGN KEY (faculty_id) REFERENCES faculty(faculty_id) ON DELETE CASCADE,
    UNIQUE (student_id, faculty_id, course_id)
);

CREATE INDEX IF NOT EXISTS idx_assignments_student ON assignments(student_id, submitted_at);
CREATE INDEX IF NOT EXISTS idx_assignments_faculty ON assignments(faculty_id, submitted_at);
CREATE INDEX IF NOT EXISTS idx_assignments_marks ON assignments(marks);

-- Notifications; 0 on year/branch/section/student is a wildcard
CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year_id INTEGER NOT NULL DEFAULT 0,
    branch_id INTEGER NOT NULL DEFAULT 0,
    section_id INTEGER NOT NULL DEFAULT 0,
    semester_id INTEGER,
    student_id INTEGER NOT NULL DEFAULT 0,
    notification_type TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    due_date TEXT NOT NULL,
    priority TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_audience
    ON notifications(year_id, branch_id, section_id, student_id);
CREATE INDEX IF NOT EXISTS idx_notifications_created ON notifications(created_at);

CREATE TABLE IF NOT EXISTS academics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    semester_id INTEGER NOT NULL,
    course_code TEXT NOT NULL,
    marks INTEGER,
    attendance REAL NOT NULL DEFAULT 0,
    FOREIGN KEY (student_id) REFERENCES students(student_id) ON DELETE CASCADE,
    UNIQUE (student_id, semester_id, course_code)
);

CREATE TABLE IF NOT EXISTS backlogs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    semester_id INTEGER NOT NULL,
    course_id TEXT NOT NULL,
    FOREIGN KEY (student_id) REFERENCES students(student_id) ON DELETE CASCADE,
    UNIQUE (student_id, semester_id, course_id)
);

CREATE TABLE IF NOT EXISTS fees (
    student_id INTEGER PRIMARY KEY,
    mode_of_admission TEXT NOT NULL DEFAULT '',
    fee_total INTEGER NOT NULL DEFAULT 0,
    paid_amount INTEGER NOT NULL DEFAULT 0,
    remaining_amount INTEGER,
    library_fine INTEGER NOT NULL DEFAULT 0,
    equipment_fine INTEGER NOT NULL DEFAULT 0,
    paid_crt_fee INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (student_id) REFERENCES students(student_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS exam_marks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    year_id INTEGER NOT NULL,
    branch_id INTEGER NOT NULL,
    section_id INTEGER NOT NULL,
    semester_id INTEGER NOT NULL,
    mid_id INTEGER NOT NULL,
    course_id TEXT NOT NULL,
    mid_marks INTEGER NOT NULL,
    quiz_marks INTEGER NOT NULL,
    assignment_marks INTEGER NOT NULL,
    FOREIGN KEY (student_id) REFERENCES students(student_id) ON DELETE CASCADE,
    UNIQUE (student_id, semester_id, mid_id, course_id)
);

CREATE TABLE IF NOT EXISTS attendance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    semester_id INTEGER NOT NULL,
    course_id TEXT NOT NULL,
    year_id INTEGER NOT NULL,
    branch_id INTEGER NOT NULL,
    section_id INTEGER NOT NULL,
    class_records TEXT NOT NULL,
    FOREIGN KEY (student_id) REFERENCES students(student_id) ON DELETE CASCADE,
    UNIQUE (student_id, semester_id, course_id)
);
"#;

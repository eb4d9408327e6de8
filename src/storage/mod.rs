//! SQLite storage layer for academia
//!
//! This module handles persistent storage of:
//! - Accounts and the four role-profile tables
//! - Faculty course assignments and coursework submissions
//! - Addressed notifications
//! - Per-student academic, fee, exam and attendance facts

mod accounts;
mod coursework;
mod notifications;
mod profiles;
mod records;
mod schema;

pub use coursework::{GradingOverview, GradingQueue};
pub use profiles::ClassFilter;
pub use records::{FeeSummary, StudentFee};
pub use schema::SCHEMA;

#[cfg(test)]
pub(crate) use profiles::fixtures;

use crate::error::Result;
use crate::model::{Priority, Role};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("opening database at {:?}", path.as_ref());
        let conn = Connection::open(path.as_ref())?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run `f` inside a transaction; any error rolls the whole unit back
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` inside a savepoint so a failure undoes only its own writes.
    /// Usable inside an open transaction.
    pub fn in_savepoint<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT unit")?;
        match f(self) {
            Ok(out) => {
                self.conn.execute_batch("RELEASE unit")?;
                Ok(out)
            }
            Err(e) => {
                self.conn.execute_batch("ROLLBACK TO unit; RELEASE unit")?;
                Err(e)
            }
        }
    }

    // ==================== Statistics ====================

    /// Get row counts for every table
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n as usize)
        };

        Ok(DatabaseStats {
            accounts: count("accounts")?,
            students: count("students")?,
            faculty: count("faculty")?,
            staff: count("staff")?,
            faculty_courses: count("faculty_courses")?,
            assignments: count("assignments")?,
            notifications: count("notifications")?,
            academics: count("academics")?,
            backlogs: count("backlogs")?,
            fees: count("fees")?,
            exam_marks: count("exam_marks")?,
            attendance: count("attendance")?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DatabaseStats {
    pub accounts: usize,
    pub students: usize,
    pub faculty: usize,
    pub staff: usize,
    pub faculty_courses: usize,
    pub assignments: usize,
    pub notifications: usize,
    pub academics: usize,
    pub backlogs: usize,
    pub fees: usize,
    pub exam_marks: usize,
    pub attendance: usize,
}

/// Current time at the precision stored in the database
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: crate::error::Error| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: crate::error::Error| FromSqlError::Other(Box::new(e)))
    }
}

/// True when the error is a UNIQUE/PRIMARY KEY violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.accounts, 0);
        assert_eq!(stats.students, 0);
        assert_eq!(stats.notifications, 0);
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("academia.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_account(&crate::model::NewAccount {
                email: "admin@college.edu".to_string(),
                password_hash: "x".to_string(),
                role: Role::Admin,
                external_id: None,
                first_name: String::new(),
                last_name: String::new(),
            })
            .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_stats().unwrap().accounts, 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.in_transaction(|db| {
            db.insert_account(&crate::model::NewAccount {
                email: "a@college.edu".to_string(),
                password_hash: "x".to_string(),
                role: Role::Admin,
                external_id: None,
                first_name: String::new(),
                last_name: String::new(),
            })?;
            Err(crate::error::Error::validation("abort"))
        });
        assert!(result.is_err());
        assert_eq!(db.get_stats().unwrap().accounts, 0);
    }

    #[test]
    fn test_savepoint_undoes_only_its_own_writes() {
        let db = Database::open_in_memory().unwrap();
        let account = |email: &str| crate::model::NewAccount {
            email: email.to_string(),
            password_hash: "x".to_string(),
            role: Role::Admin,
            external_id: None,
            first_name: String::new(),
            last_name: String::new(),
        };

        db.in_transaction(|db| {
            db.insert_account(&account("kept@college.edu"))?;
            let failed: Result<()> = db.in_savepoint(|db| {
                db.insert_account(&account("dropped@college.edu"))?;
                Err(crate::error::Error::validation("abort"))
            });
            assert!(failed.is_err());
            Ok(())
        })
        .unwrap();

        assert!(db.account_exists("kept@college.edu").unwrap());
        assert!(!db.account_exists("dropped@college.edu").unwrap());
    }
}

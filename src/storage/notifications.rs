use super::{now, Database};
use crate::error::Result;
use crate::model::{Audience, NewNotification, Notification, StudentProfile};
use rusqlite::{params, Row};

const NOTIFICATION_COLUMNS: &str = "id, year_id, branch_id, section_id, student_id, semester_id, \
     notification_type, title, description, due_date, priority, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        audience: Audience {
            year_id: row.get(1)?,
            branch_id: row.get(2)?,
            section_id: row.get(3)?,
            student_id: row.get(4)?,
        },
        semester_id: row.get(5)?,
        notification_type: row.get(6)?,
        title: row.get(7)?,
        description: row.get(8)?,
        due_date: row.get(9)?,
        priority: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl Database {
    // ==================== Notifications ====================

    pub fn insert_notification(&self, n: &NewNotification) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO notifications (
                year_id, branch_id, section_id, student_id, semester_id,
                notification_type, title, description, due_date, priority, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                n.audience.year_id,
                n.audience.branch_id,
                n.audience.section_id,
                n.audience.student_id,
                n.semester_id,
                n.notification_type,
                n.title,
                n.description,
                n.due_date,
                n.priority,
                now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rows whose audience matches the student, newest first.
    /// Same rule as `Audience::matches`, evaluated in SQL.
    pub fn list_notifications_for_student(&self, student: &StudentProfile) -> Result<Vec<Notification>> {
        let sql = format!(
            r#"
            SELECT {} FROM notifications
            WHERE (student_id = ?1)
               OR (student_id = 0
                   AND (year_id = 0 OR year_id = ?2)
                   AND (branch_id = 0 OR branch_id = ?3)
                   AND (section_id = 0 OR section_id = ?4))
            ORDER BY created_at DESC, id DESC
            "#,
            NOTIFICATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                student.student_id,
                student.year_id,
                student.branch_id,
                student.section_id
            ],
            notification_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rows addressed to everyone, newest first
    pub fn list_broadcast_notifications(&self, limit: Option<usize>) -> Result<Vec<Notification>> {
        let mut sql = format!(
            r#"
            SELECT {} FROM notifications
            WHERE year_id = 0 AND branch_id = 0 AND section_id = 0 AND student_id = 0
            ORDER BY created_at DESC, id DESC
            "#,
            NOTIFICATION_COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], notification_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every row regardless of audience, newest first
    pub fn list_recent_notifications(&self, limit: usize) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications ORDER BY created_at DESC, id DESC LIMIT ?1",
            NOTIFICATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([limit as i64], notification_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

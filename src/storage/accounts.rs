use super::{is_unique_violation, now, Database};
use crate::error::{Error, Result};
use crate::model::{Account, NewAccount, Role};
use rusqlite::{params, OptionalExtension, Row};

const ACCOUNT_COLUMNS: &str =
    "id, email, password_hash, role, external_id, first_name, last_name";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: row.get(3)?,
        external_id: row.get(4)?,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
    })
}

impl Database {
    // ==================== Accounts ====================

    /// Insert an account and return its row id
    pub fn insert_account(&self, account: &NewAccount) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO accounts (
                    email, password_hash, role, external_id, first_name, last_name, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    account.email,
                    account.password_hash,
                    account.role,
                    account.external_id,
                    account.first_name,
                    account.last_name,
                    now(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!("account already exists: {}", account.email))
                } else {
                    e.into()
                }
            })?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn account_exists(&self, email: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM accounts WHERE email = ?1", [email], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [id], account_from_row)
            .optional()?)
    }

    /// Login lookup: the role must match as well as the email
    pub fn get_account_by_email_and_role(&self, email: &str, role: Role) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE email = ?1 AND role = ?2",
            ACCOUNT_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![email, role], account_from_row)
            .optional()?)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let sql = format!("SELECT {} FROM accounts ORDER BY id", ACCOUNT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], account_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_account_external_id(&self, id: i64, external_id: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE accounts SET external_id = ?1 WHERE id = ?2",
                params![external_id, id],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!("external id {} already in use", external_id))
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    pub fn set_account_password_hash(&self, id: i64, hash: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET password_hash = ?1 WHERE id = ?2",
            params![hash, id],
        )?;
        Ok(())
    }
}

//! Identity resolution
//!
//! Maps an authenticated account to its role profile. Email is the primary
//! join key; the account's external id is a fallback for accounts whose email
//! drifted from the profile table. Neither key is guaranteed consistent with
//! the other, so [`audit`] reports disagreements without enforcing anything.

use crate::error::{Error, Result};
use crate::model::{Account, Profile, ProfileKey};
use crate::storage::Database;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Which key located the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    Email,
    ExternalId,
}

/// A profile together with how it was found
#[derive(Debug, Clone)]
pub struct Resolved {
    pub profile: Profile,
    pub by: ResolvedBy,
}

/// Find the profile for an account: email first, then `(role, external_id)`
pub fn resolve(db: &Database, account: &Account) -> Result<Resolved> {
    if let Some(profile) = db.find_profile_by_email(account.role, &account.email)? {
        debug!("resolved {} by email", account.email);
        return Ok(Resolved {
            profile,
            by: ResolvedBy::Email,
        });
    }

    warn!(
        "no {} profile with email {}, trying external id",
        account.role, account.email
    );

    if let Some(key) = account.profile_key() {
        if let Some(profile) = db.find_profile_by_key(key)? {
            info!("resolved {} via external id {}", account.email, key);
            return Ok(Resolved {
                profile,
                by: ResolvedBy::ExternalId,
            });
        }
    }

    Err(Error::not_found(format!(
        "{} profile not found for {}",
        account.role, account.email
    )))
}

/// How one account relates to the profile tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MappingStatus {
    /// Email and external id agree on the same profile
    Ok,
    /// Email matches a profile but the external id is not set
    MissingExternalId { email_profile: i64 },
    /// No profile has this email; external id may still resolve
    EmailNotFound { external_id: Option<i64> },
    /// Email and external id point at different profiles
    IdMismatch { email_profile: i64, external_id: i64 },
    /// External id names a profile that does not exist
    DanglingExternalId { external_id: i64 },
    /// External id resolves but that profile carries a different email
    ProfileEmailMismatch { external_id: i64, profile_email: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub account_id: i64,
    pub email: String,
    pub role: crate::model::Role,
    #[serde(flatten)]
    pub status: MappingStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub checked: usize,
    pub ok: usize,
    pub issues: Vec<AuditEntry>,
}

fn classify(db: &Database, account: &Account) -> Result<MappingStatus> {
    let by_email = db
        .find_profile_by_email(account.role, &account.email)?
        .map(|p| p.key().id);

    let Some(external_id) = account.external_id else {
        return Ok(match by_email {
            Some(id) => MappingStatus::MissingExternalId { email_profile: id },
            None => MappingStatus::EmailNotFound { external_id: None },
        });
    };

    let by_key = db.find_profile_by_key(ProfileKey::new(account.role, external_id))?;

    Ok(match (by_email, by_key) {
        (Some(id), _) if id != external_id => MappingStatus::IdMismatch {
            email_profile: id,
            external_id,
        },
        (Some(_), Some(_)) => MappingStatus::Ok,
        (_, None) => MappingStatus::DanglingExternalId { external_id },
        (None, Some(profile)) if profile.email() != account.email => {
            MappingStatus::ProfileEmailMismatch {
                external_id,
                profile_email: profile.email().to_string(),
            }
        }
        (None, Some(_)) => MappingStatus::EmailNotFound {
            external_id: Some(external_id),
        },
    })
}

/// Check every profile-bearing account against both lookup keys
pub fn audit(db: &Database) -> Result<AuditReport> {
    let mut report = AuditReport::default();

    for account in db.list_accounts()? {
        if !account.role.has_profile() {
            continue;
        }
        report.checked += 1;

        let status = classify(db, &account)?;
        if status == MappingStatus::Ok {
            report.ok += 1;
        } else {
            report.issues.push(AuditEntry {
                account_id: account.id,
                email: account.email.clone(),
                role: account.role,
                status,
            });
        }
    }

    info!(
        "identity audit: {} checked, {} ok, {} issues",
        report.checked,
        report.ok,
        report.issues.len()
    );
    Ok(report)
}

/// Set `external_id` from the email-matched profile where it is missing.
/// Returns how many accounts were updated. An account whose id is already
/// held by another account of the same role is skipped.
pub fn backfill_external_ids(db: &Database) -> Result<usize> {
    db.in_transaction(|db| {
        let mut updated = 0;
        for account in db.list_accounts()? {
            if account.external_id.is_some() || !account.role.has_profile() {
                continue;
            }
            let Some(profile) = db.find_profile_by_email(account.role, &account.email)? else {
                warn!("cannot backfill {}: no profile with that email", account.email);
                continue;
            };

            let id = profile.key().id;
            match db.in_savepoint(|db| db.set_account_external_id(account.id, id)) {
                Ok(()) => {
                    debug!("backfilled {} -> {}", account.email, id);
                    updated += 1;
                }
                Err(Error::Conflict(reason)) => {
                    warn!("cannot backfill {}: {}", account.email, reason);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(updated)
    })
}

//! Command implementations

use super::OutputFormat;
use crate::api::{self, AppState};
use crate::auth::{self, hash_password, RehashReport};
use crate::config::{AppConfig, CONFIG_FILE};
use crate::identity::{self, AuditReport, MappingStatus};
use crate::import::{ImportKind, ImportReport, Importer};
use crate::model::{Account, NewAccount, Role};
use crate::storage::{Database, DatabaseStats};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Load the config and open the database of an initialized root
fn open(root: &Path) -> Result<(AppConfig, Database)> {
    if !root.join(CONFIG_FILE).exists() {
        anyhow::bail!("academia is not initialized in {:?}. Run 'academia init' first.", root);
    }
    let config = AppConfig::load_or_default(root)?;
    let db_path = config.database_path(root);
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {:?}", db_path))?;
    Ok((config, db))
}

/// Write a fresh config and create the database and upload directory
pub fn init(root: &Path, force: bool) -> Result<()> {
    if root.join(CONFIG_FILE).exists() && !force {
        anyhow::bail!("academia already initialized. Use --force to re-initialize.");
    }

    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create {:?}", root))?;

    let config = AppConfig::generate();
    config.save(root)?;

    let upload_dir = config.upload_dir(root);
    std::fs::create_dir_all(&upload_dir)
        .with_context(|| format!("Failed to create upload directory {:?}", upload_dir))?;

    let db_path = config.database_path(root);
    let _db = Database::open(&db_path)?;

    println!("✓ Initialized academia in {:?}", root);
    println!("  Database: {:?}", db_path);
    println!("  Uploads: {:?}", upload_dir);
    println!("  Config: {:?}", root.join(CONFIG_FILE));

    Ok(())
}

/// Run the REST service until interrupted
pub fn serve(root: &Path, bind: Option<&str>) -> Result<()> {
    let (config, db) = open(root)?;
    let bind = bind.unwrap_or(&config.bind_address).to_string();
    let state = Arc::new(AppState::new(db, &config, root)?);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(api::serve(state, &bind))
}

pub fn import(root: &Path, kind: ImportKind, file: &Path) -> Result<ImportReport> {
    let (config, db) = open(root)?;
    let report = Importer::new(&db, &config)
        .run_file(kind, file)
        .with_context(|| format!("Failed to import {:?}", file))?;
    Ok(report)
}

pub fn audit(root: &Path) -> Result<AuditReport> {
    let (_, db) = open(root)?;
    Ok(identity::audit(&db)?)
}

pub fn backfill(root: &Path) -> Result<usize> {
    let (_, db) = open(root)?;
    Ok(identity::backfill_external_ids(&db)?)
}

pub fn rehash(root: &Path) -> Result<RehashReport> {
    let (config, db) = open(root)?;
    Ok(auth::rehash(&db, config.auth.hash_iterations)?)
}

pub fn user_add(root: &Path, args: &super::UserAddArgs) -> Result<Account> {
    let (config, db) = open(root)?;
    let role: Role = args.role.parse()?;

    let id = db.insert_account(&NewAccount {
        email: args.email.trim().to_string(),
        password_hash: hash_password(&args.password, config.auth.hash_iterations),
        role,
        external_id: args.external_id,
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
    })?;

    db.get_account(id)?
        .context("Account vanished right after insert")
}

pub fn stats(root: &Path) -> Result<DatabaseStats> {
    let (_, db) = open(root)?;
    Ok(db.get_stats()?)
}

// ==================== Output ====================

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print as JSON or with the given text renderer
pub fn print<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Text => {
            text(value);
            Ok(())
        }
    }
}

pub fn print_import_text(report: &ImportReport) {
    println!("Import: {}", report.kind);
    println!("  Inserted: {}", report.inserted);
    println!("  Skipped (already present): {}", report.skipped);
    println!("  Failed: {}", report.failed.len());

    if !report.failed.is_empty() {
        println!("\nFailed rows:");
        for failure in &report.failed {
            println!("  line {}: {}", failure.line, failure.reason);
        }
    }
}

pub fn print_audit_text(report: &AuditReport) {
    println!("Identity Mapping Audit");
    println!("======================\n");
    println!("Accounts checked: {}", report.checked);
    println!("Consistent: {}", report.ok);

    if report.issues.is_empty() {
        println!("\n✓ Every account maps cleanly to its profile");
        return;
    }

    println!("\nIssues ({}):", report.issues.len());
    for entry in &report.issues {
        let detail = match &entry.status {
            MappingStatus::Ok => continue,
            MappingStatus::MissingExternalId { email_profile } => {
                format!("external id not set (email matches profile {})", email_profile)
            }
            MappingStatus::EmailNotFound { external_id: Some(id) } => {
                format!("no profile with this email (external id {} resolves)", id)
            }
            MappingStatus::EmailNotFound { external_id: None } => {
                "no profile with this email and no external id".to_string()
            }
            MappingStatus::IdMismatch {
                email_profile,
                external_id,
            } => format!(
                "email matches profile {} but external id is {}",
                email_profile, external_id
            ),
            MappingStatus::DanglingExternalId { external_id } => {
                format!("external id {} has no profile", external_id)
            }
            MappingStatus::ProfileEmailMismatch {
                external_id,
                profile_email,
            } => format!("profile {} carries email {}", external_id, profile_email),
        };
        println!("  [{}] #{} {}: {}", entry.role, entry.account_id, entry.email, detail);
    }
}

pub fn print_stats_text(stats: &DatabaseStats) {
    println!("academia Status");
    println!("===============\n");
    println!("Accounts: {}", stats.accounts);
    println!("Students: {}", stats.students);
    println!("Faculty: {}", stats.faculty);
    println!("Staff: {}", stats.staff);
    println!("Faculty courses: {}", stats.faculty_courses);
    println!("Assignments: {}", stats.assignments);
    println!("Notifications: {}", stats.notifications);
    println!("Academic records: {}", stats.academics);
    println!("Backlogs: {}", stats.backlogs);
    println!("Fee records: {}", stats.fees);
    println!("Exam marks: {}", stats.exam_marks);
    println!("Attendance rows: {}", stats.attendance);
}

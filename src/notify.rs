//! Notification addressing
//!
//! A notification row is addressed by four axes (year, branch, section,
//! student) where 0 means "any". Publishers supply targets which fan out into
//! one row per class or per student; no targets means a single broadcast row.

use crate::error::{Error, Result};
use crate::model::{
    Audience, NewNotification, Notification, NotificationTarget, Priority, Role, StudentProfile,
};
use crate::storage::Database;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Notification kind used when the publisher does not give one
pub const DEFAULT_KIND: &str = "general";

/// Turn publisher targets into stored audiences. Duplicates collapse and
/// order is preserved; an empty list yields one broadcast audience.
pub fn fan_out(db: &Database, targets: &[NotificationTarget]) -> Result<Vec<Audience>> {
    if targets.is_empty() {
        return Ok(vec![Audience::BROADCAST]);
    }

    let mut seen = HashSet::new();
    let mut audiences = Vec::with_capacity(targets.len());

    for target in targets {
        let audience = match *target {
            NotificationTarget::Class {
                year_id,
                branch_id,
                section_id,
            } => Audience {
                year_id,
                branch_id,
                section_id,
                student_id: crate::model::WILDCARD,
            },
            NotificationTarget::Student { student_id } => {
                let student = db
                    .get_student(student_id)?
                    .ok_or_else(|| Error::not_found(format!("Student {} not found", student_id)))?;
                Audience::student(&student)
            }
        };
        if seen.insert(audience) {
            audiences.push(audience);
        }
    }

    Ok(audiences)
}

/// Everything the student can see, newest first
pub fn visible_for(db: &Database, student: &StudentProfile) -> Result<Vec<Notification>> {
    db.list_notifications_for_student(student)
}

/// Notifications for a role without a student profile: broadcasts only
pub fn broadcasts(db: &Database) -> Result<Vec<Notification>> {
    db.list_broadcast_notifications(None)
}

/// Most recent notifications of any audience
pub fn recent(db: &Database, limit: usize) -> Result<Vec<Notification>> {
    db.list_recent_notifications(limit)
}

/// Body of a publish request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub targets: Vec<NotificationTarget>,
    pub semester_id: Option<i64>,
    pub notification_type: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub created: usize,
    pub ids: Vec<i64>,
}

/// Validate and store one row per fanned-out audience in a single transaction
pub fn publish(db: &Database, publisher: Role, req: &PublishRequest) -> Result<PublishOutcome> {
    if !publisher.can_publish() {
        return Err(Error::forbidden("Students cannot create notifications"));
    }

    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::validation("title is required"))?;

    let due_date = req
        .due_date
        .as_deref()
        .ok_or_else(|| Error::validation("due_date is required"))
        .and_then(|d| {
            NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
                .map_err(|_| Error::validation(format!("due_date must be YYYY-MM-DD (got '{}')", d)))
        })?;

    let priority: Priority = match req.priority.as_deref() {
        Some(p) => p.parse()?,
        None => Priority::Low,
    };

    let kind = req
        .notification_type
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(DEFAULT_KIND);

    let audiences = fan_out(db, &req.targets)?;

    let ids = db.in_transaction(|db| {
        audiences
            .iter()
            .map(|audience| {
                db.insert_notification(&NewNotification {
                    audience: *audience,
                    semester_id: req.semester_id,
                    notification_type: kind.to_string(),
                    title: title.to_string(),
                    description: req.description.clone(),
                    due_date,
                    priority,
                })
            })
            .collect::<Result<Vec<_>>>()
    })?;

    info!(
        "{} published '{}' to {} audience(s)",
        publisher,
        title,
        ids.len()
    );
    Ok(PublishOutcome {
        created: ids.len(),
        ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassSection;
    use crate::storage::fixtures::*;

    fn request(targets: Vec<NotificationTarget>) -> PublishRequest {
        PublishRequest {
            targets,
            title: Some("Mid exams".to_string()),
            due_date: Some("2026-03-01".to_string()),
            priority: Some("High".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_targets_broadcast() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(fan_out(&db, &[]).unwrap(), vec![Audience::BROADCAST]);
    }

    #[test]
    fn test_fan_out_one_row_per_target() {
        let db = Database::open_in_memory().unwrap();
        db.insert_student(&student(5, 3, 2, 1)).unwrap();
        let class = NotificationTarget::Class {
            year_id: 2,
            branch_id: 1,
            section_id: 1,
        };
        let audiences = fan_out(
            &db,
            &[
                class,
                NotificationTarget::Student { student_id: 5 },
                class,
            ],
        )
        .unwrap();

        assert_eq!(audiences.len(), 2);
        assert_eq!(audiences[0], Audience::class(ClassSection::new(2, 1, 1)));
        assert_eq!(
            audiences[1],
            Audience {
                year_id: 3,
                branch_id: 2,
                section_id: 1,
                student_id: 5
            }
        );
    }

    #[test]
    fn test_unknown_student_target() {
        let db = Database::open_in_memory().unwrap();
        let err = fan_out(&db, &[NotificationTarget::Student { student_id: 9 }]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_publish_and_visibility() {
        let db = Database::open_in_memory().unwrap();
        let in_class = student(1, 2, 1, 1);
        let other_year = student(2, 1, 1, 1);
        db.insert_student(&in_class).unwrap();
        db.insert_student(&other_year).unwrap();

        let outcome = publish(
            &db,
            Role::Faculty,
            &request(vec![NotificationTarget::Class {
                year_id: 2,
                branch_id: 1,
                section_id: 1,
            }]),
        )
        .unwrap();
        assert_eq!(outcome.created, 1);
        publish(&db, Role::Management, &request(vec![])).unwrap();

        assert_eq!(visible_for(&db, &in_class).unwrap().len(), 2);
        assert_eq!(visible_for(&db, &other_year).unwrap().len(), 1);
        assert_eq!(broadcasts(&db).unwrap().len(), 1);
        assert_eq!(recent(&db, 5).unwrap().len(), 2);
    }

    #[test]
    fn test_publish_validation() {
        let db = Database::open_in_memory().unwrap();

        let err = publish(&db, Role::Student, &request(vec![])).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let mut bad = request(vec![]);
        bad.title = Some("  ".to_string());
        assert!(matches!(publish(&db, Role::Admin, &bad), Err(Error::Validation(_))));

        let mut bad = request(vec![]);
        bad.priority = Some("Urgent".to_string());
        assert!(matches!(publish(&db, Role::Admin, &bad), Err(Error::Validation(_))));

        let mut bad = request(vec![]);
        bad.due_date = Some("01/03/2026".to_string());
        assert!(matches!(publish(&db, Role::Admin, &bad), Err(Error::Validation(_))));

        assert_eq!(db.get_stats().unwrap().notifications, 0);
    }
}

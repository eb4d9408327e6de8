//! REST surface
//!
//! Routes mirror the role portals: `/api/users` for login, one prefix per
//! role for its read views, `/api/notifications` and `/api/assignments` for
//! the shared workflows. Every route except login and `/health` takes a
//! bearer token; see [`AuthUser`].

mod assignments;
mod auth;
mod error;
mod faculty;
mod management;
mod notifications;
mod students;
mod tpcell;
mod users;

pub use auth::AuthUser;
pub use error::{ApiError, ApiResult};

use crate::auth::TokenKeys;
use crate::config::AppConfig;
use crate::coursework::FileStore;
use crate::error::Result;
use crate::storage::Database;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Largest accepted assignment upload
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Everything a handler needs. The single database connection is shared
/// behind a mutex; each request holds it for the whole of its work.
pub struct AppState {
    pub db: Mutex<Database>,
    pub keys: TokenKeys,
    pub store: FileStore,
    pub listing_limit: usize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: Database, config: &AppConfig, root: &Path) -> Result<Self> {
        Ok(Self {
            db: Mutex::new(db),
            keys: TokenKeys::new(&config.auth)?,
            store: FileStore::new(config.upload_dir(root)),
            listing_limit: config.listing_limit,
        })
    }
}

pub fn router(state: SharedState) -> Router {
    let students = Router::new()
        .route("/profile/", get(students::profile))
        .route("/academics/", get(students::academics))
        .route("/backlogs/", get(students::backlogs))
        .route("/exam-data/", get(students::exam_data))
        .route("/fees/", get(students::fees))
        .route("/attendance/", get(students::attendance));

    let faculty = Router::new()
        .route("/profile/", get(faculty::profile))
        .route("/assignments/", get(faculty::assignments))
        .route("/students/", get(faculty::students));

    let management = Router::new()
        .route("/profile/", get(management::profile))
        .route("/students/count/", get(management::student_count))
        .route("/faculty/count/", get(management::faculty_count))
        .route("/fees/summary/", get(management::fee_summary))
        .route("/fees/students/", get(management::student_fees))
        .route("/students/", get(management::students))
        .route("/faculty/", get(management::faculty))
        .route("/notifications/recent/", get(management::recent_notifications));

    let tpcell = Router::new()
        .route("/profile/", get(tpcell::profile))
        .route("/stats/", get(tpcell::stats));

    let assignments = Router::new()
        .route("/student/assignments/", get(assignments::student_list))
        .route("/student/assignments/cards/", get(assignments::student_cards))
        .route("/student/assignments/{id}/", get(assignments::student_detail))
        .route(
            "/student/assignments/{id}/upload/",
            post(assignments::upload).put(assignments::upload),
        )
        .route(
            "/student/assignments/{id}/download/",
            get(assignments::student_download),
        )
        .route(
            "/student/assignments/create/{faculty_id}/{course_id}/",
            post(assignments::create),
        )
        .route("/faculty/assignments/overview/", get(assignments::overview))
        .route("/faculty/assignments/pending/", get(assignments::pending))
        .route("/faculty/assignments/graded/", get(assignments::graded))
        .route("/faculty/assignments/{id}/", get(assignments::faculty_detail))
        .route("/faculty/assignments/{id}/grade/", patch(assignments::grade))
        .route(
            "/faculty/assignments/{id}/download/",
            get(assignments::faculty_download),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .route("/health", get(health))
        .route("/media/{*path}", get(assignments::media))
        .route("/api/users/login/", post(users::login))
        .route("/api/users/me/", get(users::me))
        .route(
            "/api/notifications/",
            get(notifications::list).post(notifications::create),
        )
        .nest("/api/students", students)
        .nest("/api/faculty", faculty)
        .nest("/api/management", management)
        .nest("/api/tpcell", tpcell)
        .nest("/api/assignments", assignments)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

/// Bind and serve until the process is stopped
pub async fn serve(state: SharedState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

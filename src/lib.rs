//! academia - college management service
//!
//! This library provides role portals over a SQLite store: identity
//! resolution from accounts to role profiles, coursework submission and
//! grading, addressed notifications, and idempotent CSV bulk import.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod coursework;
pub mod error;
pub mod identity;
pub mod import;
pub mod model;
pub mod notify;
pub mod storage;

/// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
pub use model::{Account, Profile, ProfileKey, Role};
pub use storage::Database;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "academia";

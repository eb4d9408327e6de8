//! CLI interface using clap
//!
//! Provides the command-line interface for academia

mod commands;

pub use commands::*;

use crate::import::ImportKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// academia - college management service
#[derive(Parser, Debug)]
#[command(name = "academia")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Service root holding academia.toml (defaults to current directory)
    #[arg(short = 'r', long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default academia.toml and create the database
    Init(InitArgs),

    /// Run the REST service
    Serve(ServeArgs),

    /// Load a CSV export into the database
    Import(ImportArgs),

    /// Check every account against the profile tables
    Audit,

    /// Fill in missing account external ids from email matches
    Backfill,

    /// Hash any stored passwords that are still plaintext
    Rehash,

    /// Manage accounts
    #[command(subcommand)]
    User(UserCommand),

    /// Show row counts per table
    Stats,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing academia.toml
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address (overrides bind_address in academia.toml)
    #[arg(short, long, env = "ACADEMIA_BIND")]
    pub bind: Option<String>,
}

/// Arguments for import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// What the file contains
    #[arg(value_enum)]
    pub kind: ImportKind,

    /// CSV file with a header row
    pub file: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create an account
    Add(UserAddArgs),
}

/// Arguments for user add
#[derive(Args, Debug)]
pub struct UserAddArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "ACADEMIA_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// student, faculty, management, placement or admin
    #[arg(long)]
    pub role: String,

    /// Id of the matching profile row
    #[arg(long)]
    pub external_id: Option<i64>,

    #[arg(long, default_value = "")]
    pub first_name: String,

    #[arg(long, default_value = "")]
    pub last_name: String,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

//! academia - college management service
//!
//! Runs the REST service and the maintenance commands around it: bulk
//! import, identity audit and backfill, password rehashing.

use academia::cli::{
    audit, backfill, import, init, print, print_audit_text, print_import_text, print_stats_text,
    rehash, serve, stats, user_add, Cli, Commands, UserCommand,
};
use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let root = cli.root.as_path();

    // Execute command
    match cli.command {
        Commands::Init(args) => {
            init(root, args.force)?;
        }

        Commands::Serve(args) => {
            serve(root, args.bind.as_deref())?;
        }

        Commands::Import(args) => {
            let report = import(root, args.kind, &args.file)?;
            print(cli.format, &report, print_import_text)?;
        }

        Commands::Audit => {
            let report = audit(root)?;
            print(cli.format, &report, print_audit_text)?;
        }

        Commands::Backfill => {
            let updated = backfill(root)?;
            print(cli.format, &serde_json::json!({ "updated": updated }), |_| {
                println!("✓ Backfilled external ids on {} account(s)", updated)
            })?;
        }

        Commands::Rehash => {
            let report = rehash(root)?;
            print(cli.format, &report, |r| {
                println!(
                    "✓ Hashed {} account and {} profile password(s)",
                    r.accounts, r.profiles
                )
            })?;
        }

        Commands::User(UserCommand::Add(args)) => {
            let account = user_add(root, &args)?;
            print(cli.format, &account, |a| {
                println!("✓ Created {} account #{} for {}", a.role, a.id, a.email)
            })?;
        }

        Commands::Stats => {
            let stats = stats(root)?;
            print(cli.format, &stats, print_stats_text)?;
        }
    }

    Ok(())
}

//! Keygrid License Registry Server
//!
//! Runs the HTTP API for license activation and validity checks, and
//! carries the admin surface for minting new license keys.
//!
//! Usage:
//!   keygrid-server serve --port 8080 --db keygrid.db
//!   keygrid-server mint --license-type pro --expires-at 2026-12-31T23:59:59Z

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use keygrid_registry::{LicenseRegistry, LicenseStore, LicenseType};
use keygrid_server::identity::JwtIdentity;
use keygrid_server::{build_router, AppState};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keygrid-server")]
#[command(about = "Keygrid license registry server and admin CLI")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Path to the license database
        #[arg(long, default_value = "keygrid.db", env = "KEYGRID_DB_PATH")]
        db: PathBuf,

        /// HS256 secret shared with the identity provider
        #[arg(long, env = "KEYGRID_JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,

        /// Enable verbose debug logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Mint a new license key
    Mint {
        /// License tier: free, trial, pro or enterprise
        #[arg(long, default_value = "pro", value_parser = LicenseType::from_str)]
        license_type: LicenseType,

        /// Optional absolute expiry, e.g. 2026-12-31T23:59:59Z
        #[arg(long)]
        expires_at: Option<String>,

        /// Path to the license database
        #[arg(long, default_value = "keygrid.db", env = "KEYGRID_DB_PATH")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Serve {
            port,
            db,
            jwt_secret,
            verbose,
        } => serve(port, &db, &jwt_secret, verbose).await,
        Command::Mint {
            license_type,
            expires_at,
            db,
        } => mint(license_type, expires_at.as_deref(), &db),
    }
}

async fn serve(port: u16, db: &PathBuf, jwt_secret: &str, verbose: bool) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Keygrid server starting...");
    let store = LicenseStore::open(db)
        .with_context(|| format!("failed to open license store at {}", db.display()))?;
    let state = AppState {
        registry: LicenseRegistry::new(store),
        identity: Arc::new(JwtIdentity::new(jwt_secret)),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!("License API listening on port {}", port);
    info!("Database: {}", db.display());

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

fn mint(license_type: LicenseType, expires_at: Option<&str>, db: &PathBuf) -> Result<()> {
    let expires_at: Option<DateTime<Utc>> = expires_at
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("invalid expiry timestamp: {s}"))
        })
        .transpose()?;

    let store = LicenseStore::open(db)
        .with_context(|| format!("failed to open license store at {}", db.display()))?;
    let registry = LicenseRegistry::new(store);
    let key = registry.create(license_type, expires_at)?;

    println!("Created {license_type} license: {key}");
    if let Some(expires_at) = expires_at {
        println!("Expires: {}", keygrid_registry::format_timestamp(expires_at));
    }
    Ok(())
}

//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use murmur_core::{Session, SocialError};
use std::path::Path;

/// Load a session for the selected backend. The redb backend creates the
/// database file on first use.
fn load_session(db_path: &Path, backend: &str) -> Result<Session, SocialError> {
    match backend {
        "memory" => Ok(Session::new()),
        "redb" => Session::open(db_path),
        other => Err(SocialError::Validation(format!(
            "Unknown backend '{other}' (expected \"redb\" or \"memory\")"
        ))),
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    backend: &str,
    host: &str,
    port: u16,
) -> Result<(), SocialError> {
    let session = load_session(db_path, backend)?;

    println!("Murmur Social Backend Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", backend);
    println!("  Database: {:?}", db_path);
    println!();
    println!("Endpoints:");
    println!("  POST /api/auth/register - Register");
    println!("  POST /api/auth/login    - Log in");
    println!("  GET  /api/posts         - List posts");
    println!("  GET  /api/users/{{id}}    - Public profile");
    println!("  GET  /health            - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, session).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show user and post counts.
pub fn cmd_status(db_path: &Path, backend: &str, json_mode: bool) -> Result<(), SocialError> {
    let session = load_session(db_path, backend)?;
    let users = session.user_count()?;
    let posts = session.post_count()?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend,
            "user_count": users,
            "post_count": posts,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Murmur Status");
    println!("=============");
    println!("Database: {:?}", db_path);
    println!("Backend:  {}", backend);
    println!();
    println!("Users: {}", users);
    println!("Posts: {}", posts);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db_path: &Path, backend: &str, force: bool) -> Result<(), SocialError> {
    if backend == "memory" {
        println!("Memory backend needs no initialization.");
        return Ok(());
    }
    if db_path.exists() && !force {
        return Err(SocialError::Io(format!(
            "Database {:?} already exists (use --force to reinitialize)",
            db_path
        )));
    }
    if db_path.exists() {
        std::fs::remove_file(db_path)
            .map_err(|e| SocialError::Io(format!("Cannot remove existing database: {e}")))?;
    }

    let _ = Session::open(db_path)?;
    println!("Initialized empty database at {:?}", db_path);
    Ok(())
}

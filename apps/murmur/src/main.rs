//! # Murmur - Social Backend Server
//!
//! The main binary for the Murmur social platform.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for database operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/murmur (THE BINARY)              │
//! │                                                      │
//! │   ┌─────────────┐          ┌──────────────────┐      │
//! │   │   CLI       │          │    HTTP API      │      │
//! │   │  (clap)     │          │    (axum)        │      │
//! │   └──────┬──────┘          └────────┬─────────┘      │
//! │          │                          │                │
//! │          └────────────┬─────────────┘                │
//! │                       ▼                              │
//! │               ┌───────────────┐                      │
//! │               │  murmur-core  │                      │
//! │               │  (THE LOGIC)  │                      │
//! │               └───────────────┘                      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! murmur server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! murmur init
//! murmur status
//! ```

use clap::Parser;
use murmur::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing. MURMUR_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MURMUR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "murmur=debug,tower_http=debug"
    } else {
        "murmur=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Murmur startup banner.
fn print_banner() {
    println!(
        r#"
  ███╗   ███╗██╗   ██╗██████╗ ███╗   ███╗██╗   ██╗██████╗
  ████╗ ████║██║   ██║██╔══██╗████╗ ████║██║   ██║██╔══██╗
  ██╔████╔██║██║   ██║██████╔╝██╔████╔██║██║   ██║██████╔╝
  ██║╚██╔╝██║██║   ██║██╔══██╗██║╚██╔╝██║██║   ██║██╔══██╗
  ██║ ╚═╝ ██║╚██████╔╝██║  ██║██║ ╚═╝ ██║╚██████╔╝██║  ██║
  ╚═╝     ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═╝     ╚═╝ ╚═════╝ ╚═╝  ╚═╝

  Social Backend v{}

  Posts • Comments • Likes • Follows
"#,
        env!("CARGO_PKG_VERSION")
    );
}

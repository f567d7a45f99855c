//! # casegraph
//!
//! Builds NGSI-LD case graphs over a document/edge store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/casegraph (THE BINARY)       │
//! │                                              │
//! │    ┌─────────────┐      ┌─────────────┐      │
//! │    │    CLI      │      │  HTTP API   │      │
//! │    │   (clap)    │      │   (axum)    │      │
//! │    └──────┬──────┘      └──────┬──────┘      │
//! │           └──────────┬─────────┘             │
//! │                      ▼                       │
//! │             ┌────────────────┐               │
//! │             │ casegraph-core │               │
//! │             └────────────────┘               │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! casegraph setup
//! casegraph ingest-csv -f PatientInfo.csv
//! casegraph synthesize
//! casegraph link --target cases
//! casegraph server --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // CASEGRAPH_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("CASEGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "casegraph=info,tower_http=debug".into());

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

    let cli = casegraph::cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = casegraph::cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
   casegraph v{}
   tabular cases -> NGSI-LD entities -> edges
"#,
        env!("CARGO_PKG_VERSION")
    );
}

//! # casegraph
//!
//! The HTTP server and command line front end over `casegraph-core`.
//!
//! - [`api`]: axum router, one route per materializer operation
//! - [`cli`]: clap commands for provisioning, ingestion and batch jobs
//! - [`config`]: TOML configuration file

pub mod api;
pub mod cli;
pub mod config;

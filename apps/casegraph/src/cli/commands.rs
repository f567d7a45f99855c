//! # CLI Command Implementations

use super::{LinkTarget, Settings};
use crate::api;
use crate::config::BackendKind;
use casegraph_core::{CasegraphError, Database, EdgeOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Maximum CSV file size for ingestion (100 MB).
const MAX_INGEST_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Resolve `path` to an existing regular file no larger than `max_size`.
fn validate_input_file(path: &Path, max_size: u64) -> Result<PathBuf, CasegraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        CasegraphError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| CasegraphError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if !metadata.is_file() {
        return Err(CasegraphError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > max_size {
        return Err(CasegraphError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(canonical)
}

// =============================================================================
// HELPERS
// =============================================================================

/// Open the configured database.
pub fn open_database(settings: &Settings) -> Result<Database, CasegraphError> {
    let database = match settings.backend {
        BackendKind::Redb => Database::with_redb(&settings.database)?,
        BackendKind::Memory => Database::new(),
    };
    Ok(database.with_namespace(settings.namespace.clone()))
}

/// Open the configured database for a one-shot command.
///
/// A memory store would be discarded when the command exits, so batch
/// commands require the redb backend.
fn open_persistent(settings: &Settings, command: &str) -> Result<Database, CasegraphError> {
    if settings.backend == BackendKind::Memory {
        return Err(CasegraphError::InvalidConfig(format!(
            "'{}' needs the redb backend; a memory store does not outlive the command",
            command
        )));
    }
    open_database(settings)
}

/// Open the persistent database and create missing managed collections.
fn open_provisioned(settings: &Settings, command: &str) -> Result<Database, CasegraphError> {
    let mut database = open_persistent(settings, command)?;
    database.provision()?;
    Ok(database)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CasegraphError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CasegraphError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Open the server's database, loading `csv` into the source collection first.
fn open_server_database(
    settings: &Settings,
    csv: Option<&Path>,
) -> Result<Database, CasegraphError> {
    let mut database = open_database(settings)?;
    if let Some(file) = csv {
        let path = validate_input_file(file, MAX_INGEST_FILE_SIZE)?;
        let report = database.ingest_csv_path(&path)?;
        tracing::info!(rows = report.rows, collection = %report.collection, "CSV preloaded");
    }
    Ok(database)
}

/// Start the HTTP server.
pub async fn cmd_server(settings: &Settings, csv: Option<&Path>) -> Result<(), CasegraphError> {
    let database = open_server_database(settings, csv)?;

    println!("casegraph server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", settings.host);
    println!("  Port:     {}", settings.port);
    println!("  Backend:  {}", settings.backend);
    println!("  Database: {:?}", settings.database);
    println!("  Prefix:   {}", settings.namespace.case_id_prefix);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", settings.host, settings.port);
    api::run_server(&addr, database).await
}

// =============================================================================
// SETUP COMMAND
// =============================================================================

/// Create the managed collections.
pub fn cmd_setup(settings: &Settings) -> Result<(), CasegraphError> {
    let mut database = open_persistent(settings, "setup")?;
    let report = database.provision()?;
    tracing::info!(created = report.created.len(), "provisioned");

    if settings.json_mode {
        return print_json(&report);
    }

    for name in &report.created {
        println!("created  {}", name);
    }
    for name in &report.existing {
        println!("exists   {}", name);
    }
    Ok(())
}

// =============================================================================
// INGEST COMMAND
// =============================================================================

/// Load a CSV file into the source collection.
pub fn cmd_ingest_csv(settings: &Settings, file: &Path) -> Result<(), CasegraphError> {
    let mut database = open_persistent(settings, "ingest-csv")?;
    let path = validate_input_file(file, MAX_INGEST_FILE_SIZE)?;
    let report = database.ingest_csv_path(&path)?;
    tracing::info!(rows = report.rows, collection = %report.collection, "CSV ingested");

    if settings.json_mode {
        return print_json(&report);
    }

    println!(
        "Ingested {} rows into '{}' ({} columns)",
        report.rows,
        report.collection,
        report.columns.len()
    );
    Ok(())
}

// =============================================================================
// SYNTHESIZE COMMAND
// =============================================================================

/// Build case entities from the source collection.
pub fn cmd_synthesize(settings: &Settings) -> Result<(), CasegraphError> {
    let mut database = open_provisioned(settings, "synthesize")?;
    let report = database.synthesize_cases()?;
    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped.len(),
        "case entities synthesized"
    );

    if settings.json_mode {
        return print_json(&report);
    }

    println!("Synthesized {} case entities", report.inserted);
    for skipped in &report.skipped {
        println!(
            "  skipped {}: {}",
            skipped.key.as_deref().unwrap_or("<no key>"),
            skipped.reason
        );
    }
    if !report.duplicate_ids.is_empty() {
        println!("  duplicate ids: {}", report.duplicate_ids.join(", "));
    }
    Ok(())
}

// =============================================================================
// LINK COMMAND
// =============================================================================

/// Materialize edges.
pub fn cmd_link(settings: &Settings, target: LinkTarget) -> Result<(), CasegraphError> {
    let mut database = open_provisioned(settings, "link")?;

    let (inserted, outcomes) = match target {
        LinkTarget::Cases => {
            let report = database.link_cases()?;
            (report.inserted, report.outcomes)
        }
        LinkTarget::EntriesByKey => {
            let report = database.link_entries_by_key()?;
            (report.inserted, report.outcomes)
        }
        LinkTarget::EntriesById => {
            let report = database.link_entries_by_id()?;
            (report.inserted, report.outcomes)
        }
    };
    tracing::info!(inserted, inspected = outcomes.len(), ?target, "edges materialized");

    if settings.json_mode {
        return print_json(&serde_json::json!({
            "inserted": inserted,
            "outcomes": outcomes,
        }));
    }

    println!("Inserted {} edges", inserted);
    for outcome in &outcomes {
        match outcome {
            EdgeOutcome::Linked { .. } => {}
            EdgeOutcome::Unresolved {
                from,
                relationship,
                object,
            } => println!("  unresolved {}.{} -> {}", from, relationship, object),
            EdgeOutcome::BlankTarget { from, relationship } => {
                println!("  blank      {}.{}", from, relationship);
            }
            EdgeOutcome::MissingObject { from, relationship } => {
                println!("  no object  {}.{}", from, relationship);
            }
        }
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// List collections and document counts.
pub fn cmd_status(settings: &Settings) -> Result<(), CasegraphError> {
    let database = open_persistent(settings, "status")?;
    let collections = database.collections()?;

    if settings.json_mode {
        return print_json(&serde_json::json!({
            "database": settings.database.to_string_lossy(),
            "backend": settings.backend.to_string(),
            "collections": collections,
        }));
    }

    println!("casegraph Status");
    println!("================");
    println!("Database: {:?}", settings.database);
    println!("Backend:  {}", settings.backend);
    println!();
    if collections.is_empty() {
        println!("No collections. Run `casegraph setup` first.");
    }
    for info in &collections {
        println!("{:<24} {:<9} {}", info.name, info.kind, info.count);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use casegraph_core::{DocumentStore, NgsiNamespace};

    fn redb_settings(dir: &Path) -> Settings {
        Settings {
            database: dir.join("casegraph.redb"),
            backend: BackendKind::Redb,
            host: "127.0.0.1".to_string(),
            port: 0,
            namespace: NgsiNamespace::default(),
            json_mode: true,
        }
    }

    #[test]
    fn commands_share_one_redb_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = redb_settings(dir.path());
        let csv = dir.path().join("cases.csv");
        std::fs::write(&csv, "patient_id,by_patient\n1,\n2,1\n").expect("write");

        cmd_setup(&settings).expect("setup");
        cmd_ingest_csv(&settings, &csv).expect("ingest");
        cmd_synthesize(&settings).expect("synthesize");
        cmd_link(&settings, LinkTarget::Cases).expect("link");
        cmd_status(&settings).expect("status");

        let database = open_database(&settings).expect("open");
        assert_eq!(database.store().count("patientJSON").expect("count"), 2);
        assert_eq!(database.store().count("patientEdge").expect("count"), 1);
    }

    #[test]
    fn batch_commands_reject_memory_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings {
            backend: BackendKind::Memory,
            ..redb_settings(dir.path())
        };
        let csv = dir.path().join("cases.csv");
        std::fs::write(&csv, "patient_id\n1\n2\n").expect("write");

        let err = cmd_ingest_csv(&settings, &csv).expect_err("memory ingest");
        assert!(matches!(err, CasegraphError::InvalidConfig(_)));
        assert!(err.to_string().contains("ingest-csv"));

        for result in [
            cmd_setup(&settings),
            cmd_synthesize(&settings),
            cmd_link(&settings, LinkTarget::Cases),
            cmd_status(&settings),
        ] {
            assert!(matches!(result, Err(CasegraphError::InvalidConfig(_))));
        }
        assert!(!settings.database.exists());
    }

    #[test]
    fn memory_backend_still_opens_for_the_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings {
            backend: BackendKind::Memory,
            ..redb_settings(dir.path())
        };
        let database = open_database(&settings).expect("open");
        assert!(!database.is_persistent());
    }

    #[test]
    fn memory_server_preloads_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings {
            backend: BackendKind::Memory,
            ..redb_settings(dir.path())
        };
        let csv = dir.path().join("cases.csv");
        std::fs::write(&csv, "patient_id,by_patient\n1,\n2,1\n").expect("write");

        let mut database = open_server_database(&settings, Some(&csv)).expect("open");
        database.provision().expect("provision");
        assert_eq!(database.synthesize_cases().expect("synthesize").inserted, 2);
        assert_eq!(database.link_cases().expect("link").inserted, 1);
    }

    #[test]
    fn ingest_rejects_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = validate_input_file(dir.path(), MAX_INGEST_FILE_SIZE).expect_err("dir");
        assert!(matches!(err, CasegraphError::IoError(_)));
    }
}

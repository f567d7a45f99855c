//! # Tabular Ingestion
//!
//! Loads CSV rows into a source collection as flat records.
//!
//! The header row names the fields. Each record keeps the header's column
//! order, which the field pattern extractor depends on. Cells are stored as
//! strings; empty cells become `null`.

use crate::primitives::MAX_TABULAR_ROWS;
use crate::store::DocumentStore;
use crate::types::{CasegraphError, CollectionKind, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

/// Summary of one ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularReport {
    /// Collection the rows were written to.
    pub collection: String,
    /// Header names in column order.
    pub columns: Vec<String>,
    /// Number of rows stored.
    pub rows: usize,
}

fn tabular_err(e: csv::Error) -> CasegraphError {
    CasegraphError::TabularError(e.to_string())
}

/// Parse CSV input into records.
pub fn read_records<R: Read>(input: R) -> Result<(Vec<String>, Vec<Document>), CasegraphError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(input);

    let columns: Vec<String> = reader
        .headers()
        .map_err(tabular_err)?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(CasegraphError::TabularError("missing header row".into()));
    }
    let mut seen = BTreeSet::new();
    for (index, column) in columns.iter().enumerate() {
        if column.is_empty() {
            return Err(CasegraphError::TabularError(format!(
                "column {} has an empty name",
                index + 1
            )));
        }
        if !seen.insert(column.as_str()) {
            return Err(CasegraphError::TabularError(format!(
                "duplicate column '{}'",
                column
            )));
        }
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(tabular_err)?;
        if records.len() >= MAX_TABULAR_ROWS {
            return Err(CasegraphError::TabularError(format!(
                "input exceeds {} rows",
                MAX_TABULAR_ROWS
            )));
        }
        let mut record = Document::new();
        for (column, cell) in columns.iter().zip(row.iter()) {
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            record.insert(column.clone(), value);
        }
        records.push(record);
    }

    Ok((columns, records))
}

/// Parse CSV input and append every row to `collection` in one batch.
///
/// The collection is created as a document collection if it does not
/// exist. Nothing is stored if any row fails to parse.
pub fn ingest<S: DocumentStore, R: Read>(
    store: &mut S,
    collection: &str,
    input: R,
) -> Result<TabularReport, CasegraphError> {
    let (columns, records) = read_records(input)?;
    store.create_collection(collection, CollectionKind::Document)?;
    let rows = store.insert_batch(collection, records)?.len();
    Ok(TabularReport {
        collection: collection.to_string(),
        columns,
        rows,
    })
}

/// [`ingest`] from a file.
pub fn ingest_path<S: DocumentStore>(
    store: &mut S,
    collection: &str,
    path: &Path,
) -> Result<TabularReport, CasegraphError> {
    let file = std::fs::File::open(path)
        .map_err(|e| CasegraphError::IoError(format!("{}: {}", path.display(), e)))?;
    ingest(store, collection, std::io::BufReader::new(file))
}

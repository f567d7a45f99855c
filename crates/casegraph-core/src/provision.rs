//! # Provisioning
//!
//! Creates the managed collections. Running it again leaves existing
//! collections untouched.

use crate::primitives::{
    ENTITY_COLLECTION, ENTITY_EDGE_COLLECTION, ENTRY_COLLECTION, ENTRY_EDGE_COLLECTION,
};
use crate::store::DocumentStore;
use crate::types::{CasegraphError, CollectionKind};
use serde::{Deserialize, Serialize};

/// The collections every deployment needs, with their kinds.
pub const MANAGED_COLLECTIONS: [(&str, CollectionKind); 4] = [
    (ENTRY_COLLECTION, CollectionKind::Document),
    (ENTRY_EDGE_COLLECTION, CollectionKind::Edge),
    (ENTITY_COLLECTION, CollectionKind::Document),
    (ENTITY_EDGE_COLLECTION, CollectionKind::Edge),
];

/// Which managed collections a provisioning run created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Create every managed collection that does not exist yet.
pub fn provision<S: DocumentStore>(store: &mut S) -> Result<ProvisionReport, CasegraphError> {
    let mut report = ProvisionReport::default();
    for (name, kind) in MANAGED_COLLECTIONS {
        if store.create_collection(name, kind)? {
            report.created.push(name.to_string());
        } else {
            report.existing.push(name.to_string());
        }
    }
    Ok(report)
}

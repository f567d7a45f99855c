//! # Fixed Primitives
//!
//! Compile-time constants shared by the store, the materializer and the
//! HTTP layer: managed collection names, the NGSI namespace defaults and
//! the attribute-name patterns used for field extraction.

// =============================================================================
// MANAGED COLLECTIONS
// =============================================================================

/// Generic document collection written by `POST /entries`.
pub const ENTRY_COLLECTION: &str = "entries";

/// Generic edge collection written by the name-pattern edge jobs.
pub const ENTRY_EDGE_COLLECTION: &str = "entryEdges";

/// Entity collection holding synthesized NGSI-LD case documents.
pub const ENTITY_COLLECTION: &str = "patientJSON";

/// Edge collection holding links between case entities.
pub const ENTITY_EDGE_COLLECTION: &str = "patientEdge";

/// Source collection that tabular ingestion loads CSV rows into.
pub const SOURCE_COLLECTION: &str = "originCSV";

// =============================================================================
// NGSI NAMESPACE DEFAULTS
// =============================================================================

/// Prefix every synthesized case id starts with.
///
/// The raw patient value is appended verbatim, so `"7"` becomes
/// `urn:covid-10:case:007`.
pub const CASE_ID_PREFIX: &str = "urn:covid-10:case:00";

/// `type` tag of synthesized case entities.
pub const ENTITY_TYPE: &str = "InfectionCase";

/// Value of the `diseaseCode` property.
pub const DISEASE_CODE: &str = "COVID-19";

/// Value of `addressCountry` in every address block.
pub const ADDRESS_COUNTRY: &str = "KR";

/// Number of placeholder entries emitted in `travelRoutes`.
pub const TRAVEL_ROUTE_PLACEHOLDERS: usize = 2;

// =============================================================================
// FIELD PATTERNS
// =============================================================================

/// Source field carrying the patient identifier.
pub const PATIENT_PATTERN: &str = "patient";
/// Source field carrying the gender.
pub const SEX_PATTERN: &str = "sex";
/// Source field carrying the year of birth.
pub const BIRTH_PATTERN: &str = "birth";
/// Source field carrying the region.
pub const REGION_PATTERN: &str = "region";
/// Source field carrying the infection group (spreader description).
pub const GROUP_PATTERN: &str = "group";
/// Source field carrying the infection reason (spreader relationship).
pub const REASON_PATTERN: &str = "reason";
/// Source field carrying the order of transmission.
pub const ORDER_PATTERN: &str = "order";
/// Source field carrying the spreader's patient identifier.
pub const INFECTED_BY_PATTERN: &str = "by";
/// Source field carrying the infection status.
pub const STATE_PATTERN: &str = "state";

/// Attribute-name fragments marking a relationship attribute on generic
/// entries (`isPartOf`, `infectedBy`, ...).
pub const RELATIONSHIP_NAME_PATTERNS: [&str; 2] = ["is", "By"];

/// Nested attribute-name fragment used by the second-level listing.
pub const NESTED_RELATIONSHIP_PATTERN: &str = "By";

/// Default fragment for the filtered attribute listing.
pub const DEFAULT_ATTRIBUTE_PATTERN: &str = "e";

/// NGSI-LD property type tag marking a relationship.
pub const RELATIONSHIP_TYPE: &str = "Relationship";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a user-supplied document key.
pub const MAX_KEY_LENGTH: usize = 254;

/// Maximum number of rows accepted from one tabular input.
pub const MAX_TABULAR_ROWS: usize = 1_000_000;

//! # Entity Synthesizer
//!
//! Turns flat case records into NGSI-LD `InfectionCase` entities.
//!
//! Each semantic target is located by its own name pattern (see
//! [`CaseFields::extract`]); a missing field becomes JSON `null` in the
//! entity rather than an error. The entity id is the namespace prefix
//! followed by the raw patient value, with no uniqueness check: duplicate
//! source ids yield duplicate entities, which the run report lists.

use crate::ngsi::{EntityDocument, Property, PostalAddress, TravelRoute};
use crate::pattern::{Extracted, NamePattern, extract};
use crate::primitives::{
    ADDRESS_COUNTRY, BIRTH_PATTERN, CASE_ID_PREFIX, DISEASE_CODE, ENTITY_TYPE, GROUP_PATTERN,
    INFECTED_BY_PATTERN, ORDER_PATTERN, PATIENT_PATTERN, REASON_PATTERN, REGION_PATTERN,
    SEX_PATTERN, STATE_PATTERN, TRAVEL_ROUTE_PLACEHOLDERS,
};
use crate::store::DocumentStore;
use crate::types::{CasegraphError, CollectionKind, Document, KEY_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

// =============================================================================
// NAMESPACE
// =============================================================================

/// Naming constants stamped onto synthesized entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NgsiNamespace {
    /// Prefix prepended to raw patient values to form entity ids.
    pub case_id_prefix: String,
    /// Entity `type` tag.
    pub entity_type: String,
    /// Value of the `diseaseCode` property.
    pub disease_code: String,
    /// `addressCountry` of every address.
    pub address_country: String,
}

impl Default for NgsiNamespace {
    fn default() -> Self {
        Self {
            case_id_prefix: CASE_ID_PREFIX.to_string(),
            entity_type: ENTITY_TYPE.to_string(),
            disease_code: DISEASE_CODE.to_string(),
            address_country: ADDRESS_COUNTRY.to_string(),
        }
    }
}

impl NgsiNamespace {
    /// Entity id for a raw patient value.
    #[must_use]
    pub fn case_id(&self, raw: &str) -> String {
        format!("{}{}", self.case_id_prefix, raw)
    }

    /// Whether `object` is the prefix followed by nothing but whitespace.
    ///
    /// Such ids come from blank spreader fields and never name an entity.
    #[must_use]
    pub fn is_blank_case_id(&self, object: &str) -> bool {
        object
            .strip_prefix(self.case_id_prefix.as_str())
            .is_some_and(|suffix| suffix.trim().is_empty())
    }
}

// =============================================================================
// EXTRACTED FIELDS
// =============================================================================

/// The fields of one case record, each located by name pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseFields {
    pub patient_id: Extracted,
    pub gender: Extracted,
    pub year_of_birth: Extracted,
    pub region: Extracted,
    pub infection_group: Extracted,
    pub infection_reason: Extracted,
    pub order_of_transmission: Extracted,
    pub infected_by: Extracted,
    pub infection_status: Extracted,
}

impl CaseFields {
    /// Run every extraction against `record`.
    #[must_use]
    pub fn extract(record: &Document) -> Self {
        let find = |fragment: &str| extract(record, &NamePattern::contains(fragment));
        Self {
            patient_id: find(PATIENT_PATTERN),
            gender: find(SEX_PATTERN),
            year_of_birth: find(BIRTH_PATTERN),
            region: find(REGION_PATTERN),
            infection_group: find(GROUP_PATTERN),
            infection_reason: find(REASON_PATTERN),
            order_of_transmission: find(ORDER_PATTERN),
            infected_by: find(INFECTED_BY_PATTERN),
            infection_status: find(STATE_PATTERN),
        }
    }

    /// The raw values as reported back to callers of a synthesis run.
    #[must_use]
    pub fn to_row(&self) -> CaseRow {
        CaseRow {
            id: self.patient_id.to_json(),
            gender: self.gender.to_json(),
            year_of_birth: self.year_of_birth.to_json(),
            address: self.region.to_json(),
            infection_by_description: self.infection_group.to_json(),
            infection_by_relationship: self.infection_reason.to_json(),
            order_of_transmission: self.order_of_transmission.to_json(),
            infection_by_object: self.infected_by.to_json(),
            infection_status: self.infection_status.to_json(),
        }
    }
}

/// Raw extracted values of one synthesized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRow {
    pub id: Value,
    pub gender: Value,
    #[serde(rename = "yearOfBirth")]
    pub year_of_birth: Value,
    pub address: Value,
    #[serde(rename = "infectionBy_description")]
    pub infection_by_description: Value,
    #[serde(rename = "infectionBy_relationship")]
    pub infection_by_relationship: Value,
    #[serde(rename = "orderOfTransmission")]
    pub order_of_transmission: Value,
    #[serde(rename = "infectionBy_object")]
    pub infection_by_object: Value,
    #[serde(rename = "infectionStatus")]
    pub infection_status: Value,
}

// =============================================================================
// SYNTHESIZER
// =============================================================================

/// A source record that produced no entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// `_key` of the source record, when it has one.
    pub key: Option<String>,
    pub reason: String,
}

/// Summary of one synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisReport {
    /// Extracted values of every synthesized record, in source order.
    pub rows: Vec<CaseRow>,
    /// Number of entities written.
    pub inserted: usize,
    pub skipped: Vec<SkippedRecord>,
    /// Entity ids that now occur more than once in the target collection.
    pub duplicate_ids: Vec<String>,
}

/// Builds case entities from extracted fields.
#[derive(Debug, Clone, Default)]
pub struct EntitySynthesizer {
    namespace: NgsiNamespace,
}

impl EntitySynthesizer {
    #[must_use]
    pub fn new(namespace: NgsiNamespace) -> Self {
        Self { namespace }
    }

    #[must_use]
    pub fn namespace(&self) -> &NgsiNamespace {
        &self.namespace
    }

    /// Build the entity for one record's fields.
    ///
    /// Returns `Ok(None)` when the record has no usable patient value, since
    /// no id can be formed for it.
    pub fn synthesize(&self, fields: &CaseFields) -> Result<Option<EntityDocument>, CasegraphError> {
        let Some(patient) = fields.patient_id.as_text() else {
            return Ok(None);
        };
        let ns = &self.namespace;

        let address = PostalAddress {
            address_country: ns.address_country.clone(),
            address_region: fields.region.to_json(),
            address_locality: None,
            street_address: None,
        };

        let routes = (0..TRAVEL_ROUTE_PLACEHOLDERS)
            .map(|_| TravelRoute::placeholder(&ns.address_country))
            .collect::<Result<Vec<_>, _>>()?;

        let spreader_target = ns.case_id(&fields.infected_by.as_text().unwrap_or_default());
        let spreader_info = json!({
            "type": "Property",
            "value": {
                "relationship": fields.infection_reason.to_json(),
                "description": fields.infection_group.to_json(),
            }
        });

        let entity = EntityDocument::new(ns.case_id(&patient), ns.entity_type.as_str())
            .with("yearOfBirth", Property::value(fields.year_of_birth.to_json()))
            .with("gender", Property::value(fields.gender.to_json()))
            .with("address", Property::from_serializable(&address)?)
            .with("diseaseCode", Property::value(ns.disease_code.as_str()))
            .with("infectionStatus", Property::value(fields.infection_status.to_json()))
            .with(
                "orderOfTransmission",
                Property::value(fields.order_of_transmission.to_json()),
            )
            .with("travelRoutes", Property::from_serializable(&routes)?)
            .with(
                "spreader",
                Property::relationship(spreader_target).with_extra("spreaderInfo", spreader_info),
            );

        Ok(Some(entity))
    }

    /// Synthesize entities for every record of `source` and append them to
    /// `target` in one atomic batch.
    pub fn run<S: DocumentStore>(
        &self,
        store: &mut S,
        source: &str,
        target: &str,
    ) -> Result<SynthesisReport, CasegraphError> {
        ensure_kind(store, target, CollectionKind::Document)?;

        let mut report = SynthesisReport::default();
        let mut entities = Vec::new();
        let mut id_counts: BTreeMap<String, usize> = BTreeMap::new();

        for existing in store.scan(target)? {
            if let Some(Value::String(id)) = existing.get("id") {
                *id_counts.entry(id.clone()).or_default() += 1;
            }
        }

        for record in store.scan(source)? {
            let fields = CaseFields::extract(&record);
            match self.synthesize(&fields)? {
                Some(entity) => {
                    *id_counts.entry(entity.id.clone()).or_default() += 1;
                    entities.push(entity.to_document()?);
                    report.rows.push(fields.to_row());
                }
                None => report.skipped.push(SkippedRecord {
                    key: record
                        .get(KEY_FIELD)
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    reason: format!(
                        "no scalar field matching '{}' to build an id from",
                        PATIENT_PATTERN
                    ),
                }),
            }
        }

        report.inserted = store.insert_batch(target, entities)?.len();
        report.duplicate_ids = id_counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id)
            .collect();

        Ok(report)
    }
}

/// Fail unless `name` exists with the given kind.
pub(crate) fn ensure_kind<S: DocumentStore>(
    store: &S,
    name: &str,
    expected: CollectionKind,
) -> Result<(), CasegraphError> {
    let info = store
        .collection(name)?
        .ok_or_else(|| CasegraphError::CollectionNotFound(name.to_string()))?;
    if info.kind != expected {
        return Err(CasegraphError::CollectionKindMismatch {
            name: name.to_string(),
            expected,
            actual: info.kind,
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn record(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn sample_record() -> Document {
        record(json!({
            "patient_id": "7",
            "sex": "F",
            "birth_year": "1990",
            "region": "Seoul",
            "group": "cluster-A",
            "reason": "contact",
            "order_num": "3",
            "by_patient": "4",
            "state": "released"
        }))
    }

    #[test]
    fn extracts_every_target() {
        let fields = CaseFields::extract(&sample_record());
        assert_eq!(fields.patient_id.as_text().as_deref(), Some("7"));
        assert_eq!(fields.gender.as_text().as_deref(), Some("F"));
        assert_eq!(fields.year_of_birth.as_text().as_deref(), Some("1990"));
        assert_eq!(fields.region.as_text().as_deref(), Some("Seoul"));
        assert_eq!(fields.infection_group.as_text().as_deref(), Some("cluster-A"));
        assert_eq!(fields.infection_reason.as_text().as_deref(), Some("contact"));
        assert_eq!(fields.order_of_transmission.as_text().as_deref(), Some("3"));
        assert_eq!(fields.infected_by.as_text().as_deref(), Some("4"));
        assert_eq!(fields.infection_status.as_text().as_deref(), Some("released"));
    }

    #[test]
    fn synthesizes_scenario_entity() {
        let synth = EntitySynthesizer::default();
        let fields = CaseFields::extract(&sample_record());
        let entity = synth.synthesize(&fields).expect("synth").expect("entity");
        let doc = entity.to_document().expect("doc");

        assert_eq!(doc["id"], json!("urn:covid-10:case:007"));
        assert_eq!(doc["type"], json!("InfectionCase"));
        assert_eq!(doc["spreader"]["type"], json!("Relationship"));
        assert_eq!(doc["spreader"]["object"], json!("urn:covid-10:case:004"));
        assert_eq!(
            doc["spreader"]["spreaderInfo"]["value"],
            json!({"relationship": "contact", "description": "cluster-A"})
        );
        assert_eq!(doc["address"]["value"]["addressRegion"], json!("Seoul"));
        assert_eq!(doc["address"]["value"]["addressCountry"], json!("KR"));
        assert_eq!(doc["diseaseCode"]["value"], json!("COVID-19"));
        assert_eq!(doc["infectionStatus"]["value"], json!("released"));
        assert_eq!(doc["orderOfTransmission"]["value"], json!("3"));
        assert_eq!(doc["yearOfBirth"]["value"], json!("1990"));
    }

    #[test]
    fn travel_routes_are_placeholders() {
        let synth = EntitySynthesizer::default();
        let fields = CaseFields::extract(&sample_record());
        let doc = synth
            .synthesize(&fields)
            .expect("synth")
            .expect("entity")
            .to_document()
            .expect("doc");

        let routes = doc["travelRoutes"]["value"].as_array().expect("array");
        assert_eq!(routes.len(), TRAVEL_ROUTE_PLACEHOLDERS);
        for route in routes {
            assert_eq!(route["placeName"], json!(""));
            assert_eq!(route["location"]["value"]["coordinates"], json!([0, 0]));
        }
    }

    #[test]
    fn missing_fields_become_null() {
        let synth = EntitySynthesizer::default();
        let fields = CaseFields::extract(&record(json!({"patient_id": 12})));
        let doc = synth
            .synthesize(&fields)
            .expect("synth")
            .expect("entity")
            .to_document()
            .expect("doc");

        assert_eq!(doc["id"], json!("urn:covid-10:case:0012"));
        assert_eq!(doc["gender"]["value"], Value::Null);
        assert_eq!(doc["address"]["value"]["addressRegion"], Value::Null);
        // Blank spreader target: the prefix alone.
        assert_eq!(doc["spreader"]["object"], json!("urn:covid-10:case:00"));
    }

    #[test]
    fn record_without_patient_is_skipped() {
        let synth = EntitySynthesizer::default();
        let fields = CaseFields::extract(&record(json!({"sex": "M"})));
        assert!(synth.synthesize(&fields).expect("synth").is_none());
    }

    #[test]
    fn blank_case_id_detection() {
        let ns = NgsiNamespace::default();
        assert!(ns.is_blank_case_id("urn:covid-10:case:00"));
        assert!(ns.is_blank_case_id("urn:covid-10:case:00 "));
        assert!(!ns.is_blank_case_id("urn:covid-10:case:004"));
        assert!(!ns.is_blank_case_id("something-else"));
    }

    #[test]
    fn run_writes_entities_and_reports() {
        let mut store = MemoryStore::new();
        store.create_collection("originCSV", CollectionKind::Document).expect("create");
        store.create_collection("patientJSON", CollectionKind::Document).expect("create");
        store.insert("originCSV", sample_record()).expect("insert");
        store.insert("originCSV", record(json!({"sex": "M"}))).expect("insert");
        store.insert("originCSV", sample_record()).expect("insert");

        let report = EntitySynthesizer::default()
            .run(&mut store, "originCSV", "patientJSON")
            .expect("run");

        assert_eq!(report.inserted, 2);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].id, json!("7"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key.as_deref(), Some("2"));
        assert_eq!(report.duplicate_ids, vec!["urn:covid-10:case:007".to_string()]);
        assert_eq!(store.count("patientJSON").expect("count"), 2);
    }

    #[test]
    fn run_rejects_edge_target() {
        let mut store = MemoryStore::new();
        store.create_collection("originCSV", CollectionKind::Document).expect("create");
        store.create_collection("patientEdge", CollectionKind::Edge).expect("create");

        let err = EntitySynthesizer::default()
            .run(&mut store, "originCSV", "patientEdge")
            .expect_err("edge target");
        assert!(matches!(err, CasegraphError::CollectionKindMismatch { .. }));
    }

    #[test]
    fn custom_namespace_is_applied() {
        let synth = EntitySynthesizer::new(NgsiNamespace {
            case_id_prefix: "urn:test:".to_string(),
            entity_type: "Case".to_string(),
            disease_code: "X".to_string(),
            address_country: "FR".to_string(),
        });
        let doc = synth
            .synthesize(&CaseFields::extract(&sample_record()))
            .expect("synth")
            .expect("entity")
            .to_document()
            .expect("doc");

        assert_eq!(doc["id"], json!("urn:test:7"));
        assert_eq!(doc["type"], json!("Case"));
        assert_eq!(doc["address"]["value"]["addressCountry"], json!("FR"));
        assert_eq!(synth.namespace().disease_code, "X");
    }
}

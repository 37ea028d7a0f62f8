//! Final assembly: edge records, source-side relationship lists and the
//! distinct service/include rollups.

use crate::schema::{EntityDef, RelationshipEdge, SchemaDocument};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Merge the pipeline's parts into the output document. For each edge
/// whose source entity exists, the target joins that source entity's
/// `relationships` list (FK materialization mutated the target side;
/// this pass augments the source side). Runs once per compile; the
/// list-append merges are not idempotent across reruns.
pub fn assemble(
    mut entities: BTreeMap<String, EntityDef>,
    edges: Vec<RelationshipEdge>,
    dictionaries: Map<String, Value>,
) -> SchemaDocument {
    for edge in &edges {
        if let Some(source) = entities.get_mut(&edge.source) {
            if !source.relationships.contains(&edge.target) {
                source.relationships.push(edge.target.clone());
            }
        }
    }

    let mut services = Vec::new();
    let mut included_entities = Vec::new();
    for entity in entities.values() {
        for service in &entity.services {
            if !services.contains(service) {
                services.push(service.clone());
            }
        }
        for include in &entity.includes {
            if !included_entities.contains(include) {
                included_entities.push(include.clone());
            }
        }
    }

    SchemaDocument {
        relationships: edges,
        dictionaries,
        services,
        included_entities,
        entities,
    }
}

//! Foreign-key materialization: each relationship edge plants an
//! `ObjectId` field on its target entity.

use crate::schema::{fk_field_name, EntityDef, FieldDef, RelationshipEdge};
use serde_json::Value;
use std::collections::BTreeMap;

/// For every edge whose target is a known entity, force the field
/// `lowerFirst(source) + "Id"` to `{type: ObjectId, required: true}`
/// on the target. A manually declared field keeps its other
/// attributes; only `type` and `required` are forced. Edges naming an
/// unknown target are dropped without error.
pub fn materialize_foreign_keys(
    entities: &mut BTreeMap<String, EntityDef>,
    edges: &[RelationshipEdge],
) {
    for edge in edges {
        let Some(target) = entities.get_mut(&edge.target) else {
            continue;
        };
        let field = target
            .fields
            .entry(fk_field_name(&edge.source))
            .or_insert_with(|| FieldDef::new("ObjectId"));
        field.typ = "ObjectId".to_string();
        field.attrs.insert("required".to_string(), Value::Bool(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edge(source: &str, target: &str) -> RelationshipEdge {
        RelationshipEdge {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn test_synthesizes_fk_field() {
        let mut entities = BTreeMap::new();
        entities.insert("User".to_string(), EntityDef::default());
        materialize_foreign_keys(&mut entities, &[edge("Account", "User")]);

        let field = &entities["User"].fields["accountId"];
        assert_eq!(field.typ, "ObjectId");
        assert_eq!(field.attrs["required"], json!(true));
    }

    #[test]
    fn test_manual_field_keeps_extra_attributes() {
        let mut entities = BTreeMap::new();
        let mut user = EntityDef::default();
        let mut manual = FieldDef::new("String");
        manual.ui_mut().insert("label".into(), json!("Owner"));
        user.fields.insert("accountId".to_string(), manual);
        entities.insert("User".to_string(), user);

        materialize_foreign_keys(&mut entities, &[edge("Account", "User")]);

        let field = &entities["User"].fields["accountId"];
        assert_eq!(field.typ, "ObjectId");
        assert_eq!(field.attrs["required"], json!(true));
        assert_eq!(field.attrs["ui"], json!({"label": "Owner"}));
    }

    #[test]
    fn test_single_letter_source_merges_with_manual_field() {
        let mut entities = BTreeMap::new();
        let mut b = EntityDef::default();
        let mut manual = FieldDef::new("String");
        manual.ui_mut().insert("label".into(), json!("Parent"));
        b.fields.insert("aId".to_string(), manual);
        entities.insert("B".to_string(), b);

        materialize_foreign_keys(&mut entities, &[edge("A", "B")]);

        // The manual `aId` is the FK field, not a second synthesized one.
        assert_eq!(entities["B"].fields.len(), 1);
        let field = &entities["B"].fields["aId"];
        assert_eq!(field.typ, "ObjectId");
        assert_eq!(field.attrs["required"], json!(true));
        assert_eq!(field.attrs["ui"], json!({"label": "Parent"}));
    }

    #[test]
    fn test_unknown_target_dropped_silently() {
        let mut entities = BTreeMap::new();
        entities.insert("User".to_string(), EntityDef::default());
        materialize_foreign_keys(&mut entities, &[edge("User", "Ghost")]);
        assert!(entities["User"].fields.is_empty());
        assert!(!entities.contains_key("Ghost"));
    }
}

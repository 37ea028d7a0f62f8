use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Final output of one compile call. Built once, write-once per pass,
/// immutable after assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDocument {
    #[serde(rename = "_relationships")]
    pub relationships: Vec<RelationshipEdge>,
    #[serde(rename = "_dictionaries")]
    pub dictionaries: Map<String, Value>,
    #[serde(rename = "_services")]
    pub services: Vec<String>,
    #[serde(rename = "_included_entities")]
    pub included_entities: Vec<String>,
    #[serde(rename = "_entities")]
    pub entities: BTreeMap<String, EntityDef>,
}

/// One `Source ||--o{ Target` edge, in file order. Duplicates are kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityDef {
    pub fields: BTreeMap<String, FieldDef>,
    #[serde(rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    /// Subset of "crud". First `@operations` writer wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub ui: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uniques: Vec<Vec<String>>,
    /// Target entity names reachable from this entity.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<String>,
    /// Abstraction names pulled in via `@include`, feeds `_included_entities`.
    #[serde(skip)]
    pub includes: Vec<String>,
}

/// A field is its type plus an open attribute map (`required`, validation
/// attributes, nested `ui`, optional `show`). The map flattens into the
/// field object on serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl FieldDef {
    pub fn new(typ: impl Into<String>) -> Self {
        Self {
            typ: typ.into(),
            attrs: Map::new(),
        }
    }

    /// The field's `ui` map, created (or coerced to an object) on demand.
    pub fn ui_mut(&mut self) -> &mut Map<String, Value> {
        object_entry(&mut self.attrs, "ui")
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Foreign-key field name for a source/foreign entity: `Account` -> `accountId`.
pub fn fk_field_name(entity: &str) -> String {
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => format!("{}{}Id", first.to_lowercase(), chars.as_str()),
        None => "Id".to_string(),
    }
}

/// Fetch `map[key]` as a mutable object, inserting an empty object if the
/// key is missing and replacing any non-object value already there.
pub fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(obj) => obj,
        _ => unreachable!(),
    }
}

/// Key-by-key shallow merge, later wins.
pub fn shallow_merge(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (k, v) in src {
        dst.insert(k, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fk_field_name() {
        assert_eq!(fk_field_name("Account"), "accountId");
        assert_eq!(fk_field_name("account"), "accountId");
        assert_eq!(fk_field_name("User"), "userId");
        assert_eq!(fk_field_name("A"), "aId");
    }

    #[test]
    fn test_field_serializes_flat() {
        let mut field = FieldDef::new("String");
        field.attrs.insert("min_length".into(), json!(3));
        field.ui_mut().insert("label".into(), json!("Name"));

        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(
            value,
            json!({"type": "String", "min_length": 3, "ui": {"label": "Name"}})
        );
    }

    #[test]
    fn test_entity_skips_empty_sections() {
        let entity = EntityDef::default();
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value, serde_json::json!({"fields": {}}));
    }

    #[test]
    fn test_shallow_merge_later_wins() {
        let mut dst = Map::new();
        dst.insert("a".into(), json!(1));
        dst.insert("b".into(), json!(2));
        let mut src = Map::new();
        src.insert("b".into(), json!(3));
        src.insert("c".into(), json!(4));
        shallow_merge(&mut dst, src);
        assert_eq!(
            Value::Object(dst),
            json!({"a": 1, "b": 3, "c": 4})
        );
    }
}

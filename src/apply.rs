//! Entity and field decorator application. Raw chunks captured by the
//! scanner run through the tokenizer and dispatch through name→handler
//! tables; unrecognized decorator names are ignored.

use crate::decorator::{tokenize, DecoratorToken};
use crate::schema::{fk_field_name, object_entry, shallow_merge, EntityDef, FieldDef};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid @{decorator} payload on {context}: {raw}")]
    Payload {
        decorator: &'static str,
        context: String,
        raw: String,
    },
    #[error("@include on {entity} references unknown abstraction '{name}'")]
    UnknownAbstraction { entity: String, name: String },
}

type EntityHandler =
    fn(&mut BTreeMap<String, EntityDef>, &str, &DecoratorToken) -> Result<(), ApplyError>;

const ENTITY_HANDLERS: &[(&str, EntityHandler)] = &[
    ("abstract", apply_abstract),
    ("include", apply_include),
    ("service", apply_service),
    ("operations", apply_operations),
    ("ui", apply_entity_ui),
    ("unique", apply_entity_unique),
    ("show", apply_show),
];

type FieldHandler = fn(&mut EntityDef, &str, &str, &DecoratorToken) -> Result<(), ApplyError>;

const FIELD_HANDLERS: &[(&str, FieldHandler)] = &[
    ("validate", apply_validate),
    ("ui", apply_field_ui),
    ("unique", apply_field_unique),
];

/// Run entity-level decorators in declaration order. Must run before
/// the field pass so `@include` copies fully scanned field sets.
pub fn apply_entity_decorators(
    entities: &mut BTreeMap<String, EntityDef>,
    order: &[String],
    chunks: &BTreeMap<String, Vec<String>>,
) -> Result<(), ApplyError> {
    for entity in order {
        let Some(raw_chunks) = chunks.get(entity) else {
            continue;
        };
        for chunk in raw_chunks {
            for token in tokenize(chunk) {
                if let Some(handler) = lookup(ENTITY_HANDLERS, &token.name) {
                    handler(entities, entity, &token)?;
                }
            }
        }
    }
    Ok(())
}

/// Run field-level decorators per `(entity, field)` chunk list, in
/// field declaration order so list appends (`@unique`) land in source
/// order.
pub fn apply_field_decorators(
    entities: &mut BTreeMap<String, EntityDef>,
    order: &[(String, String)],
    chunks: &BTreeMap<(String, String), Vec<String>>,
) -> Result<(), ApplyError> {
    for key in order {
        let Some(raw_chunks) = chunks.get(key) else {
            continue;
        };
        let (entity_name, field_name) = key;
        let Some(entity) = entities.get_mut(entity_name) else {
            continue;
        };
        for chunk in raw_chunks {
            for token in tokenize(chunk) {
                if let Some(handler) = lookup(FIELD_HANDLERS, &token.name) {
                    handler(entity, entity_name, field_name, &token)?;
                }
            }
        }
    }
    Ok(())
}

fn lookup<H: Copy>(table: &[(&str, H)], name: &str) -> Option<H> {
    table.iter().find(|(n, _)| *n == name).map(|(_, h)| *h)
}

fn parse_object(
    raw: &str,
    decorator: &'static str,
    context: &str,
) -> Result<Map<String, Value>, ApplyError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApplyError::Payload {
            decorator,
            context: context.to_string(),
            raw: raw.to_string(),
        }),
    }
}

fn apply_abstract(
    entities: &mut BTreeMap<String, EntityDef>,
    entity: &str,
    _token: &DecoratorToken,
) -> Result<(), ApplyError> {
    if let Some(def) = entities.get_mut(entity) {
        def.is_abstract = true;
    }
    Ok(())
}

/// `@include Base [{"displayAfterField": "..."}]`: deep-copy the
/// abstraction's fields into this entity (copied field wins on name
/// collision) and extend its unique/relationship/service lists. Copied
/// fields get `ui.displayAfterField` from a per-include descending
/// counter starting at "-1", unless the payload supplies a non-empty
/// override.
fn apply_include(
    entities: &mut BTreeMap<String, EntityDef>,
    entity: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let name = token.field_hint.clone().unwrap_or_default();
    let source = match entities.get(&name) {
        Some(def) if !def.fields.is_empty() => def.clone(),
        _ => {
            return Err(ApplyError::UnknownAbstraction {
                entity: entity.to_string(),
                name,
            });
        }
    };

    let override_position = match &token.payload {
        Some(raw) => {
            let payload = parse_object(raw, "include", entity)?;
            payload
                .get("displayAfterField")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        }
        None => None,
    };

    let Some(dest) = entities.get_mut(entity) else {
        return Ok(());
    };
    dest.uniques.extend(source.uniques.iter().cloned());
    dest.relationships.extend(source.relationships.iter().cloned());
    dest.services.extend(source.services.iter().cloned());
    dest.includes.push(name);

    // Counter restarts for every include application.
    let mut position = -1i64;
    for (field_name, field) in &source.fields {
        let mut copied = field.clone();
        let display = match &override_position {
            Some(explicit) => explicit.clone(),
            None => {
                let value = position.to_string();
                position -= 1;
                value
            }
        };
        copied
            .ui_mut()
            .insert("displayAfterField".to_string(), Value::String(display));
        dest.fields.insert(field_name.clone(), copied);
    }
    Ok(())
}

fn apply_service(
    entities: &mut BTreeMap<String, EntityDef>,
    entity: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let (Some(def), Some(name)) = (entities.get_mut(entity), &token.field_hint) else {
        return Ok(());
    };
    def.services.push(name.clone());
    Ok(())
}

/// `@operations`: a JSON array of words maps through create/read/
/// update/delete → c/r/u/d; a JSON string is used verbatim; a bare hint
/// is used as-is. Only the first writer sets the value.
fn apply_operations(
    entities: &mut BTreeMap<String, EntityDef>,
    entity: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let value = match (&token.payload, &token.field_hint) {
        (Some(raw), _) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(words)) => words
                .iter()
                .filter_map(Value::as_str)
                .filter_map(operation_letter)
                .collect(),
            Ok(Value::String(s)) => s,
            _ => {
                return Err(ApplyError::Payload {
                    decorator: "operations",
                    context: entity.to_string(),
                    raw: raw.clone(),
                });
            }
        },
        (None, Some(hint)) => {
            serde_json::from_str::<String>(hint).unwrap_or_else(|_| hint.clone())
        }
        (None, None) => return Ok(()),
    };
    if let Some(def) = entities.get_mut(entity) {
        if def.operations.is_none() {
            def.operations = Some(value);
        }
    }
    Ok(())
}

fn operation_letter(word: &str) -> Option<char> {
    match word {
        "create" => Some('c'),
        "read" => Some('r'),
        "update" => Some('u'),
        "delete" => Some('d'),
        _ => None,
    }
}

fn apply_entity_ui(
    entities: &mut BTreeMap<String, EntityDef>,
    entity: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let Some(raw) = &token.payload else {
        return Ok(());
    };
    let payload = parse_object(raw, "ui", entity)?;
    if let Some(def) = entities.get_mut(entity) {
        shallow_merge(&mut def.ui, payload);
    }
    Ok(())
}

fn apply_entity_unique(
    entities: &mut BTreeMap<String, EntityDef>,
    entity: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let Some(hint) = &token.field_hint else {
        return Ok(());
    };
    let fields: Vec<String> = hint
        .split('+')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if fields.is_empty() {
        return Ok(());
    }
    if let Some(def) = entities.get_mut(entity) {
        def.uniques.push(fields);
    }
    Ok(())
}

/// `@show Foreign [payload]`: attach a show spec to the FK field
/// `lowerFirst(Foreign)+"Id"`, creating the field if the relationship
/// has not materialized it. An array payload is the displayInfo list;
/// an object payload may carry `endpoint` and `displayInfo`. Only
/// entries with both `displayPages` and `fields` are kept.
fn apply_show(
    entities: &mut BTreeMap<String, EntityDef>,
    entity: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let Some(foreign) = &token.field_hint else {
        return Ok(());
    };

    let mut endpoint = foreign.to_lowercase();
    let mut display_info: Vec<Value> = Vec::new();
    if let Some(raw) = &token.payload {
        let parsed: Value = serde_json::from_str(raw).map_err(|_| ApplyError::Payload {
            decorator: "show",
            context: entity.to_string(),
            raw: raw.clone(),
        })?;
        let entries = match &parsed {
            Value::Array(entries) => entries.as_slice(),
            Value::Object(spec) => {
                if let Some(explicit) = spec.get("endpoint").and_then(Value::as_str) {
                    endpoint = explicit.to_string();
                }
                match spec.get("displayInfo").and_then(Value::as_array) {
                    Some(entries) => entries.as_slice(),
                    None => &[],
                }
            }
            _ => {
                return Err(ApplyError::Payload {
                    decorator: "show",
                    context: entity.to_string(),
                    raw: raw.clone(),
                });
            }
        };
        for entry in entries {
            if entry.get("displayPages").is_some() && entry.get("fields").is_some() {
                display_info.push(entry.clone());
            }
        }
    }

    let Some(def) = entities.get_mut(entity) else {
        return Ok(());
    };
    let field = def
        .fields
        .entry(fk_field_name(foreign))
        .or_insert_with(|| {
            let mut fk = FieldDef::new("ObjectId");
            fk.attrs.insert("required".to_string(), Value::Bool(true));
            fk
        });
    let show = object_entry(&mut field.attrs, "show");
    show.insert("endpoint".to_string(), Value::String(endpoint));
    let list = show
        .entry("displayInfo".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !list.is_array() {
        *list = Value::Array(Vec::new());
    }
    if let Value::Array(existing) = list {
        existing.extend(display_info);
    }
    Ok(())
}

fn apply_validate(
    entity: &mut EntityDef,
    entity_name: &str,
    field_name: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let Some(raw) = &token.payload else {
        return Ok(());
    };
    let payload = parse_object(raw, "validate", &format!("{entity_name}.{field_name}"))?;
    if let Some(field) = entity.fields.get_mut(field_name) {
        shallow_merge(&mut field.attrs, payload);
    }
    Ok(())
}

/// `@ui` on a field: only FK (`ObjectId`) fields may carry a `show`
/// spec, so `show` is stripped from the payload for any other type.
fn apply_field_ui(
    entity: &mut EntityDef,
    entity_name: &str,
    field_name: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let Some(raw) = &token.payload else {
        return Ok(());
    };
    let mut payload = parse_object(raw, "ui", &format!("{entity_name}.{field_name}"))?;
    if let Some(field) = entity.fields.get_mut(field_name) {
        if field.typ != "ObjectId" {
            payload.remove("show");
        }
        shallow_merge(field.ui_mut(), payload);
    }
    Ok(())
}

fn apply_field_unique(
    entity: &mut EntityDef,
    _entity_name: &str,
    field_name: &str,
    token: &DecoratorToken,
) -> Result<(), ApplyError> {
    let mut fields = vec![field_name.to_string()];
    if let Some(hint) = &token.field_hint {
        fields.extend(
            hint.split('+')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    entity.uniques.push(fields);
    Ok(())
}

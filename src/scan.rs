//! Line scanners: three independent passes over the raw source that
//! extract structure without interpreting decorator semantics.

use crate::schema::{EntityDef, FieldDef, RelationshipEdge};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const REL_TOKEN: &str = "||--o{";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("dictionary '{name}' payload is not a JSON object: {line}")]
    DictionaryPayload { name: String, line: String },
}

/// Entity shells plus the raw decorator text each later pass consumes.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub entities: BTreeMap<String, EntityDef>,
    /// Entity declaration order, drives deterministic decorator application.
    pub order: Vec<String>,
    /// Field declaration order as `(entity, field)`, same purpose.
    pub field_order: Vec<(String, String)>,
    /// Raw entity-level decorator chunks, in source order per entity.
    pub entity_chunks: BTreeMap<String, Vec<String>>,
    /// Raw field-level decorator chunks keyed by `(entity, field)`.
    pub field_chunks: BTreeMap<(String, String), Vec<String>>,
}

/// Collect `%% @dictionary <name> <json-object>` lines. Same-named
/// declarations merge key-by-key, later wins. A missing payload is an
/// empty object; a non-object payload is an error.
pub fn scan_dictionaries(source: &str) -> Result<Map<String, Value>, ScanError> {
    let mut dictionaries = Map::new();
    for line in source.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with("%%") {
            continue;
        }
        let Some(idx) = trimmed.find("@dictionary") else {
            continue;
        };
        let rest = trimmed[idx + "@dictionary".len()..].trim();
        let (name, payload) = match rest.find(char::is_whitespace) {
            Some(split) => (&rest[..split], rest[split..].trim()),
            None => (rest, ""),
        };
        if name.is_empty() {
            continue;
        }

        let value: Value = if payload.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(payload).map_err(|_| ScanError::DictionaryPayload {
                name: name.to_string(),
                line: trimmed.to_string(),
            })?
        };
        let Value::Object(object) = value else {
            return Err(ScanError::DictionaryPayload {
                name: name.to_string(),
                line: trimmed.to_string(),
            });
        };

        let slot = dictionaries
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(existing) = slot {
            for (k, v) in object {
                existing.insert(k, v);
            }
        }
    }
    Ok(dictionaries)
}

/// Walk the source once, collecting entity shells, field shells (type
/// only) and raw decorator text. No decorator interpretation happens
/// here. Lines that match nothing are ignored.
pub fn scan_entities(source: &str) -> ScanResult {
    let mut result = ScanResult::default();
    let mut current: Option<String> = None;

    for line in source.lines() {
        let line = line.trim();

        if let Some(entity_name) = current.clone() {
            if line == "}" {
                current = None;
                continue;
            }
            scan_body_line(&mut result, &entity_name, line);
            continue;
        }

        let Some((name, trailing)) = entity_open(line) else {
            continue;
        };
        if !result.entities.contains_key(name) {
            result.entities.insert(name.to_string(), EntityDef::default());
            result.order.push(name.to_string());
        }

        // A trailing lone `}` closes the entity on its opening line; the
        // text between the braces is ordinary body content. Without it
        // the trailing text is entity-level decorator text (the one-line
        // `Entity { %% @abstract` open form).
        let (body, closed) = match trailing.strip_suffix('}') {
            Some(inner) if trailing.split_whitespace().next_back() == Some("}") => {
                (inner.trim(), true)
            }
            _ => (trailing, false),
        };
        if closed {
            scan_body_line(&mut result, name, body);
        } else {
            if !body.is_empty() {
                result
                    .entity_chunks
                    .entry(name.to_string())
                    .or_default()
                    .push(body.to_string());
            }
            current = Some(name.to_string());
        }
    }
    result
}

/// One line inside an entity body: `%%` text is raw entity-level
/// decorator text; anything else is a `Type name ...rest` field line.
/// Fewer than two tokens is not an error, the line just does not match.
fn scan_body_line(result: &mut ScanResult, entity_name: &str, line: &str) {
    if line.is_empty() {
        return;
    }
    if line.starts_with("%%") {
        result
            .entity_chunks
            .entry(entity_name.to_string())
            .or_default()
            .push(line.to_string());
        return;
    }

    let Some((typ, field_name, rest)) = split_field_line(line) else {
        return;
    };
    let entity = result
        .entities
        .entry(entity_name.to_string())
        .or_default();
    let is_new = !entity.fields.contains_key(field_name);
    entity
        .fields
        .entry(field_name.to_string())
        .and_modify(|f| f.typ = typ.to_string())
        .or_insert_with(|| FieldDef::new(typ));
    if is_new {
        result
            .field_order
            .push((entity_name.to_string(), field_name.to_string()));
    }
    if rest.contains('@') {
        result
            .field_chunks
            .entry((entity_name.to_string(), field_name.to_string()))
            .or_default()
            .push(rest.to_string());
    }
}

/// Collect every `Source ||--o{ Target [: label]` edge in file order,
/// duplicates preserved. Edges naming unknown entities are kept here;
/// later passes decide what to do with them.
pub fn scan_relationships(source: &str) -> Vec<RelationshipEdge> {
    let mut edges = Vec::new();
    for line in source.lines() {
        let Some(idx) = line.find(REL_TOKEN) else {
            continue;
        };
        let source_name = line[..idx].trim();
        let mut target = &line[idx + REL_TOKEN.len()..];
        if let Some(colon) = target.find(':') {
            target = &target[..colon];
        }
        let target = target.trim().trim_end_matches('}').trim();
        if source_name.is_empty() || target.is_empty() {
            continue;
        }
        edges.push(RelationshipEdge {
            source: source_name.to_string(),
            target: target.to_string(),
        });
    }
    edges
}

/// Match an entity-opening line: first token is the name, second token
/// is `{`. Text after the brace is entity-level decorator text, which
/// supports the one-line form `Entity { %% @abstract`.
fn entity_open(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() || line.starts_with("%%") || line.contains(REL_TOKEN) {
        return None;
    }
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    match tokens.next() {
        Some("{") => {
            let brace = line.find('{')?;
            Some((first, line[brace + 1..].trim()))
        }
        // `Name{` with no space before the brace.
        None if first.len() > 1 && first.ends_with('{') => {
            Some((&first[..first.len() - 1], ""))
        }
        _ => None,
    }
}

fn split_field_line(line: &str) -> Option<(&str, &str, &str)> {
    let typ_end = line.find(char::is_whitespace)?;
    let (typ, rem) = line.split_at(typ_end);
    let rem = rem.trim_start();
    let name_end = rem.find(char::is_whitespace).unwrap_or(rem.len());
    let (name, rest) = rem.split_at(name_end);
    if name.is_empty() {
        return None;
    }
    Some((typ, name, rest.trim_start()))
}

pub mod apply;
pub mod assemble;
pub mod decorator;
pub mod fk;
pub mod scan;
pub mod schema;

use wasm_bindgen::prelude::*;

pub use schema::{EntityDef, FieldDef, RelationshipEdge, SchemaDocument};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Scan error: {0}")]
    Scan(#[from] scan::ScanError),
    #[error("Apply error: {0}")]
    Apply(#[from] apply::ApplyError),
}

/// Compile `.mmd` schema source into a structured schema document.
///
/// Pure function over the source text: scanners run first, then FK
/// materialization, then entity decorators (so `@include` sees fully
/// scanned field sets), then field decorators, then assembly. Each call
/// builds a fresh document; nothing is shared across calls.
pub fn compile(source: &str) -> Result<SchemaDocument, CompileError> {
    let dictionaries = scan::scan_dictionaries(source)?;
    let mut scanned = scan::scan_entities(source);
    let edges = scan::scan_relationships(source);

    fk::materialize_foreign_keys(&mut scanned.entities, &edges);
    apply::apply_entity_decorators(&mut scanned.entities, &scanned.order, &scanned.entity_chunks)?;
    apply::apply_field_decorators(
        &mut scanned.entities,
        &scanned.field_order,
        &scanned.field_chunks,
    )?;

    Ok(assemble::assemble(scanned.entities, edges, dictionaries))
}

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Compile schema source to YAML text
#[wasm_bindgen(js_name = "compileSchema")]
pub fn compile_schema(source: &str) -> Result<String, String> {
    let document = compile(source).map_err(|e| e.to_string())?;
    serde_yaml::to_string(&document).map_err(|e| e.to_string())
}

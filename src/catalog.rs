//! Catalog - read-only reference data served by the emulators
//!
//! Google machine types and Oracle shapes do not change during a test, so they are
//! embedded as JSON at compile time and parsed once.

use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Embedded catalog files (compiled into the binary)
const GOOGLE_MACHINE_TYPES: &str = include_str!("resources/google_machine_types.json");
const ORACLE_SHAPES: &str = include_str!("resources/oracle_shapes.json");

/// Root structure of the catalog files
#[derive(Debug, Clone, Deserialize, Default)]
struct CatalogFile {
    #[serde(default)]
    machine_types: Vec<Value>,
    #[serde(default)]
    shapes: Vec<Value>,
}

#[derive(Debug)]
pub struct Catalog {
    pub machine_types: Vec<Value>,
    pub shapes: Vec<Value>,
}

static CATALOG: OnceLock<Catalog> = OnceLock::new();

/// Get the catalog (parses the embedded JSON on first access)
pub fn get_catalog() -> &'static Catalog {
    CATALOG.get_or_init(|| {
        let parse = |content: &str| -> CatalogFile {
            serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded catalog JSON: {}", e))
        };

        Catalog {
            machine_types: parse(GOOGLE_MACHINE_TYPES).machine_types,
            shapes: parse(ORACLE_SHAPES).shapes,
        }
    })
}

/// Google machine types
pub fn machine_types() -> &'static [Value] {
    &get_catalog().machine_types
}

/// Google machine type by name
pub fn machine_type(name: &str) -> Option<&'static Value> {
    machine_types()
        .iter()
        .find(|m| m.get("name").and_then(Value::as_str) == Some(name))
}

/// Oracle compute shapes
pub fn shapes() -> &'static [Value] {
    &get_catalog().shapes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_loads_successfully() {
        assert!(!machine_types().is_empty());
        assert!(!shapes().is_empty());
    }

    #[test]
    fn test_machine_type_fields_are_typed() {
        let n1 = machine_type("n1-standard-1").unwrap();
        assert!(n1["imageSpaceGb"].is_i64());
        assert_eq!(n1["kind"], "compute#machineType");
        assert!(machine_type("does-not-exist").is_none());
    }

    #[test]
    fn test_shapes_have_names() {
        assert!(shapes().iter().all(|s| s["shape"].is_string()));
    }
}

pub mod components;
pub mod media_type;
pub mod operation;
pub mod parameter;
pub mod request_body;
pub mod response;
pub mod schema;
pub mod server;
pub mod spec;

use serde_json::Value;

use crate::error::ParseError;
use spec::OpenApiSpec;

/// Top-level keys every document must carry.
const REQUIRED_KEYS: [&str; 3] = ["openapi", "info", "paths"];

/// A loaded OpenAPI document: the typed view used to walk paths and
/// components, plus the raw tree that `$ref` pointers are resolved against.
#[derive(Debug, Clone)]
pub struct Document {
    pub raw: Value,
    pub spec: OpenApiSpec,
}

impl Document {
    /// Look up a same-document JSON pointer such as `/components/schemas/Pet`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.raw.pointer(pointer)
    }
}

/// Parse an OpenAPI document from YAML.
pub fn from_yaml(input: &str) -> Result<Document, ParseError> {
    let raw: Value = serde_yaml_ng::from_str(input)?;
    from_value(raw)
}

/// Parse an OpenAPI document from JSON.
pub fn from_json(input: &str) -> Result<Document, ParseError> {
    let raw: Value = serde_json::from_str(input)?;
    from_value(raw)
}

/// Build a document from an already-decoded tree.
pub fn from_value(raw: Value) -> Result<Document, ParseError> {
    for key in REQUIRED_KEYS {
        if raw.get(key).is_none() {
            return Err(ParseError::InvalidDocument(key));
        }
    }
    let spec: OpenApiSpec = serde_json::from_value(raw.clone())?;
    validate_version(&spec)?;
    Ok(Document { raw, spec })
}

fn validate_version(spec: &OpenApiSpec) -> Result<(), ParseError> {
    if !spec.openapi.starts_with("3.") {
        return Err(ParseError::UnsupportedVersion(spec.openapi.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_paths_is_invalid() {
        let yaml = "openapi: 3.0.0\ninfo:\n  title: T\n  version: '1'\n";
        let err = from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDocument("paths")));
    }

    #[test]
    fn test_missing_info_is_invalid() {
        let err = from_json(r#"{"openapi": "3.0.0", "paths": {}}"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDocument("info")));
    }

    #[test]
    fn test_pointer_lookup() {
        let doc = from_json(
            r#"{"openapi": "3.0.0", "info": {"title": "T", "version": "1"}, "paths": {},
                "components": {"schemas": {"Pet": {"type": "object"}}}}"#,
        )
        .unwrap();
        assert_eq!(
            doc.pointer("/components/schemas/Pet/type"),
            Some(&Value::String("object".into()))
        );
        assert!(doc.pointer("/components/schemas/Dog").is_none());
    }
}

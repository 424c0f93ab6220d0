use indexmap::IndexMap;
use serde::Deserialize;

/// The `type` keyword: a single type name or an OpenAPI 3.1 type array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TypeSet {
    Single(String),
    Multiple(Vec<String>),
}

/// A reference or inline schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SchemaOrRef {
    Ref {
        #[serde(rename = "$ref")]
        ref_path: String,
    },
    Schema(Box<Schema>),
}

impl SchemaOrRef {
    /// The inline schema, if this is not a reference.
    pub fn as_schema(&self) -> Option<&Schema> {
        match self {
            SchemaOrRef::Schema(schema) => Some(schema),
            SchemaOrRef::Ref { .. } => None,
        }
    }
}

/// Discriminator for polymorphic schemas.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,
    /// Tag value → `$ref` of the member schema.
    pub mapping: IndexMap<String, String>,
}

/// The subset of a JSON Schema object the client understands. Keywords
/// outside this set are ignored; `anyOf` is kept only so it can be rejected.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type")]
    pub schema_type: Option<TypeSet>,
    pub format: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "default")]
    pub default_value: Option<serde_json::Value>,
    /// OpenAPI 3.0 spelling; 3.1 puts `"null"` in the type array instead.
    pub nullable: Option<bool>,
    pub properties: IndexMap<String, SchemaOrRef>,
    pub required: Vec<String>,
    pub items: Option<Box<SchemaOrRef>>,
    pub all_of: Vec<SchemaOrRef>,
    pub one_of: Vec<SchemaOrRef>,
    pub any_of: Vec<SchemaOrRef>,
    pub discriminator: Option<Discriminator>,
}

impl Schema {
    /// The single non-null type keyword, if the schema declares one.
    ///
    /// `[T, "null"]` yields `T`; arrays with several non-null entries yield
    /// `None` along with schemas that declare no type at all.
    pub fn type_keyword(&self) -> Option<&str> {
        match self.schema_type.as_ref()? {
            TypeSet::Single(t) => Some(t.as_str()),
            TypeSet::Multiple(types) => {
                let mut non_null = types.iter().filter(|t| t.as_str() != "null");
                match (non_null.next(), non_null.next()) {
                    (Some(t), None) => Some(t.as_str()),
                    _ => None,
                }
            }
        }
    }

    /// Whether `null` is an accepted value, via `nullable: true` or a 3.1
    /// type array containing `"null"`.
    pub fn is_nullable(&self) -> bool {
        if self.nullable == Some(true) {
            return true;
        }
        matches!(
            &self.schema_type,
            Some(TypeSet::Multiple(types)) if types.iter().any(|t| t == "null")
        )
    }
}

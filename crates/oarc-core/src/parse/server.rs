use indexmap::IndexMap;
use serde::Deserialize;

/// A `{name}` placeholder in a server URL and its default substitution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerVariable {
    pub default: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: IndexMap<String, ServerVariable>,
}

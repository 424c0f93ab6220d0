use serde::Deserialize;

use super::schema::SchemaOrRef;

/// The media type this client reads and writes.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Only the schema of a media type entry matters to the client.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MediaType {
    pub schema: Option<SchemaOrRef>,
}

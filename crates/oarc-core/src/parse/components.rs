use indexmap::IndexMap;
use serde::Deserialize;

use super::parameter::ParameterOrRef;
use super::request_body::RequestBodyOrRef;
use super::response::ResponseOrRef;
use super::schema::SchemaOrRef;

/// Reusable definitions. Only `type: object` schemas turn into records;
/// the other sections are reached through `$ref` pointers.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Components {
    pub schemas: IndexMap<String, SchemaOrRef>,
    pub parameters: IndexMap<String, ParameterOrRef>,
    pub request_bodies: IndexMap<String, RequestBodyOrRef>,
    pub responses: IndexMap<String, ResponseOrRef>,
}

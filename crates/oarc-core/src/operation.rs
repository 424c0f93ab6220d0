//! Operations: one callable endpoint built from a path item entry.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::de::DeserializeOwned;

use crate::casing::{NormalizedName, normalize_name, to_local};
use crate::error::SchemaError;
use crate::parse::Document;
use crate::parse::media_type::{JSON_MEDIA_TYPE, MediaType};
use crate::parse::operation::{Operation as OperationSpec, PathItem};
use crate::parse::parameter::{Parameter as ParameterSpec, ParameterLocation, ParameterOrRef};
use crate::parse::request_body::{RequestBody, RequestBodyOrRef};
use crate::parse::response::{Response, ResponseOrRef};
use crate::parse::schema::SchemaOrRef;
use crate::registry::ModelRegistry;
use crate::resolve::TypeResolver;
use crate::types::TypeDescriptor;

/// `$ref` chains between parameters, bodies or responses longer than this are rejected.
const MAX_REF_DEPTH: usize = 16;

/// Local and wire name of the synthesized request body parameter.
pub const BODY_PARAMETER: &str = "body";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an argument goes in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
            ParamLocation::Body => "body",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ParameterLocation> for ParamLocation {
    fn from(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Path => ParamLocation::Path,
            ParameterLocation::Query => ParamLocation::Query,
            ParameterLocation::Header => ParamLocation::Header,
            ParameterLocation::Cookie => ParamLocation::Cookie,
        }
    }
}

/// A resolved parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub wire_name: String,
    pub local_name: String,
    pub ty: TypeDescriptor,
    /// Always true for path parameters.
    pub required: bool,
    pub location: ParamLocation,
    pub default: Option<serde_json::Value>,
    pub description: Option<String>,
}

/// Key of a response entry: a concrete status or `default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKey {
    Status(u16),
    Default,
}

impl ResponseKey {
    /// `"200"` → `Status(200)`, `"default"` → `Default`; ranges like `2XX` are not keys.
    pub fn parse(key: &str) -> Option<Self> {
        if key == "default" {
            return Some(ResponseKey::Default);
        }
        key.parse().ok().map(ResponseKey::Status)
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKey::Status(status) => write!(f, "{status}"),
            ResponseKey::Default => f.write_str("default"),
        }
    }
}

/// A fully resolved operation. Immutable once built.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operation_id: String,
    pub name: NormalizedName,
    pub method: HttpMethod,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub parameters: Vec<Parameter>,
    pub response_types: IndexMap<ResponseKey, TypeDescriptor>,
}

impl Operation {
    /// Parameters in call order: required ones first, then optional ones,
    /// each group in declaration order.
    pub fn signature(&self) -> Vec<&Parameter> {
        let (required, optional): (Vec<_>, Vec<_>) =
            self.parameters.iter().partition(|p| p.required);
        required.into_iter().chain(optional).collect()
    }

    /// Namespace the operation belongs to: its snake-cased first tag.
    pub fn namespace(&self) -> Option<String> {
        self.tags.first().map(|tag| to_local(tag))
    }

    /// Find a parameter by local name, falling back to wire name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.local_name == name)
            .or_else(|| self.parameters.iter().find(|p| p.wire_name == name))
    }

    /// Descriptor for a response status: the exact entry, else `default`.
    pub fn response_type(&self, status: u16) -> Option<&TypeDescriptor> {
        self.response_types
            .get(&ResponseKey::Status(status))
            .or_else(|| self.response_types.get(&ResponseKey::Default))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.method, self.path)
    }
}

/// operationId → every operation declared with it. A bucket holds more than
/// one entry only when the document repeats an id.
pub type OperationTable = IndexMap<String, Vec<Arc<Operation>>>;

/// Builds [`Operation`]s from one document against one registry.
pub struct OperationBuilder<'a> {
    document: &'a Document,
    registry: &'a ModelRegistry,
}

impl<'a> OperationBuilder<'a> {
    pub fn new(document: &'a Document, registry: &'a ModelRegistry) -> Self {
        Self { document, registry }
    }

    /// Scan every path item and build the operation table.
    pub fn build_all(&self) -> Result<OperationTable, SchemaError> {
        let mut table = OperationTable::new();
        for (path, item) in &self.document.spec.paths {
            for (method, spec) in operations_of(item) {
                let Some(operation) = self.build(path, method, spec, &item.parameters)? else {
                    continue;
                };
                let bucket = table.entry(operation.operation_id.clone()).or_default();
                if !bucket.is_empty() {
                    warn!(
                        "multiple operations use operationId `{}`, operation ids should be unique",
                        operation.operation_id
                    );
                }
                bucket.push(Arc::new(operation));
            }
        }
        debug!("built {} operation ids", table.len());
        Ok(table)
    }

    /// Build one operation. Returns `None`, with a warning, when the
    /// operation has no `operationId`.
    pub fn build(
        &self,
        path: &str,
        method: HttpMethod,
        spec: &OperationSpec,
        path_level: &[ParameterOrRef],
    ) -> Result<Option<Operation>, SchemaError> {
        let Some(operation_id) = spec.operation_id.clone() else {
            warn!("`operationId` not found in: [{method}] {path}");
            return Ok(None);
        };
        let location = format!(
            "#/paths/{}/{}",
            escape_pointer_token(path),
            method_key(method)
        );

        let declared = self.merge_parameters(path_level, &spec.parameters, &location)?;
        let mut parameters = Vec::with_capacity(declared.len() + 1);
        for (i, param) in declared.iter().enumerate() {
            let param_location = format!("{location}/parameters/{i}");
            parameters.push(self.build_parameter(param, &param_location)?);
        }
        if let Some(body) = &spec.request_body {
            parameters.push(self.build_body(body, &format!("{location}/requestBody"))?);
        }

        let mut response_types = IndexMap::new();
        for (key, response) in &spec.responses {
            let Some(response_key) = ResponseKey::parse(key) else {
                warn!("{location}: response key `{key}` is not a status code, skipping");
                continue;
            };
            let response_location = format!("{location}/responses/{key}");
            let response: Response = match response {
                ResponseOrRef::Response(response) => response.clone(),
                ResponseOrRef::Ref { ref_path } => self.deref(ref_path, &response_location)?,
            };
            let Some(schema) = json_schema(&response.content) else {
                continue;
            };
            let ty = self.resolve(schema, &format!("{response_location}/content"))?;
            response_types.insert(response_key, ty);
        }

        let operation = Operation {
            name: normalize_name(&operation_id),
            operation_id,
            method,
            path: path.to_string(),
            summary: spec.summary.clone(),
            description: spec.description.clone(),
            tags: spec.tags.clone(),
            deprecated: spec.deprecated.unwrap_or(false),
            parameters,
            response_types,
        };
        debug!(
            "built {} {} with {} parameters",
            operation.operation_id,
            operation,
            operation.parameters.len()
        );
        Ok(Some(operation))
    }

    /// Path-level parameters followed by operation-level ones; an
    /// operation-level parameter replaces a path-level one with the same
    /// name and location.
    fn merge_parameters(
        &self,
        path_level: &[ParameterOrRef],
        operation_level: &[ParameterOrRef],
        location: &str,
    ) -> Result<Vec<ParameterSpec>, SchemaError> {
        let mut merged: IndexMap<(String, ParameterLocation), ParameterSpec> = IndexMap::new();
        for param in path_level.iter().chain(operation_level) {
            let param = self.deref_parameter(param, location)?;
            merged.insert((param.name.clone(), param.location), param);
        }
        Ok(merged.into_values().collect())
    }

    fn deref_parameter(
        &self,
        param: &ParameterOrRef,
        location: &str,
    ) -> Result<ParameterSpec, SchemaError> {
        let mut current = param.clone();
        for _ in 0..MAX_REF_DEPTH {
            match current {
                ParameterOrRef::Parameter(param) => return Ok(param),
                ParameterOrRef::Ref { ref_path } => current = self.deref(&ref_path, location)?,
            }
        }
        Err(SchemaError::unsupported(
            location,
            "parameter reference chain is too deep",
        ))
    }

    fn build_parameter(
        &self,
        spec: &ParameterSpec,
        location: &str,
    ) -> Result<Parameter, SchemaError> {
        let (ty, default) = match &spec.schema {
            Some(schema) => (
                self.resolve(schema, &format!("{location}/schema"))?,
                schema.as_schema().and_then(|s| s.default_value.clone()),
            ),
            None => (TypeDescriptor::Any, None),
        };
        Ok(Parameter {
            wire_name: spec.name.clone(),
            local_name: to_local(&spec.name),
            ty,
            required: spec.required || spec.location == ParameterLocation::Path,
            location: spec.location.into(),
            default,
            description: spec.description.clone(),
        })
    }

    fn build_body(
        &self,
        body: &RequestBodyOrRef,
        location: &str,
    ) -> Result<Parameter, SchemaError> {
        let mut current = body.clone();
        let mut resolved: Option<RequestBody> = None;
        for _ in 0..MAX_REF_DEPTH {
            match current {
                RequestBodyOrRef::RequestBody(body) => {
                    resolved = Some(body);
                    break;
                }
                RequestBodyOrRef::Ref { ref_path } => current = self.deref(&ref_path, location)?,
            }
        }
        let body = resolved.ok_or_else(|| {
            SchemaError::unsupported(location, "request body reference chain is too deep")
        })?;

        let ty = match json_schema(&body.content) {
            Some(schema) => self.resolve(schema, &format!("{location}/content"))?,
            None => TypeDescriptor::Any,
        };
        Ok(Parameter {
            wire_name: BODY_PARAMETER.to_string(),
            local_name: BODY_PARAMETER.to_string(),
            ty,
            required: body.required,
            location: ParamLocation::Body,
            default: None,
            description: body.description,
        })
    }

    fn resolve(
        &self,
        schema: &SchemaOrRef,
        location: &str,
    ) -> Result<TypeDescriptor, SchemaError> {
        TypeResolver::new(self.document, self.registry.realized()).resolve(schema, location)
    }

    fn deref<T: DeserializeOwned>(&self, ref_path: &str, location: &str) -> Result<T, SchemaError> {
        let target = ref_path
            .strip_prefix('#')
            .and_then(|pointer| self.document.pointer(pointer))
            .ok_or_else(|| {
                SchemaError::unsupported(
                    location,
                    format!("reference target `{ref_path}` not found"),
                )
            })?;
        serde_json::from_value(target.clone()).map_err(|e| {
            SchemaError::unsupported(ref_path, format!("unexpected reference target: {e}"))
        })
    }
}

/// The operations a path item declares, in a fixed method order.
fn operations_of(item: &PathItem) -> Vec<(HttpMethod, &OperationSpec)> {
    let mut out = Vec::new();

    macro_rules! add_op {
        ($method:expr, $op:expr) => {
            if let Some(ref op) = $op {
                out.push(($method, op));
            }
        };
    }

    add_op!(HttpMethod::Get, item.get);
    add_op!(HttpMethod::Post, item.post);
    add_op!(HttpMethod::Put, item.put);
    add_op!(HttpMethod::Delete, item.delete);
    add_op!(HttpMethod::Patch, item.patch);
    add_op!(HttpMethod::Options, item.options);
    add_op!(HttpMethod::Head, item.head);
    add_op!(HttpMethod::Trace, item.trace);

    out
}

/// The JSON schema of a content map: `application/json` exactly, else the
/// first `application/*json*` media type.
fn json_schema(content: &IndexMap<String, MediaType>) -> Option<&SchemaOrRef> {
    content
        .get(JSON_MEDIA_TYPE)
        .or_else(|| {
            content
                .iter()
                .find(|(media_type, _)| {
                    media_type.starts_with("application/") && media_type.contains("json")
                })
                .map(|(_, media)| media)
        })
        .and_then(|media| media.schema.as_ref())
}

fn method_key(method: HttpMethod) -> String {
    method.as_str().to_ascii_lowercase()
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

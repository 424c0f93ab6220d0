//! Call-time machinery: argument collection, request building, the transport
//! seam and response decoding.
//!
//! One call walks collecting-parameters → building-request →
//! awaiting-transport → decoding-response and settles with either a value or
//! an error. Nothing is retried and nothing is cached between calls.

use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{InvokeError, TransportError};
use crate::operation::{HttpMethod, Operation, ParamLocation};
use crate::value::Value;

const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Call arguments keyed by local (or wire) parameter name. `Null` counts as
/// not supplied.
pub type Args = IndexMap<String, Value>;

/// Extra request data applied on top of what the parameters produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub query: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub cookies: IndexMap<String, String>,
}

impl RequestOptions {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query.is_empty() && self.cookies.is_empty()
    }
}

/// An outgoing request, handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Server URL joined with the substituted path, without the query string.
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// `url` plus the percent-encoded query string.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(name, QUERY_ENCODE_SET),
                    utf8_percent_encode(value, QUERY_ENCODE_SET)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.url)
    }

    /// The cookies folded into a single `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A response as returned by a [`Transport`]. Header names are lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body together with its content type and length.
    pub fn with_json(self, json: &serde_json::Value) -> Self {
        let body = json.to_string();
        let length = body.len();
        self.with_header("content-type", "application/json")
            .with_header("content-length", length.to_string())
            .with_body(body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    /// No declared length, a declared zero length, or no bytes at all.
    pub fn is_empty(&self) -> bool {
        matches!(self.content_length(), None | Some(0)) || self.body.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// The injected HTTP layer. One call to [`execute`](Transport::execute) is
/// one exchange.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Arguments sorted into request locations, already in wire form.
#[derive(Debug, Default)]
struct Collected {
    path: IndexMap<String, String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

/// Runs operations against one server through one transport.
pub struct OperationInvoker<'a> {
    codec: Codec<'a>,
    transport: &'a dyn Transport,
    server_url: &'a str,
    defaults: &'a RequestOptions,
}

impl<'a> OperationInvoker<'a> {
    pub fn new(
        codec: Codec<'a>,
        transport: &'a dyn Transport,
        server_url: &'a str,
        defaults: &'a RequestOptions,
    ) -> Self {
        Self {
            codec,
            transport,
            server_url,
            defaults,
        }
    }

    /// Perform one call. `Ok(None)` means the server answered with an empty body.
    pub fn invoke(
        &self,
        operation: &Operation,
        args: &Args,
        options: &RequestOptions,
    ) -> Result<Option<Value>, InvokeError> {
        let request = self.build_request(operation, args, options)?;
        debug!("{} {}", request.method, request.full_url());
        let response = self.transport.execute(request)?;
        debug!("{} -> {}", operation.operation_id, response.status);
        self.decode(operation, &response)
    }

    /// Collect arguments and assemble the request without sending it.
    pub fn build_request(
        &self,
        operation: &Operation,
        args: &Args,
        options: &RequestOptions,
    ) -> Result<HttpRequest, InvokeError> {
        let collected = self.collect(operation, args)?;
        let path = substitute_path(&operation.path, &collected.path)?;
        Ok(HttpRequest {
            method: operation.method,
            url: format!("{}{path}", self.server_url.trim_end_matches('/')),
            query: layer(collected.query, &options.query, &self.defaults.query, false),
            headers: layer(collected.headers, &options.headers, &self.defaults.headers, true),
            cookies: layer(collected.cookies, &options.cookies, &self.defaults.cookies, false),
            body: collected.body,
        })
    }

    fn collect(&self, operation: &Operation, args: &Args) -> Result<Collected, InvokeError> {
        let mut collected = Collected::default();
        for param in &operation.parameters {
            let supplied = args
                .get(&param.local_name)
                .or_else(|| args.get(&param.wire_name))
                .filter(|value| !value.is_null());
            let Some(value) = supplied else {
                if param.required {
                    return Err(InvokeError::MissingRequiredParameter(param.wire_name.clone()));
                }
                continue;
            };
            let wire = self.codec.serialize(value, &param.ty)?;
            let name = param.wire_name.clone();
            match param.location {
                ParamLocation::Path => {
                    collected.path.insert(name, to_text(&wire));
                }
                ParamLocation::Query => match &wire {
                    serde_json::Value::Array(items) => collected
                        .query
                        .extend(items.iter().map(|item| (name.clone(), to_text(item)))),
                    other => collected.query.push((name, to_text(other))),
                },
                ParamLocation::Header => collected.headers.push((name, to_text(&wire))),
                ParamLocation::Cookie => collected.cookies.push((name, to_text(&wire))),
                ParamLocation::Body => collected.body = Some(wire),
            }
        }
        Ok(collected)
    }

    /// Turn a response into a value: error statuses fail, empty bodies are
    /// `None`, everything else is decoded against the matching response type.
    pub fn decode(
        &self,
        operation: &Operation,
        response: &HttpResponse,
    ) -> Result<Option<Value>, InvokeError> {
        if !response.is_success() {
            let body = response.json().ok();
            let message = match &body {
                Some(json) => format!("HTTP {}: {json}", response.status),
                None => format!("HTTP {}", response.status),
            };
            return Err(InvokeError::Status {
                status: response.status,
                message,
                body,
            });
        }
        if response.is_empty() {
            return Ok(None);
        }
        let json = response.json().map_err(InvokeError::InvalidJson)?;
        let value = match operation.response_type(response.status) {
            Some(ty) => self.codec.deserialize(&json, ty)?,
            None => Value::from(json),
        };
        Ok(Some(value))
    }
}

/// Replace every `{name}` placeholder with its percent-encoded path value.
fn substitute_path(
    template: &str,
    values: &IndexMap<String, String>,
) -> Result<String, InvokeError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let placeholder = &rest[start + 1..start + len];
        let value = values
            .get(placeholder)
            .ok_or_else(|| InvokeError::UnresolvedPlaceholder {
                path: template.to_string(),
                placeholder: placeholder.to_string(),
            })?;
        out.push_str(&rest[..start]);
        out.extend(utf8_percent_encode(value, PATH_ENCODE_SET));
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Parameter values win over per-call options, which win over client defaults.
fn layer(
    mut params: Vec<(String, String)>,
    options: &IndexMap<String, String>,
    defaults: &IndexMap<String, String>,
    case_insensitive: bool,
) -> Vec<(String, String)> {
    let same = |a: &str, b: &str| {
        if case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    };
    for layer in [options, defaults] {
        let taken: Vec<String> = params.iter().map(|(name, _)| name.clone()).collect();
        for (name, value) in layer {
            if !taken.iter().any(|existing| same(existing, name)) {
                params.push((name.clone(), value.clone()));
            }
        }
    }
    params
}

/// Render a wire value as text for paths, queries, headers and cookies.
fn to_text(wire: &serde_json::Value) -> String {
    match wire {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_path() {
        let path = substitute_path(
            "/users/{userId}/files/{name}",
            &values(&[("userId", "7"), ("name", "a b/c")]),
        )
        .unwrap();
        assert_eq!(path, "/users/7/files/a%20b%2Fc");
    }

    #[test]
    fn test_unresolved_placeholder() {
        let err = substitute_path("/items/{id}", &IndexMap::new()).unwrap_err();
        assert!(matches!(
            err,
            InvokeError::UnresolvedPlaceholder { placeholder, .. } if placeholder == "id"
        ));
    }

    #[test]
    fn test_layer_precedence() {
        let merged = layer(
            vec![("page".into(), "2".into())],
            &values(&[("page", "9"), ("sort", "asc")]),
            &values(&[("sort", "desc"), ("lang", "en")]),
            false,
        );
        assert_eq!(
            merged,
            vec![
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "asc".to_string()),
                ("lang".to_string(), "en".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_layer_ignores_case() {
        let merged = layer(
            Vec::new(),
            &values(&[("X-Api-Key", "call")]),
            &values(&[("x-api-key", "default")]),
            true,
        );
        assert_eq!(merged, vec![("X-Api-Key".to_string(), "call".to_string())]);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(&serde_json::json!("x")), "x");
        assert_eq!(to_text(&serde_json::json!(4.5)), "4.5");
        assert_eq!(to_text(&serde_json::json!(true)), "true");
        assert_eq!(to_text(&serde_json::json!([1, "a"])), "1,a");
    }

    #[test]
    fn test_response_emptiness() {
        assert!(HttpResponse::new(204).is_empty());
        assert!(
            HttpResponse::new(200)
                .with_header("Content-Length", "0")
                .with_body("{}")
                .is_empty()
        );
        assert!(HttpResponse::new(200).with_body("{}").is_empty());
        assert!(
            !HttpResponse::new(200)
                .with_header("Content-Length", "2")
                .with_body("{}")
                .is_empty()
        );
        let response = HttpResponse::new(200).with_json(&serde_json::json!({"a": 1}));
        assert_eq!(response.content_length(), Some(7));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_full_url_and_cookies() {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: "https://api.test/search".into(),
            query: vec![("q".into(), "a&b".into()), ("tag".into(), "x".into())],
            headers: Vec::new(),
            cookies: vec![("session".into(), "abc".into()), ("theme".into(), "dark".into())],
            body: None,
        };
        assert_eq!(request.full_url(), "https://api.test/search?q=a%26b&tag=x");
        assert_eq!(request.cookie_header().as_deref(), Some("session=abc; theme=dark"));
    }
}

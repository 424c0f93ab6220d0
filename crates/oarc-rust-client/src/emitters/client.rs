use std::collections::HashSet;

use heck::ToPascalCase;
use log::warn;
use minijinja::{Environment, context};
use oarc_core::{Client, ModelRegistry, Namespace, Operation};

use crate::error::GeneratorError;
use crate::type_mapper::{describe, rust_ident, rust_type};

/// Render the wrapper module for `client`.
pub fn emit_client(client: &Client, client_name: &str) -> Result<String, GeneratorError> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("client.rs.j2", include_str!("../../templates/client.rs.j2"))?;
    let tmpl = env.get_template("client.rs.j2")?;

    let root_operations = namespace_operations(client, client.root());
    let namespaces: Vec<minijinja::Value> = client
        .namespaces()
        .map(|namespace| {
            let struct_name = format!("{}Api", namespace.name().to_pascal_case());
            context! {
                tag => namespace.name(),
                accessor => rust_ident(namespace.name()),
                struct_name => struct_name,
                operations => namespace_operations(client, namespace),
            }
        })
        .collect();

    let rendered = tmpl.render(context! {
        title => client.title(),
        version => client.version(),
        client_name => client_name,
        namespaces => namespaces,
        root_operations => root_operations,
    })?;
    Ok(rendered)
}

fn namespace_operations(client: &Client, namespace: &Namespace) -> Vec<minijinja::Value> {
    namespace
        .callables()
        .filter_map(|callable| {
            let operation_id = namespace.operation_id(callable)?;
            match client.operation(operation_id) {
                Ok(operation) => operation_context(operation, client.registry()),
                Err(e) => {
                    warn!("skipping wrapper for `{operation_id}`: {e}");
                    None
                }
            }
        })
        .collect()
}

/// `None` when two parameters share a local name: the wrapper could not
/// tell their arguments apart.
fn operation_context(op: &Operation, registry: &ModelRegistry) -> Option<minijinja::Value> {
    let signature = op.signature();
    let mut seen = HashSet::new();
    if let Some(dup) = signature.iter().find(|p| !seen.insert(p.local_name.as_str())) {
        warn!(
            "skipping wrapper for `{}`: more than one parameter is named `{}`",
            op.operation_id, dup.local_name
        );
        return None;
    }

    let params: Vec<minijinja::Value> = signature
        .iter()
        .map(|param| {
            let ty = rust_type(&param.ty);
            context! {
                ident => rust_ident(&param.local_name),
                key => format!("{:?}", param.local_name),
                arg_type => if param.required { ty } else { format!("Option<{ty}>") },
            }
        })
        .collect();

    Some(context! {
        method_name => rust_ident(&op.name.snake_case),
        operation_id => format!("{:?}", op.operation_id),
        deprecated => op.deprecated,
        doc => doc_lines(op, registry),
        params => params,
    })
}

fn doc_lines(op: &Operation, registry: &ModelRegistry) -> Vec<String> {
    let mut lines = vec![format!("`{} {}`", op.method, op.path)];
    for text in [&op.summary, &op.description].into_iter().flatten() {
        lines.push(String::new());
        lines.extend(text.lines().map(|line| line.trim_end().to_string()));
    }
    let params = op.signature();
    if !params.is_empty() {
        lines.push(String::new());
        for param in params {
            lines.push(format!(
                "* `{}` ({}): {}",
                param.local_name,
                param.location,
                describe(&param.ty, registry)
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use oarc_core::{HttpRequest, HttpResponse, Transport, TransportError};

    struct Offline;

    impl Transport for Offline {
        fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::new("offline"))
        }
    }

    const DOC: &str = r#"
openapi: 3.0.3
info: {title: Tiny, version: "0.1"}
paths:
  /ping:
    get:
      operationId: ping
      summary: Liveness probe.
  /things/{thingId}:
    get:
      operationId: getThing
      tags: [Things]
      parameters:
        - {name: thingId, in: path, schema: {type: integer}}
        - {name: type, in: query, schema: {type: string}}
"#;

    #[test]
    fn test_emit_client_shape() {
        let client = Client::from_yaml(DOC, Offline).unwrap();
        let module = emit_client(&client, "Tiny").unwrap();
        assert!(module.starts_with("//! Typed wrappers for Tiny 0.1."));
        assert!(module.contains("pub struct Tiny<'c> {"));
        assert!(module.contains("pub fn things(&self) -> ThingsApi<'c> {"));
        assert!(module.contains(
            "    pub fn ping(\n        &self,\n    ) -> Result<Option<Value>, InvokeError> {"
        ));
        assert!(module.contains(
            "        let args = Args::new();\n        self.client.invoke(\"ping\", &args)"
        ));
        assert!(module.contains("    /// Liveness probe."));
        assert!(module.contains("pub struct ThingsApi<'c> {"));
        assert!(module.contains("        thing_id: i64,\n        r#type: Option<String>,\n"));
        assert!(module.contains("        args.insert(\"type\".to_string(), Value::from(r#type));"));
        assert!(module.contains("        self.client.invoke(\"getThing\", &args)"));
        assert!(module.contains("    /// * `thing_id` (path): integer"));
    }

    #[test]
    fn test_colliding_parameter_names_skip_wrapper() {
        let doc = r#"
openapi: 3.0.3
info: {title: Tiny, version: "0.1"}
paths:
  /things/{x_id}:
    get:
      operationId: getThing
      parameters:
        - {name: x_id, in: path, schema: {type: string}}
        - {name: X-Id, in: header, schema: {type: string}}
  /ping:
    get: {operationId: ping}
"#;
        let client = Client::from_yaml(doc, Offline).unwrap();
        let module = emit_client(&client, "Tiny").unwrap();
        assert!(!module.contains("pub fn get_thing("));
        assert!(module.contains("pub fn ping("));
    }
}

//! Client assembly: registry + operation table + namespaces + server, plus
//! the call entry points.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::casing::to_local;
use crate::codec::{Codec, NameMode};
use crate::error::{BuildError, InvokeError};
use crate::invoke::{Args, OperationInvoker, RequestOptions, Transport};
use crate::operation::{Operation, OperationBuilder, OperationTable};
use crate::parse::{self, Document};
use crate::registry::ModelRegistry;
use crate::value::Value;

/// A server the client talks to. `{name}` placeholders in the template are
/// filled from `variables`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub url_template: String,
    pub description: Option<String>,
    pub variables: IndexMap<String, String>,
}

impl Server {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            description: None,
            variables: IndexMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// The template with every known variable substituted.
    pub fn url(&self) -> String {
        self.variables
            .iter()
            .fold(self.url_template.clone(), |url, (name, value)| {
                url.replace(&format!("{{{name}}}"), value)
            })
    }
}

impl From<&parse::server::Server> for Server {
    fn from(server: &parse::server::Server) -> Self {
        Self {
            url_template: server.url.clone(),
            description: server.description.clone(),
            variables: server
                .variables
                .iter()
                .map(|(name, variable)| (name.clone(), variable.default.clone()))
                .collect(),
        }
    }
}

/// Build-time knobs.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Used instead of the document's first server.
    pub server: Option<Server>,
    /// Merged into the selected server's variables.
    pub server_variables: IndexMap<String, String>,
    /// Applied to every call, below per-call options.
    pub defaults: RequestOptions,
    pub name_mode: NameMode,
}

/// Operations grouped under one tag. Maps callable name (snake-cased
/// operation id) → operation id.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    name: String,
    callables: IndexMap<String, String>,
}

impl Namespace {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callables: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Callable names in declaration order.
    pub fn callables(&self) -> impl Iterator<Item = &str> {
        self.callables.keys().map(String::as_str)
    }

    /// Operation id behind a callable name.
    pub fn operation_id(&self, callable: &str) -> Option<&str> {
        self.callables.get(callable).map(String::as_str)
    }

    /// The first operation to claim a callable name keeps it.
    fn attach(&mut self, operation: &Operation) {
        let callable = &operation.name.snake_case;
        match self.callables.get(callable) {
            Some(existing) if *existing != operation.operation_id => warn!(
                "namespace '{}': callable '{}' already maps to '{}', skipping '{}'",
                self.name, callable, existing, operation.operation_id
            ),
            Some(_) => {}
            None => {
                self.callables
                    .insert(callable.clone(), operation.operation_id.clone());
            }
        }
    }
}

/// A runtime client for one OpenAPI document.
pub struct Client {
    title: String,
    version: String,
    registry: Arc<ModelRegistry>,
    operations: Arc<OperationTable>,
    root: Namespace,
    namespaces: IndexMap<String, Namespace>,
    servers: Vec<Server>,
    server: Server,
    transport: Arc<dyn Transport>,
    defaults: RequestOptions,
    name_mode: NameMode,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("title", &self.title)
            .field("server", &self.server)
            .field("records", &self.registry.len())
            .field("operations", &self.operations.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Assemble a client from a parsed document.
    pub fn build(
        document: &Document,
        transport: impl Transport + 'static,
    ) -> Result<Self, BuildError> {
        Self::build_with_options(document, transport, ClientOptions::default())
    }

    pub fn build_with_options(
        document: &Document,
        transport: impl Transport + 'static,
        options: ClientOptions,
    ) -> Result<Self, BuildError> {
        let registry = ModelRegistry::build(document)?;
        let operations = OperationBuilder::new(document, &registry).build_all()?;

        let mut root = Namespace::new("");
        let mut namespaces: IndexMap<String, Namespace> = IndexMap::new();
        for operation in operations.values().flatten() {
            match operation.tags.first() {
                Some(tag) => {
                    let name = to_local(tag);
                    namespaces
                        .entry(name.clone())
                        .or_insert_with(|| Namespace::new(name))
                        .attach(operation);
                }
                None => root.attach(operation),
            }
        }

        let servers: Vec<Server> = document.spec.servers.iter().map(Server::from).collect();
        let mut server = match options.server.or_else(|| servers.first().cloned()) {
            Some(server) => server,
            None => {
                warn!("document declares no servers and none was configured");
                Server::new("")
            }
        };
        server.variables.extend(options.server_variables);
        debug!(
            "client ready: {} records, {} operations, {} namespaces, server {}",
            registry.len(),
            operations.len(),
            namespaces.len(),
            server.url()
        );

        Ok(Self {
            title: document.spec.info.title.clone(),
            version: document.spec.info.version.clone(),
            registry: Arc::new(registry),
            operations: Arc::new(operations),
            root,
            namespaces,
            servers,
            server,
            transport: Arc::new(transport),
            defaults: options.defaults,
            name_mode: options.name_mode,
        })
    }

    /// Parse a YAML (or JSON, which is valid YAML) document and assemble a client.
    pub fn from_yaml(
        input: &str,
        transport: impl Transport + 'static,
    ) -> Result<Self, BuildError> {
        Self::build(&parse::from_yaml(input)?, transport)
    }

    /// Call an operation by its operation id.
    pub fn invoke(&self, operation_id: &str, args: &Args) -> Result<Option<Value>, InvokeError> {
        self.invoke_with(operation_id, args, &RequestOptions::default())
    }

    pub fn invoke_with(
        &self,
        operation_id: &str,
        args: &Args,
        options: &RequestOptions,
    ) -> Result<Option<Value>, InvokeError> {
        let operation = self.operation(operation_id)?;
        self.invoke_operation(operation, args, options)
    }

    /// Call a specific operation, e.g. one member of a duplicated id bucket.
    pub fn invoke_operation(
        &self,
        operation: &Operation,
        args: &Args,
        options: &RequestOptions,
    ) -> Result<Option<Value>, InvokeError> {
        let server_url = self.server.url();
        let invoker = OperationInvoker::new(
            self.codec(),
            self.transport.as_ref(),
            &server_url,
            &self.defaults,
        );
        invoker.invoke(operation, args, options)
    }

    /// Call an untagged operation by its callable (snake-cased) name.
    pub fn call(&self, callable: &str, args: &Args) -> Result<Option<Value>, InvokeError> {
        let operation_id = self
            .root
            .operation_id(callable)
            .ok_or_else(|| InvokeError::UnknownOperation(callable.to_string()))?;
        self.invoke(operation_id, args)
    }

    /// The operation registered under `operation_id`. Fails when the id is
    /// unknown or shared by several operations.
    pub fn operation(&self, operation_id: &str) -> Result<&Operation, InvokeError> {
        match self.operations.get(operation_id).map(Vec::as_slice) {
            Some([only]) => Ok(only.as_ref()),
            Some(bucket) if !bucket.is_empty() => Err(InvokeError::AmbiguousOperation {
                operation_id: operation_id.to_string(),
                count: bucket.len(),
            }),
            _ => Err(InvokeError::UnknownOperation(operation_id.to_string())),
        }
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    /// Tagged operations, by snake-cased first tag.
    pub fn namespace(&self, name: &str) -> Option<SubApi<'_>> {
        self.namespaces
            .get(name)
            .map(|namespace| SubApi { client: self, namespace })
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }

    /// Untagged operations.
    pub fn root(&self) -> &Namespace {
        &self.root
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn codec(&self) -> Codec<'_> {
        Codec::new(&self.registry).with_mode(self.name_mode)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Servers declared by the document.
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn set_server(&mut self, server: Server) {
        self.server = server;
    }

    pub fn set_transport(&mut self, transport: impl Transport + 'static) {
        self.transport = Arc::new(transport);
    }

    pub fn set_default_options(&mut self, defaults: RequestOptions) {
        self.defaults = defaults;
    }

    pub fn default_options(&self) -> &RequestOptions {
        &self.defaults
    }

    pub fn set_name_mode(&mut self, mode: NameMode) {
        self.name_mode = mode;
    }
}

/// A namespace view borrowed from its client.
#[derive(Debug, Clone, Copy)]
pub struct SubApi<'c> {
    client: &'c Client,
    namespace: &'c Namespace,
}

impl<'c> SubApi<'c> {
    pub fn name(&self) -> &'c str {
        self.namespace.name()
    }

    pub fn callables(&self) -> impl Iterator<Item = &'c str> {
        self.namespace.callables()
    }

    /// Call an operation of this namespace by callable name.
    pub fn call(&self, callable: &str, args: &Args) -> Result<Option<Value>, InvokeError> {
        self.call_with(callable, args, &RequestOptions::default())
    }

    pub fn call_with(
        &self,
        callable: &str,
        args: &Args,
        options: &RequestOptions,
    ) -> Result<Option<Value>, InvokeError> {
        let operation_id = self.namespace.operation_id(callable).ok_or_else(|| {
            InvokeError::UnknownOperation(format!("{}.{callable}", self.namespace.name()))
        })?;
        self.client.invoke_with(operation_id, args, options)
    }
}

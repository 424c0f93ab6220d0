use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::client::{ClientOptions, Server};
use crate::codec::NameMode;
use crate::invoke::RequestOptions;

/// Top-level project configuration loaded from `.oarc.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OarcConfig {
    /// Document path or `http(s)://` URL.
    pub input: String,
    pub server: ServerConfig,
    /// Headers, query parameters and cookies sent with every call.
    pub defaults: RequestOptions,
    pub name_mode: NameMode,
    pub codegen: CodegenConfig,
}

impl Default for OarcConfig {
    fn default() -> Self {
        Self {
            input: "openapi.yaml".to_string(),
            server: ServerConfig::default(),
            defaults: RequestOptions::default(),
            name_mode: NameMode::Wire,
            codegen: CodegenConfig::default(),
        }
    }
}

impl OarcConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            server: self.server.url.as_ref().map(|url| Server::new(url.clone())),
            server_variables: self.server.variables.clone(),
            defaults: self.defaults.clone(),
            name_mode: self.name_mode,
        }
    }
}

/// Server override. `variables` apply to whichever server ends up selected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: Option<String>,
    pub variables: IndexMap<String, String>,
}

/// Typed wrapper generation options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// File the generated module is written to.
    pub output: String,
    /// Name of the generated client struct (defaults to the PascalCased document title).
    pub client_name: Option<String>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            output: "src/api.rs".to_string(),
            client_name: None,
        }
    }
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".oarc.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<OarcConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
    let config: OarcConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))?;
    Ok(Some(config))
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# oarc configuration
input: openapi.yaml     # path or http(s):// URL

server:
  # url: https://api.example.com    # overrides the document's first server
  variables: {}
    # region: eu

defaults:
  headers: {}
    # Authorization: Bearer <token>
  query: {}
  cookies: {}

name_mode: wire         # wire | local

codegen:
  output: src/api.rs
  # client_name: PetStore
"#
}

use heck::ToPascalCase;
use oarc_core::config::CodegenConfig;
use oarc_core::{Client, CodeGenerator, GeneratedFile};

use crate::emitters;
use crate::error::GeneratorError;

const FALLBACK_CLIENT_NAME: &str = "ApiClient";

/// Renders a typed wrapper module over a runtime [`Client`].
pub struct RustClientGenerator;

impl RustClientGenerator {
    /// Struct name for the generated entry point.
    pub fn client_name(client: &Client, config: &CodegenConfig) -> Result<String, GeneratorError> {
        if let Some(name) = &config.client_name {
            let valid = name.starts_with(|c: char| c.is_ascii_alphabetic())
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(GeneratorError::InvalidClientName(name.clone()));
            }
            return Ok(name.clone());
        }
        let derived = client.title().to_pascal_case();
        if derived.starts_with(|c: char| c.is_ascii_alphabetic()) {
            Ok(derived)
        } else {
            Ok(FALLBACK_CLIENT_NAME.to_string())
        }
    }
}

impl CodeGenerator for RustClientGenerator {
    type Config = CodegenConfig;
    type Error = GeneratorError;

    fn generate(
        &self,
        client: &Client,
        config: &CodegenConfig,
    ) -> Result<Vec<GeneratedFile>, GeneratorError> {
        let client_name = Self::client_name(client, config)?;
        log::debug!("rendering `{client_name}` into {}", config.output);
        Ok(vec![GeneratedFile {
            path: config.output.clone(),
            content: emitters::client::emit_client(client, &client_name)?,
        }])
    }
}

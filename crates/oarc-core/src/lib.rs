pub mod casing;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod invoke;
pub mod operation;
pub mod parse;
pub mod registry;
pub mod resolve;
pub mod types;
pub mod value;

pub use chrono;
pub use client::{Client, ClientOptions, Namespace, Server, SubApi};
pub use codec::{Codec, NameMode};
pub use error::{BuildError, CodecError, InvokeError, ParseError, SchemaError, TransportError};
pub use invoke::{Args, HttpRequest, HttpResponse, RequestOptions, Transport};
pub use operation::{HttpMethod, Operation, ParamLocation, Parameter};
pub use registry::ModelRegistry;
pub use types::{DiscriminatedUnion, PrimitiveKind, RecordId, RecordType, TypeDescriptor};
pub use value::{Record, Value};

/// A generated file with path and content.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Trait for code generators that render files from an assembled client.
pub trait CodeGenerator {
    type Config;
    type Error: std::error::Error;
    fn generate(
        &self,
        client: &Client,
        config: &Self::Config,
    ) -> Result<Vec<GeneratedFile>, Self::Error>;
}

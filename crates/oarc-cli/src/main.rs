mod transport;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use oarc_core::config::{self, CONFIG_FILE_NAME, OarcConfig};
use oarc_core::parse::{self, Document};
use oarc_core::{
    Args, Client, CodeGenerator, GeneratedFile, RequestOptions, Server, TypeDescriptor, Value,
};
use oarc_rust_client::RustClientGenerator;
use oarc_rust_client::type_mapper::describe;

use crate::transport::ReqwestTransport;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "oarc", about = "OpenAPI 3.x runtime client", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an OpenAPI document and assemble a client from it
    Validate {
        /// Path or URL of the OpenAPI document (YAML or JSON)
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Print the records and operations a document produces
    Inspect {
        /// Path or URL of the OpenAPI document
        #[arg(short, long)]
        input: Option<String>,

        /// Output format
        #[arg(long, default_value = "yaml")]
        format: InspectFormat,
    },

    /// Call an operation and print the decoded response as JSON
    Call {
        /// Operation id to invoke
        operation_id: String,

        /// Path or URL of the OpenAPI document
        #[arg(short, long)]
        input: Option<String>,

        /// Parameter as NAME=VALUE; VALUE is read as JSON, else as a string
        #[arg(short, long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,

        /// Extra header as NAME=VALUE
        #[arg(long = "header", value_name = "NAME=VALUE")]
        headers: Vec<String>,

        /// Server URL overriding the document's servers
        #[arg(long)]
        server: Option<String>,
    },

    /// Generate typed Rust wrappers for a document
    Generate {
        /// Path or URL of the OpenAPI document
        #[arg(short, long)]
        input: Option<String>,

        /// Output file (defaults to `codegen.output` from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Initialize a new oarc configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, ValueEnum)]
enum InspectFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { input } => cmd_validate(input),

        Commands::Inspect { input, format } => cmd_inspect(input, format),

        Commands::Call {
            operation_id,
            input,
            args,
            body,
            headers,
            server,
        } => cmd_call(&operation_id, input, &args, body.as_deref(), &headers, server),

        Commands::Generate { input, output } => cmd_generate(input, output),

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "oarc", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Try to load the project config file from the current directory.
fn try_load_config() -> Result<OarcConfig> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    let cfg = config::load_config(&config_path).map_err(|e| anyhow::anyhow!(e))?;
    Ok(cfg.unwrap_or_default())
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a document from a local path or an `http(s)://` URL. JSON is
/// picked by a `.json` suffix, everything else is read as YAML.
fn load_document(input: &str) -> Result<Document> {
    let content = if is_url(input) {
        log::debug!("fetching {input}");
        reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?
            .get(input)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .with_context(|| format!("failed to fetch {input}"))?
    } else {
        fs::read_to_string(input).with_context(|| format!("failed to read {input}"))?
    };

    let document = if input.ends_with(".json") {
        parse::from_json(&content)
    } else {
        parse::from_yaml(&content)
    };
    document.with_context(|| format!("failed to parse {input}"))
}

fn build_client(input: &str, cfg: &OarcConfig) -> Result<Client> {
    let document = load_document(input)?;
    let transport = ReqwestTransport::new(HTTP_TIMEOUT)?;
    Client::build_with_options(&document, transport, cfg.client_options())
        .with_context(|| format!("failed to assemble a client from {input}"))
}

/// Split `NAME=VALUE`.
fn split_pair(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => anyhow::bail!("expected NAME=VALUE, got `{raw}`"),
    }
}

/// Parse a `--arg` value: JSON when it parses, a plain string otherwise.
fn parse_arg(raw: &str) -> Result<(String, Value)> {
    let (name, value) = split_pair(raw)?;
    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => Value::from(json),
        Err(_) => Value::from(value),
    };
    Ok((name.to_string(), value))
}

/// Write generated files to disk under the given base directory.
fn write_files(base: &Path, files: &[GeneratedFile]) -> Result<()> {
    for file in files {
        let path = base.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        fs::write(&path, &file.content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("  wrote {}", path.display());
    }
    Ok(())
}

fn cmd_validate(input: Option<String>) -> Result<()> {
    let cfg = try_load_config()?;
    let input = input.unwrap_or(cfg.input.clone());
    let document = load_document(&input)?;

    eprintln!(
        "Valid OpenAPI {} document: {}",
        document.spec.openapi, document.spec.info.title
    );
    eprintln!("  Version: {}", document.spec.info.version);
    eprintln!("  Paths: {}", document.spec.paths.len());

    let transport = ReqwestTransport::new(HTTP_TIMEOUT)?;
    let client = Client::build_with_options(&document, transport, cfg.client_options())?;
    eprintln!("  Records: {}", client.registry().len());
    eprintln!("  Operations: {}", client.operations().len());
    eprintln!("  Namespaces: {}", client.namespaces().count());
    eprintln!("  Server: {}", client.server().url());

    eprintln!("Validation successful.");
    Ok(())
}

fn cmd_inspect(input: Option<String>, format: InspectFormat) -> Result<()> {
    let cfg = try_load_config()?;
    let input = input.unwrap_or(cfg.input.clone());
    let client = build_client(&input, &cfg)?;

    let summary = build_inspect_summary(&client);

    match format {
        InspectFormat::Yaml => {
            let yaml = serde_yaml_ng::to_string(&summary)?;
            print!("{}", yaml);
        }
        InspectFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn build_inspect_summary(client: &Client) -> serde_json::Value {
    let registry = client.registry();

    let records: Vec<serde_json::Value> = registry
        .records()
        .map(|(_, record)| {
            let fields: Vec<serde_json::Value> = record
                .fields()
                .iter()
                .map(|field| {
                    serde_json::json!({
                        "name": field.local_name,
                        "wire_name": field.wire_name,
                        "type": describe(&field.ty, registry),
                        "required": record.is_required(&field.local_name),
                        "nullable": record.is_nullable(&field.local_name),
                    })
                })
                .collect();
            serde_json::json!({
                "name": record.name(),
                "fields": fields,
            })
        })
        .collect();

    let operations: Vec<serde_json::Value> = client
        .operations()
        .values()
        .flatten()
        .map(|op| {
            let signature: Vec<String> = op
                .signature()
                .iter()
                .map(|p| {
                    let marker = if p.required { "" } else { "?" };
                    format!(
                        "{}{marker}: {} ({})",
                        p.local_name,
                        describe(&p.ty, registry),
                        p.location
                    )
                })
                .collect();
            serde_json::json!({
                "id": op.operation_id,
                "method": op.method.as_str(),
                "path": op.path,
                "namespace": op.namespace(),
                "signature": signature,
            })
        })
        .collect();

    serde_json::json!({
        "info": {
            "title": client.title(),
            "version": client.version(),
        },
        "server": client.server().url(),
        "records": records,
        "operations": operations,
        "namespaces": client.namespaces().map(|ns| ns.name()).collect::<Vec<_>>(),
    })
}

fn cmd_call(
    operation_id: &str,
    input: Option<String>,
    raw_args: &[String],
    body: Option<&str>,
    raw_headers: &[String],
    server: Option<String>,
) -> Result<()> {
    let cfg = try_load_config()?;
    let input = input.unwrap_or(cfg.input.clone());
    let mut client = build_client(&input, &cfg)?;
    if let Some(url) = server {
        client.set_server(Server::new(url));
    }

    let mut args = Args::new();
    for raw in raw_args {
        let (name, value) = parse_arg(raw)?;
        args.insert(name, value);
    }
    if let Some(body) = body {
        let json: serde_json::Value =
            serde_json::from_str(body).context("--body must be valid JSON")?;
        args.insert(oarc_core::operation::BODY_PARAMETER.to_string(), Value::from(json));
    }

    let mut options = RequestOptions::default();
    for raw in raw_headers {
        let (name, value) = split_pair(raw)?;
        options = options.header(name, value);
    }

    let result = client
        .invoke_with(operation_id, &args, &options)
        .with_context(|| format!("call to `{operation_id}` failed"))?;

    match result {
        Some(value) => {
            let json = client.codec().serialize(&value, &TypeDescriptor::Any)?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        None => eprintln!("(empty response)"),
    }
    Ok(())
}

fn cmd_generate(input: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let cfg = try_load_config()?;
    let input = input.unwrap_or(cfg.input.clone());
    let client = build_client(&input, &cfg)?;

    let mut codegen = cfg.codegen.clone();
    if let Some(output) = output {
        codegen.output = output.to_string_lossy().into_owned();
    }

    eprintln!("Generating {} → {}", client.title(), codegen.output);
    let files = RustClientGenerator.generate(&client, &codegen)?;
    write_files(Path::new("."), &files)?;

    eprintln!(
        "\nThe generated module is overwritten on every run; do not edit it by hand."
    );
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}

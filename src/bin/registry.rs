//! Schema Registry CLI
//!
//! Publish, fetch, list, delete, and validate against configuration schemas.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use config_schema_registry::config::BackendKind;
use config_schema_registry::document::OutputFormat;
use config_schema_registry::events::LoggingRegistrar;
use config_schema_registry::{
    validator, AllowAll, Authorizer, CallerIdentity, EventDispatcher, FsBackend, KvBackend,
    MemoryBackend, Outcome, RegistryConfig, SaveSchemaRequest, SchemaIdentity, SchemaService,
    StaticNamespaces, TokenAuthorizer, ValidateConfigurationRequest, VersionedStore,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-registry")]
#[command(about = "Versioned configuration schema registry")]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Permission token of the caller
    #[arg(long, env = "SCHEMA_REGISTRY_TOKEN")]
    token: Option<String>,

    /// Render fetched schemas as JSON instead of the configured format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Target {
    organization: String,
    namespace: String,
    name: String,
    version: String,
}

impl Target {
    fn identity(&self) -> SchemaIdentity {
        SchemaIdentity::new(&self.organization, &self.namespace, &self.name, &self.version)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a new schema version from a JSON or YAML file
    Save {
        #[command(flatten)]
        target: Target,
        /// Schema file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print a schema version
    Get {
        #[command(flatten)]
        target: Target,
    },

    /// Delete a schema version
    Delete {
        #[command(flatten)]
        target: Target,
    },

    /// Validate a configuration file against a schema version
    Validate {
        #[command(flatten)]
        target: Target,
        /// Configuration file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List all versions of a schema
    Versions {
        organization: String,
        namespace: String,
        name: String,
    },

    /// Check that a local schema file is a valid JSON schema
    Check {
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn report<T>(outcome: &Outcome<T>) -> bool {
    if outcome.is_ok() {
        println!("✅ {}", outcome.message);
    } else {
        eprintln!("❌ [{}] {}", outcome.status.code(), outcome.message);
    }
    outcome.is_ok()
}

async fn build_service(config: &RegistryConfig) -> anyhow::Result<(SchemaService, EventDispatcher)> {
    let backend: Arc<dyn KvBackend> = match config.storage.backend {
        BackendKind::Fs => Arc::new(FsBackend::open(config.storage_path()).await?),
        BackendKind::Memory => {
            warn!("memory backend selected; nothing persists past this command");
            Arc::new(MemoryBackend::new())
        }
    };
    let authorizer: Arc<dyn Authorizer> = match &config.auth.secret_key {
        Some(secret) => Arc::new(TokenAuthorizer::new(secret)),
        None => {
            warn!("no auth.secret_key configured; every caller is allowed");
            Arc::new(AllowAll)
        }
    };
    let namespaces = Arc::new(StaticNamespaces::from_entries(&config.namespaces.known));
    let dispatcher = EventDispatcher::spawn(Arc::new(LoggingRegistrar), config.events.policy());

    let service = SchemaService::new(
        VersionedStore::with_timeout(backend, config.storage.timeout()),
        authorizer,
        namespaces,
        dispatcher.publisher(),
    );
    Ok((service, dispatcher))
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = RegistryConfig::load_from(cli.config.as_deref())?;
    let format = if cli.json { OutputFormat::Json } else { config.output.format };
    let caller = cli.token.map(CallerIdentity::bearer).unwrap_or_default();

    match cli.command {
        Commands::Check { file } => {
            match validator::check_schema_well_formed(&read_document(&file)?) {
                Ok(_) => {
                    println!("✅ {} is a valid JSON schema", file.display());
                    Ok(true)
                }
                Err(e) => {
                    eprintln!("❌ {}", e);
                    Ok(false)
                }
            }
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(true)
        }

        command => {
            let (service, dispatcher) = build_service(&config).await?;
            let ok = execute(&service, &caller, command, format).await?;
            drop(service);
            dispatcher.shutdown().await;
            Ok(ok)
        }
    }
}

async fn execute(
    service: &SchemaService,
    caller: &CallerIdentity,
    command: Commands,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    match command {
        Commands::Save { target, file } => {
            let request = SaveSchemaRequest {
                identity: target.identity(),
                schema: read_document(&file)?,
            };
            Ok(report(&service.save(caller, &request).await?))
        }

        Commands::Get { target } => {
            let outcome = service.get(caller, &target.identity()).await?;
            match &outcome.payload {
                Some(record) => {
                    println!("📦 {} ({})", record.identity, record.created_at.format("%Y-%m-%d %H:%M:%S"));
                    println!("🔒 {}", record.checksum);
                    println!();
                    print!("{}", record.render(format)?);
                    if format == OutputFormat::Json {
                        println!();
                    }
                    Ok(true)
                }
                None => {
                    report(&outcome);
                    Ok(false)
                }
            }
        }

        Commands::Delete { target } => Ok(report(&service.delete(caller, &target.identity()).await?)),

        Commands::Validate { target, file } => {
            let request = ValidateConfigurationRequest {
                identity: target.identity(),
                configuration: read_document(&file)?,
            };
            let outcome = service.validate(caller, &request).await?;
            match &outcome.payload {
                Some(result) if result.valid => {
                    println!("✅ {}", result.message);
                    Ok(true)
                }
                Some(result) => {
                    println!("❌ {}", result.message);
                    Ok(false)
                }
                None => Ok(report(&outcome)),
            }
        }

        Commands::Versions {
            organization,
            namespace,
            name,
        } => {
            let family = SchemaIdentity::family(organization, namespace, name);
            let outcome = service.list_versions(caller, &family).await?;
            let records = match &outcome.payload {
                Some(records) if !records.is_empty() => records,
                _ => return Ok(report(&outcome)),
            };
            println!("📚 Versions of {}:", family);
            let last = records.len() - 1;
            for (i, record) in records.iter().enumerate() {
                let marker = if i == last { " (latest)" } else { "" };
                println!(
                    "  {} {}{}",
                    record.identity.version_str(),
                    record.created_at.format("%Y-%m-%d"),
                    marker
                );
            }
            Ok(true)
        }

        Commands::Check { .. } | Commands::Config => bail!("command does not use the store"),
    }
}

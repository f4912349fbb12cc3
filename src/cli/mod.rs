//! Command-line interface for artifex.
//!
//! Provides commands for creating, updating, transforming and deleting
//! artifacts, inspecting the store and the lifecycle journal, and showing
//! the resolved configuration.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::adapters::{CommandGenerator, GenerationService};
use crate::config::{self, ResolvedConfig};
use crate::core::{ExportFormat, GeneratedConversion, Journal, Orchestrator, PluginManager};
use crate::domain::{Artifact, ArtifactId, ArtifactType};
use crate::plugins::{self, PluginServices};
use crate::references::ChatReferences;
use crate::store::{CollectionStore, FileBlobStore, FileStore};

/// artifex - Plugin-driven artifact lifecycle engine
#[derive(Parser, Debug)]
#[command(name = "artifex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered artifact types
    Types {
        /// Print each type's JSON Schema
        #[arg(long)]
        schema: bool,
    },

    /// Create an artifact from a JSON payload
    Create {
        /// Artifact type tag (e.g. document, spreadsheet)
        artifact_type: String,

        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Update an artifact; the payload must carry its id
    Update {
        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Transform an artifact into a new artifact of another type
    Transform {
        /// Source artifact ID
        id: String,

        /// Target type tag
        target: String,
    },

    /// Delete an artifact
    Delete {
        /// Artifact ID
        id: String,
    },

    /// List stored artifacts
    List {
        /// Filter by type tag
        #[arg(short = 't', long = "type")]
        artifact_type: Option<String>,
    },

    /// Show an artifact as JSON
    Show {
        /// Artifact ID
        id: String,
    },

    /// Render an artifact in another format
    Export {
        /// Artifact ID
        id: String,

        /// Output format (json, markdown, html, csv, mermaid, source, curl)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Validate a payload without storing it
    Validate {
        /// Artifact type tag
        artifact_type: String,

        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show recent lifecycle events
    History {
        /// Maximum number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Everything a command needs, wired from configuration
pub struct Engine {
    pub orchestrator: Orchestrator,
    pub generator: Option<Arc<dyn GenerationService>>,
}

impl Engine {
    /// Converter for transforms; needs a generation service
    fn converter(&self) -> Result<GeneratedConversion> {
        let generator = self
            .generator
            .clone()
            .context("No generator configured; set generator.command in .artifex/config.yaml")?;
        Ok(GeneratedConversion::new(generator))
    }
}

/// Build the engine: plugins, stores, references and journal
pub async fn bootstrap(cfg: &ResolvedConfig) -> Result<Engine> {
    let generator: Option<Arc<dyn GenerationService>> = cfg.generator.command.as_ref().map(|program| {
        Arc::new(
            CommandGenerator::new(program.clone())
                .with_args(cfg.generator.args.clone())
                .with_timeout(cfg.generator.timeout()),
        ) as Arc<dyn GenerationService>
    });

    let mut services = PluginServices::new(Arc::new(FileBlobStore::new(&cfg.blobs)));
    if let Some(generator) = &generator {
        services = services.with_generator(Arc::clone(generator));
    }

    let mut manager = PluginManager::new();
    plugins::register_builtin(&mut manager, &services).context("Failed to register built-in plugins")?;

    let store: Arc<dyn CollectionStore> = Arc::new(FileStore::new(&cfg.store));
    let mut orchestrator = Orchestrator::new(Arc::new(manager), Arc::clone(&store))
        .with_references(Arc::new(ChatReferences::new(store)))
        .with_batch_defaults(cfg.batch);

    if cfg.journal_enabled {
        orchestrator = orchestrator.with_journal(Journal::open(cfg.journal_path()).await?);
    }

    Ok(Engine {
        orchestrator,
        generator,
    })
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        if let Commands::Config = self.command {
            return show_config();
        }

        let engine = bootstrap(config::config()?).await?;

        match self.command {
            Commands::Types { schema } => list_types(&engine, schema),
            Commands::Create {
                artifact_type,
                input,
            } => create_artifact(&engine, &artifact_type, input).await,
            Commands::Update { input } => update_artifact(&engine, input).await,
            Commands::Transform { id, target } => transform_artifact(&engine, &id, &target).await,
            Commands::Delete { id } => delete_artifact(&engine, &id).await,
            Commands::List { artifact_type } => list_artifacts(&engine, artifact_type).await,
            Commands::Show { id } => show_artifact(&engine, &id).await,
            Commands::Export { id, format } => export_artifact(&engine, &id, &format).await,
            Commands::Validate {
                artifact_type,
                input,
            } => validate_payload(&engine, &artifact_type, input).await,
            Commands::History { limit } => show_history(&engine, limit).await,
            Commands::Config => show_config(),
        }
    }
}

/// Read a JSON payload from a file or stdin
fn read_payload(input_file: Option<PathBuf>) -> Result<Value> {
    let input = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    };

    if input.trim().is_empty() {
        anyhow::bail!("Input is empty");
    }

    serde_json::from_str(&input).context("Input is not valid JSON")
}

fn parse_id(id: &str) -> Result<ArtifactId> {
    id.parse()
        .with_context(|| format!("Invalid artifact ID: {}", id))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_types(engine: &Engine, schema: bool) -> Result<()> {
    let plugins = engine.orchestrator.plugins();

    if !schema {
        println!("{:<14} {:<22} {:<10} {}", "TYPE", "PLUGIN", "VERSION", "CAPABILITIES");
        println!("{}", "-".repeat(70));
    }

    for artifact_type in plugins.registered_types() {
        let plugin = match plugins.plugin_for_type(artifact_type) {
            Some(plugin) => plugin,
            None => continue,
        };

        if schema {
            println!("# {}", artifact_type);
            print_json(&plugin.schema().unwrap_or(Value::Null))?;
            println!();
            continue;
        }

        let caps = artifact_type.capabilities();
        let flags: Vec<&str> = [
            (caps.exportable, "exportable"),
            (caps.generated, "generated"),
            (caps.conversational, "conversational"),
            (caps.transformable, "transformable"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();

        let manifest = plugin.manifest();
        println!(
            "{:<14} {:<22} {:<10} {}",
            artifact_type.as_str(),
            manifest.id,
            manifest.version,
            flags.join(",")
        );
    }

    Ok(())
}

async fn create_artifact(engine: &Engine, tag: &str, input: Option<PathBuf>) -> Result<()> {
    let payload = read_payload(input)?;
    let artifact = engine.orchestrator.create(tag, payload).await?;

    print_json(&artifact)?;
    eprintln!("\n[Created {} {}]", artifact.artifact_type(), artifact.id);
    Ok(())
}

async fn update_artifact(engine: &Engine, input: Option<PathBuf>) -> Result<()> {
    let payload = read_payload(input)?;
    let artifact = engine.orchestrator.update(payload).await?;

    print_json(&artifact)?;
    eprintln!("\n[Updated {} to revision {}]", artifact.id, artifact.metadata.revision);
    Ok(())
}

async fn transform_artifact(engine: &Engine, id: &str, target: &str) -> Result<()> {
    let id = parse_id(id)?;
    let converter = engine.converter()?;
    let artifact = engine
        .orchestrator
        .transform_artifact(id, target, &converter)
        .await?;

    print_json(&artifact)?;
    eprintln!("\n[Transformed {} into {} {}]", id, artifact.artifact_type(), artifact.id);
    Ok(())
}

async fn delete_artifact(engine: &Engine, id: &str) -> Result<()> {
    let artifact = engine.orchestrator.delete(parse_id(id)?).await?;
    println!("Deleted {} ({})", artifact.id, artifact.display_title());
    Ok(())
}

async fn list_artifacts(engine: &Engine, tag: Option<String>) -> Result<()> {
    let artifacts: Vec<Artifact> = match tag {
        Some(tag) => {
            let artifact_type: ArtifactType = tag.parse()?;
            engine.orchestrator.list_by_type(artifact_type).await?
        }
        None => engine.orchestrator.list().await?,
    };

    if artifacts.is_empty() {
        println!("No artifacts found");
        return Ok(());
    }

    println!("{:<38} {:<13} {:<5} {}", "ID", "TYPE", "REV", "TITLE");
    println!("{}", "-".repeat(80));

    for artifact in artifacts {
        println!(
            "{:<38} {:<13} {:<5} {}",
            artifact.id.to_string(),
            artifact.artifact_type().as_str(),
            artifact.metadata.revision,
            artifact.display_title()
        );
    }

    Ok(())
}

async fn show_artifact(engine: &Engine, id: &str) -> Result<()> {
    let artifact = engine.orchestrator.get(parse_id(id)?).await?;
    print_json(&artifact)
}

async fn export_artifact(engine: &Engine, id: &str, format: &str) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    let rendered = engine.orchestrator.export(parse_id(id)?, format).await?;
    print!("{}", rendered);
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}

async fn validate_payload(engine: &Engine, tag: &str, input: Option<PathBuf>) -> Result<()> {
    let payload = read_payload(input)?;
    let artifact_type = engine.orchestrator.validate(tag, &payload).await?;
    println!("Valid {} payload", artifact_type);
    Ok(())
}

async fn show_history(engine: &Engine, limit: usize) -> Result<()> {
    let journal = engine
        .orchestrator
        .journal()
        .context("Journal is disabled in configuration")?;
    let events = journal.tail(limit).await?;

    if events.is_empty() {
        println!("No events recorded");
        return Ok(());
    }

    println!("{:<26} {:<12} {:<13} {:<38} {}", "TIME", "EVENT", "TYPE", "ARTIFACT", "MS");
    println!("{}", "-".repeat(100));

    for event in events {
        println!(
            "{:<26} {:<12} {:<13} {:<38} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            event.event_type.to_string(),
            event.artifact_type.as_str(),
            event.artifact_id.to_string(),
            event.duration_ms.map(|ms| ms.to_string()).unwrap_or_default()
        );
    }

    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!("{}", serde_yaml::to_string(cfg).context("Failed to render configuration")?);

    Ok(())
}

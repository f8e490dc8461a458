//! sgpc CLI: scene-graph probabilistic completion.
//!
//! Every command prints JSON to stdout; logs go to stderr.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use sgpc::config::ServiceConfig;
use sgpc::scene::SceneGraph;
use sgpc::service::Service;

#[derive(Parser)]
#[command(name = "sgpc", version, about = "Scene-graph probabilistic completion")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SPN model artifact (overrides the configuration).
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Feature names JSON (overrides the configuration).
    #[arg(long, global = true)]
    feature_names: Option<PathBuf>,

    /// Number of ranked candidates per query.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    top_k: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file.
    Init {
        /// Destination path.
        #[arg(default_value = "sgpc.toml")]
        path: PathBuf,
    },

    /// Parse a prompt into a scene graph.
    Parse {
        /// Prompt text.
        text: String,
    },

    /// Encode a scene graph into evidence tokens.
    Encode {
        /// Scene graph JSON file.
        #[arg(long)]
        scene: PathBuf,
    },

    /// Run every query for a scene graph.
    Analyze {
        /// Scene graph JSON file.
        #[arg(long, conflicts_with = "prompt", required_unless_present = "prompt")]
        scene: Option<PathBuf>,

        /// Parse this prompt instead of reading a scene file.
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Run a single conditional query.
    Query {
        #[command(subcommand)]
        action: QueryAction,
    },

    /// Show the loaded vocabulary and model sizes.
    Info,
}

#[derive(Subcommand)]
enum QueryAction {
    /// Objects likely to co-occur with the evidence.
    CoOccur {
        /// Evidence tokens (comma-separated, e.g. "has_man,has_horse").
        #[arg(long, value_delimiter = ',')]
        evidence: Vec<String>,
    },
    /// Attributes likely for an object given the evidence.
    Attributes {
        /// Object name.
        object: String,
        /// Evidence tokens (comma-separated).
        #[arg(long, value_delimiter = ',')]
        evidence: Vec<String>,
    },
    /// Relationships likely between an object and a subject.
    Relationship {
        /// Object name (first slot of `<object>_<rel>_<subject>`).
        object: String,
        /// Subject name.
        subject: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init { path } = &cli.command {
        ServiceConfig::default().save(path)?;
        eprintln!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    config.apply_env()?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(feature_names) = cli.feature_names {
        config.feature_names = feature_names;
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k as usize;
    }
    config.validate()?;

    let service = Service::from_config(&config)?;

    match cli.command {
        Commands::Init { .. } => {}

        Commands::Parse { text } => {
            print_json(&service.parse_prompt(&text)?)?;
        }

        Commands::Encode { scene } => {
            let scene = read_scene(&scene)?;
            print_json(&serde_json::json!({ "evidences": service.evidence(&scene) }))?;
        }

        Commands::Analyze { scene, prompt } => {
            let scene = match (scene, prompt) {
                (Some(path), _) => read_scene(&path)?,
                (None, Some(prompt)) => service.parse_prompt(&prompt)?,
                (None, None) => miette::bail!("either --scene or --prompt is required"),
            };
            print_json(&service.analyze(&scene)?)?;
        }

        Commands::Query { action } => match action {
            QueryAction::CoOccur { evidence } => {
                print_json(&service.co_occurrence(&evidence)?)?;
            }
            QueryAction::Attributes { object, evidence } => {
                print_json(&service.attributes(&evidence, &object)?)?;
            }
            QueryAction::Relationship { object, subject } => {
                print_json(&service.relationships(&object, &subject)?)?;
            }
        },

        Commands::Info => {
            print_json(&service.info())?;
        }
    }

    Ok(())
}

fn read_scene(path: &Path) -> Result<SceneGraph> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    serde_json::from_str(&content).into_diagnostic()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

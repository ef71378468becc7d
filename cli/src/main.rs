//! rigpa: command-line access to the Dzogchen knowledge base.
//!
//! Every invocation builds a fresh knowledge base from the configured corpus,
//! the persisted custom texts and the saved dictionary definitions, runs one
//! command, and exits. Command
//! output goes to stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rigpa_knowledge::{DocumentType, KnowledgeConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod definitions;

const DEFAULT_BASE_PROMPT: &str =
    "You are a knowledgeable guide to Tibetan Buddhist and Dzogchen terminology.";

#[derive(Parser)]
#[command(name = "rigpa")]
#[command(about = "Dzogchen terminology knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/rigpa/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Terminology corpus JSON (defaults to the bundled terms)
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    /// Saved dictionary definitions (defaults to definitions_path)
    #[arg(long, global = true, value_name = "FILE")]
    definitions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show document counts and search mode
    Stats,

    /// Search the knowledge base
    Search {
        query: String,

        /// Number of results (defaults to search.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Print a prompt augmented with retrieved context
    Prompt {
        query: String,

        /// Base prompt to augment
        #[arg(long, default_value = DEFAULT_BASE_PROMPT)]
        base: String,
    },

    /// List documents
    List {
        /// Only documents of this type (term, text, definition)
        #[arg(long = "type", value_name = "TYPE")]
        doc_type: Option<DocumentType>,
    },

    /// Add a custom text
    Add { text: String },

    /// Remove a custom text or definition by id
    Remove { id: String },

    /// Export custom texts as JSON
    Export {
        /// Output file (defaults to stdout)
        file: Option<PathBuf>,
    },

    /// Import custom texts from a JSON export
    Import { file: PathBuf },

    /// Remove every document and erase persisted texts and definitions
    Clear,

    /// Import definitions from the dictionary wiki and save them
    Dictionary {
        #[command(subcommand)]
        source: DictionarySource,

        /// Also export this import's documents to a JSON file
        #[arg(long, global = true)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DictionarySource {
    /// Import pages by Wylie title
    Terms {
        terms: Vec<String>,

        /// File with one title per line
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Import the common Dzogchen terms
    Common,

    /// Import pages by wiki URL
    Url {
        urls: Vec<String>,

        /// File with one URL per line
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Import the members of a wiki category
    Category {
        name: String,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Look up page titles without importing
    Search {
        term: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Show wiki statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(KnowledgeConfig::default_path);
    let config = KnowledgeConfig::load(&config_path);

    let default_filter = config
        .as_ref()
        .map(|c| c.log_level.as_str())
        .unwrap_or("rigpa=info");
    init_logging(default_filter);

    let mut config = config.with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(path) = cli.definitions.clone() {
        config.definitions_path = path;
    }
    commands::run(cli, config).await
}

/// Initialize logging to stderr, `RUST_LOG` taking precedence.
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("rigpa=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

//! deepsift CLI: the main entry point.
//!
//! Commands:
//! - `ask`       : Research a question and print a cited answer
//! - `config`    : Show, locate, or validate the configuration
//! - `providers` : List supported search and LLM backends

use clap::{Parser, Subcommand};
use deepsift_config::{EffortTier, LlmProviderKind, SearchProviderKind};

mod commands;

#[derive(Parser)]
#[command(
    name = "deepsift",
    about = "deepsift: iterative web research with cited answers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a question on the web and answer it with citations
    Ask {
        /// The question to research
        question: String,

        /// Research effort: low, medium, or high
        #[arg(short, long)]
        effort: Option<EffortTier>,

        /// Queries in the first iteration (overrides the effort tier)
        #[arg(long)]
        queries: Option<u32>,

        /// Maximum reflection loops (overrides the effort tier)
        #[arg(long)]
        loops: Option<u32>,

        /// Search backend: google, brave, or searxng
        #[arg(long)]
        search: Option<SearchProviderKind>,

        /// LLM backend: google, openai, or custom
        #[arg(long)]
        llm: Option<LlmProviderKind>,

        /// Model name for every step
        #[arg(short, long)]
        model: Option<String>,

        /// Endpoint for an OpenAI-compatible backend
        #[arg(long)]
        base_url: Option<String>,

        /// Print the whole outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List supported search and LLM backends
    Providers,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Print the config file location
    Path,
    /// Check the configuration and the selected providers
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the answer
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            question,
            effort,
            queries,
            loops,
            search,
            llm,
            model,
            base_url,
            json,
        } => {
            commands::ask::run(commands::ask::AskArgs {
                question,
                effort,
                queries,
                loops,
                search,
                llm,
                model,
                base_url,
                json,
            })
            .await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Providers => commands::providers::run().await?,
    }

    Ok(())
}

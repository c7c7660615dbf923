use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use ward_rag::commands::{ask, chat, run_ingest, search, show_status};
use ward_rag::config::{Config, get_config_dir, run_interactive_config, show_config};
use ward_rag::indexer::ItemErrorPolicy;

#[derive(Parser)]
#[command(name = "ward-rag")]
#[command(about = "Answers which municipal ward a landmark is in")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and all ingested data
    #[arg(long, global = true, env = "WARD_RAG_HOME")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, boundary source and geocoder settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load ward boundaries, describe and embed them
    Ingest {
        /// Download the boundary source again instead of using the cached copy
        #[arg(long)]
        refresh: bool,
        /// What to do when a single ward cannot be embedded or stored
        #[arg(long, value_enum, default_value_t = ItemErrorPolicy::Abort)]
        on_error: ItemErrorPolicy,
    },
    /// Ask which ward a landmark is in
    Ask {
        question: String,
        /// Print the full result, including the ward geometry, as JSON
        #[arg(long)]
        json: bool,
        /// Run ingestion first if no processed ward data exists
        #[arg(long)]
        auto_ingest: bool,
    },
    /// Ask questions interactively
    Chat,
    /// Find the ward descriptions closest to a piece of text
    Search {
        text: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Show ingestion history, store counts and consistency
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => get_config_dir().context("Failed to determine the base directory")?,
    };

    if let Commands::Config { show: false } = cli.command {
        return run_interactive_config(&base_dir);
    }

    let config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Config { .. } => show_config(&config)?,
        Commands::Ingest { refresh, on_error } => run_ingest(config, refresh, on_error).await?,
        Commands::Ask {
            question,
            json,
            auto_ingest,
        } => ask(config, &question, json, auto_ingest).await?,
        Commands::Chat => chat(config).await?,
        Commands::Search { text, limit } => search(config, &text, limit).await?,
        Commands::Status => show_status(&config).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_parsing() {
        let cli = Cli::try_parse_from(["ward-rag", "ask", "Which ward is the Red Fort in?", "--json"])
            .expect("should parse");

        match cli.command {
            Commands::Ask {
                question,
                json,
                auto_ingest,
            } => {
                assert_eq!(question, "Which ward is the Red Fort in?");
                assert!(json);
                assert!(!auto_ingest);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn ingest_defaults_to_abort() {
        let cli = Cli::try_parse_from(["ward-rag", "ingest"]).expect("should parse");

        match cli.command {
            Commands::Ingest { refresh, on_error } => {
                assert!(!refresh);
                assert_eq!(on_error, ItemErrorPolicy::Abort);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn ingest_skip_policy() {
        let cli = Cli::try_parse_from(["ward-rag", "ingest", "--refresh", "--on-error", "skip"])
            .expect("should parse");

        assert!(matches!(
            cli.command,
            Commands::Ingest {
                refresh: true,
                on_error: ItemErrorPolicy::Skip
            }
        ));
    }

    #[test]
    fn base_dir_is_global() {
        let cli = Cli::try_parse_from(["ward-rag", "status", "--base-dir", "/tmp/wards"])
            .expect("should parse");

        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/wards")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn search_limit() {
        let cli = Cli::try_parse_from(["ward-rag", "search", "old city markets", "--limit", "3"])
            .expect("should parse");

        match cli.command {
            Commands::Search { text, limit } => {
                assert_eq!(text, "old city markets");
                assert_eq!(limit, 3);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn invalid_policy_rejected() {
        let result = Cli::try_parse_from(["ward-rag", "ingest", "--on-error", "retry"]);
        assert!(result.is_err());
    }
}

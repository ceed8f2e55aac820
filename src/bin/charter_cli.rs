//! Manual driver for the translation core.
//!
//! Wires the real Jira and OpenAI clients from the environment and runs one
//! operation per invocation. Intended for smoke-testing against a live
//! instance, not for production traffic.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use jira_agentic::{CharterService, FieldCatalog, JiraClient, OpenAiClient};

#[derive(Parser)]
#[command(name = "charter_cli", about = "Natural-language Jira field updates and queries")]
struct Cli {
    /// Path to the precomputed field embedding corpus (JSON)
    #[arg(long, env = "FIELD_EMBEDDINGS_PATH")]
    embeddings: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a free-text update instruction to a ticket
    Update {
        /// Ticket key, e.g. DELPROJ-2443
        ticket: String,
        /// Instruction, e.g. "add Phishing detection to CFFC services"
        instruction: String,
    },
    /// Parse an instruction without touching the ticket
    Parse { instruction: String },
    /// Resolve a free-text project reference to project keys
    ResolveProject { input: String },
    /// Synthesize a JQL query from free text
    Query { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut catalog = FieldCatalog::builtin();
    if let Some(path) = &cli.embeddings {
        catalog = catalog
            .load_embeddings(path)
            .context("loading embedding corpus")?;
    }

    let jira = Arc::new(JiraClient::from_env().context("configuring Jira client")?);
    let openai = Arc::new(OpenAiClient::from_env().context("configuring OpenAI client")?);

    let service = CharterService::new(
        Arc::new(catalog),
        openai.clone(),
        openai,
        jira.clone(),
        jira,
    );

    match cli.command {
        Command::Update {
            ticket,
            instruction,
        } => {
            let outcome = service.apply_update(&ticket, &instruction).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Parse { instruction } => {
            let intent = service.parse_update(&instruction).await?;
            println!("{}", serde_json::to_string_pretty(&intent)?);
        }
        Command::ResolveProject { input } => {
            let keys = service.resolve_entity(&input).await?;
            println!("{}", keys.join(", "));
        }
        Command::Query { text } => {
            let intent = service.synthesize_query(&text).await?;
            println!("{}", serde_json::to_string_pretty(&intent)?);
        }
    }

    Ok(())
}

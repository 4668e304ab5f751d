//! # Docsmith CLI (`docsmith`)
//!
//! ## Usage
//!
//! ```bash
//! docsmith --config ./config/docsmith.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsmith serve` | Start the HTTP server |
//! | `docsmith generate <repo_url>` | Provision the repository's agent if needed and print its documentation |
//! | `docsmith chat <repo_url>` | Chat with the repository's agent (`exit` quits) |
//! | `docsmith sections <file>` | Split a text file into sections and print them as JSON |
//!
//! Set `RUST_LOG` to change the log level (default `info`). Logs go to
//! stderr so command output can be piped.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docsmith::config;
use docsmith::pipeline::DocService;
use docsmith::sections;

/// Docsmith: repository documentation backed by per-repository knowledge
/// agents.
#[derive(Parser)]
#[command(
    name = "docsmith",
    about = "Docsmith: repository documentation backed by per-repository knowledge agents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docsmith.toml`. See
    /// `config/docsmith.example.toml` for every option.
    #[arg(long, global = true, default_value = "./config/docsmith.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves `/repo`, `/documentation`,
    /// `/chat_with_agent`, `/repos` and `/health`.
    Serve,

    /// Generate documentation for a repository and print it.
    ///
    /// Provisions the repository's agent first when none is bound, which
    /// waits for ingestion to complete. The result is stored like a
    /// `POST /repo` call.
    Generate {
        /// Repository URL (https://, ssh:// or user@host:path) or local
        /// directory.
        repo_url: String,
    },

    /// Chat interactively with a repository's agent.
    Chat {
        /// Repository URL (https://, ssh:// or user@host:path) or local
        /// directory.
        repo_url: String,
    },

    /// Split a local text file into sections and print them as JSON.
    ///
    /// Does not need a config file.
    Sections {
        /// Text file to segment.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let load_config = || config::load_config(&cli.config);

    match cli.command {
        Commands::Serve => {
            let cfg = load_config()?;
            docsmith::server::run_server(&cfg).await?;
        }
        Commands::Generate { repo_url } => {
            let service = cli_service(load_config()?)?;
            let doc = service.generate_documentation(&repo_url).await?;
            println!("{}", doc.raw_text);
        }
        Commands::Chat { repo_url } => {
            let service = cli_service(load_config()?)?;
            run_chat(&service, &repo_url).await?;
        }
        Commands::Sections { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let sections = sections::segment(&text);
            println!("{}", serde_json::to_string_pretty(&sections)?);
        }
    }

    Ok(())
}

/// Local directories are accepted as repositories on the command line,
/// whatever `[snapshot].allow_local_paths` says.
fn cli_service(mut cfg: config::Config) -> anyhow::Result<DocService> {
    cfg.snapshot.allow_local_paths = true;
    DocService::from_config(Arc::new(cfg))
}

/// Read-eval loop over stdin. Each line is one chat turn; `exit` quits.
async fn run_chat(service: &DocService, repo_url: &str) -> anyhow::Result<()> {
    let repo = docsmith::models::RepoId::from_url(repo_url)?;
    let agent_id = service.ensure_agent(&repo).await?;
    println!("Chatting with agent {} for {}", agent_id, repo);
    println!("Type 'exit' to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match service.ask(&agent_id, input).await {
            Ok(reply) => println!("Agent: {}\n", reply),
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }

    Ok(())
}

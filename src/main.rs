//! # Ask Your Documents CLI (`ask-docs`)
//!
//! Starts the web app, or answers a single question from the terminal against
//! the documents already in the upload directory.
//!
//! ## Usage
//!
//! ```bash
//! ask-docs --config ./config/ask-docs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ask-docs serve` | Start the web app on `[server].bind` |
//! | `ask-docs files` | List the stored documents |
//! | `ask-docs ask "<question>"` | Index the stored documents and answer once |
//!
//! `GROQ_API_KEY` (or whatever `[llm].api_key_env` names) is read from the
//! environment; a `.env` file in the working directory is loaded first.
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ask_docs::app::App;
use ask_docs::config;
use ask_docs::error::ERROR_MARKER;
use ask_docs::file_store::FileStore;
use ask_docs::models::Role;
use ask_docs::server;
use ask_docs::session::Session;

/// Ask Your Documents: upload PDF or Word files and ask questions about them.
#[derive(Parser)]
#[command(
    name = "ask-docs",
    about = "Upload PDF or Word documents and ask questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ask-docs.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/ask-docs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web app.
    Serve,

    /// List documents in the upload directory.
    Files,

    /// Answer one question from the stored documents and exit.
    ///
    /// Runs the same extraction, chunking and indexing as the web app, then
    /// prints the answer followed by the source file names.
    Ask {
        /// The question to ask.
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(cfg).await?;
        }
        Commands::Files => {
            let files = FileStore::open(&cfg.storage.upload_dir)?.list()?;
            if files.is_empty() {
                println!("No files uploaded yet.");
            }
            for name in files {
                println!("{}", name);
            }
        }
        Commands::Ask { question } => {
            run_ask(cfg, &question).await?;
        }
    }

    Ok(())
}

async fn run_ask(cfg: config::Config, question: &str) -> anyhow::Result<()> {
    let app = App::from_config(cfg)?;
    let mut session = Session::new();
    app.ask(&mut session, question).await?;

    for notice in session.take_notices() {
        eprintln!("[{}] {}", notice.level, notice.message);
    }

    let Some(reply) = session
        .transcript()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
    else {
        bail!("no answer produced");
    };
    if let Some(error) = reply.content.strip_prefix(ERROR_MARKER) {
        bail!("{}", error);
    }

    println!("{}", reply.content);
    if !reply.sources.is_empty() {
        println!();
        println!("Sources: {}", reply.sources.join(", "));
    }
    Ok(())
}

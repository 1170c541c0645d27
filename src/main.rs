//! # Portfolio chat CLI (`pchat`)
//!
//! Indexes a folder of personal documents and answers questions about
//! their owner, from the terminal or over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! pchat --config ./config/pchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pchat init` | Create the index file and schema |
//! | `pchat index` | Load the corpus into the index |
//! | `pchat search "<query>"` | Show the best-matching chunks with scores |
//! | `pchat ask "<message>"` | Answer one message |
//! | `pchat chat` | Interactive conversation (`reset`, `refresh`, `quit`) |
//! | `pchat health` | Index size, models and sessions as JSON |
//! | `pchat serve` | Start the HTTP API |
//! | `pchat completions <shell>` | Print shell completions |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use portfolio_chat::chat::{AppContext, ChatOrchestrator};
use portfolio_chat::completion::{create_backend, CompletionBackend, DisabledBackend};
use portfolio_chat::config::{self, Config};
use portfolio_chat::index::SqliteIndex;
use portfolio_chat::models::LoadSummary;
use portfolio_chat::server;

/// Retrieval-augmented assistant for a personal document corpus.
///
/// All commands except `completions` read a TOML configuration file given
/// by `--config`. See `config/pchat.example.toml` for every option.
#[derive(Parser)]
#[command(
    name = "pchat",
    about = "Answer questions about a person from their own documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index file and schema. Idempotent.
    Init,

    /// Rebuild the index from the corpus folder.
    ///
    /// Unchanged chunks keep their stored embeddings; files that cannot be
    /// read are skipped and listed.
    Index {
        /// Corpus root (defaults to `[corpus] root`).
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Show the chunks most similar to a query.
    Search {
        query: String,

        /// Number of results (defaults to `[retrieval] top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a single message.
    Ask {
        message: String,

        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Interactive conversation on stdin.
    Chat {
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Print index and session status as JSON.
    Health,

    /// Start the HTTP API on `[server] bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions { shell: clap_complete::Shell },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "pchat", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            SqliteIndex::open(&cfg.index.path).await?;
            println!("Index initialized at {}", cfg.index.path.display());
        }
        Commands::Index { root } => {
            let ctx = AppContext::from_config(cfg).await?;
            let root = root.unwrap_or_else(|| ctx.config.corpus.root.clone());
            let summary = ctx
                .knowledge
                .load_corpus(&root)
                .await
                .with_context(|| format!("Failed to index {}", root.display()))?;
            print_summary(&root, &summary);
        }
        Commands::Search { query, k } => {
            let ctx = AppContext::from_config(cfg).await?;
            let k = k.unwrap_or(ctx.config.retrieval.top_k);
            let hits = ctx.knowledge.retrieve_scored(&query, k).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                let meta = &hit.entry.metadata;
                println!(
                    "{}. [{:.3}] {} #{}",
                    i + 1,
                    hit.score,
                    meta.document_id,
                    meta.sequence_index
                );
                println!("    excerpt: \"{}\"", excerpt(&hit.entry.text, 160));
                println!("    id: {}", hit.entry.chunk_id);
                println!();
            }
        }
        Commands::Ask { message, session } => {
            let chat = orchestrator(cfg, true).await?;
            let reply = chat.send_message(&session, &message).await?;
            println!("{}", reply);
        }
        Commands::Chat { session } => {
            let chat = orchestrator(cfg, true).await?;
            run_repl(&chat, &session).await?;
        }
        Commands::Health => {
            let chat = orchestrator(cfg, false).await?;
            let health = chat.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Serve => {
            let bind = cfg.server.bind.clone();
            let chat = orchestrator(cfg, true).await?;
            server::run_server(Arc::new(chat), &bind).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Build the orchestrator; without `completion` no model is contacted.
async fn orchestrator(cfg: Config, completion: bool) -> anyhow::Result<ChatOrchestrator> {
    let backend: Arc<dyn CompletionBackend> = if completion {
        Arc::from(create_backend(&cfg.completion)?)
    } else {
        Arc::new(DisabledBackend)
    };
    let ctx = AppContext::from_config(cfg).await?;
    Ok(ChatOrchestrator::new(&ctx, backend))
}

async fn run_repl(chat: &ChatOrchestrator, session: &str) -> anyhow::Result<()> {
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        println!("Ask a question. Commands: reset, refresh, quit.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "reset" => {
                chat.reset_session(session).await;
                println!("Conversation cleared.");
            }
            "refresh" => match chat.refresh_corpus().await {
                Ok(summary) => println!(
                    "Reloaded {} documents ({} chunks).",
                    summary.documents_loaded, summary.chunks_indexed
                ),
                Err(e) => eprintln!("refresh failed: {}", e),
            },
            message => match chat.send_message(session, message).await {
                Ok(reply) => println!("{}\n", reply),
                Err(e) => eprintln!("error: {}", e),
            },
        }
    }
    Ok(())
}

fn print_summary(root: &std::path::Path, summary: &LoadSummary) {
    println!("index {}", root.display());
    println!("  documents loaded: {}", summary.documents_loaded);
    println!("  documents skipped: {}", summary.documents_skipped);
    for skipped in &summary.skipped {
        println!("    {}: {}", skipped.path, skipped.reason);
    }
    println!("  chunks indexed: {}", summary.chunks_indexed);
    println!("  chunks embedded: {}", summary.chunks_embedded);
    println!("  chunks reused: {}", summary.chunks_reused);
    println!("ok");
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat.to_string(),
    }
}

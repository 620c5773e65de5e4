use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::io;

use mail_digest::auth::{token_manager::TokenManager, token_store};
use mail_digest::chat::run_chat;
use mail_digest::config::{self, Config, load_config};
use mail_digest::llm::client::OllamaClient;
use mail_digest::llm::embed::OllamaEmbedder;
use mail_digest::mail::GmailFetcher;
use mail_digest::mail::gmail_client::GmailClient;
use mail_digest::pipeline::Pipeline;
use mail_digest::store::sqlite::SqliteVectorStore;

#[derive(Parser)]
#[command(name = "mail_digest")]
#[command(about = "Summarize unread Gmail with a local model and chat over it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, summarize and index unread mail, then chat (default)
    Run,

    /// Chat over mail indexed by earlier runs
    Chat,

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn open_store(cfg: &Config) -> Result<SqliteVectorStore> {
    let db_path = config::resolve_db_path(cfg)?;
    let embedder = OllamaEmbedder::new(cfg.embeddings_url(), cfg.embed_model())?;
    SqliteVectorStore::open(&db_path, &cfg.collection(), Box::new(embedder))
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd.unwrap_or(Command::Run) {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            io::Read::read_to_string(&mut io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::Chat => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let llm = OllamaClient::new(cfg.generate_url(), cfg.model())?;
            let store = open_store(&cfg)?;

            run_chat(&mut io::stdin().lock(), &mut io::stdout(), &store, &llm)?;
            store.close()
        }

        Command::Run => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let llm = OllamaClient::new(cfg.generate_url(), cfg.model())?;
            let store = open_store(&cfg)?;

            let token_mgr = TokenManager::from_config(&cfg)?;
            let gmail = GmailClient::new(cfg.gmail_api_base())?;
            let mut mail = GmailFetcher::new(token_mgr, gmail);

            let digest_dir = match config::resolve_summary_dir(&cfg) {
                Ok(dir) => Some(dir),
                Err(e) => {
                    log::warn!("digest disabled: {e:#}");
                    None
                }
            };

            let end = Pipeline {
                mail: &mut mail,
                index: &store,
                llm: &llm,
                digest_dir,
            }
            .run(&mut io::stdin().lock(), &mut io::stdout())?;
            log::debug!("run ended: {end:?}");

            store.close()
        }
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bookline::channels::webhook::{self, WebhookState};
use bookline::channels::webhook_server::WebhookServer;
use bookline::channels::whatsapp::WhatsAppClient;
use bookline::config::Config;
use bookline::llm::{CompletionClient, OpenAiChatProvider};
use bookline::orchestrator::Orchestrator;
use bookline::store::postgres::PgStore;

#[derive(Parser, Debug)]
#[command(name = "bookline", about = "Multi-tenant WhatsApp reservation agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            PgStore::run_migrations(&config.database).await?;
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    PgStore::run_migrations(&config.database).await?;
    let store = Arc::new(PgStore::new(&config.database).await?);

    let provider = Arc::new(OpenAiChatProvider::new(&config.llm));
    let completions = CompletionClient::new(provider, config.llm.default_api_key.clone());
    let outbound = Arc::new(WhatsAppClient::new(config.channel.graph_base_url.clone()));

    let orchestrator = Arc::new(Orchestrator::new(store, completions, outbound));

    let state = Arc::new(WebhookState {
        orchestrator,
        verify_token: config.channel.verify_token.clone(),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing bind address")?;

    let mut server = WebhookServer::new(addr);
    server.add_routes(webhook::routes(state));
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}

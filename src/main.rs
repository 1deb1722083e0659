use anyhow::Context as _;
use axum::Router;
use axum::routing::{get, post};
use clap::Parser;
use redmine_watchbot::db::{Pool, Store};
use redmine_watchbot::handlers::Context;
use redmine_watchbot::poller::Poller;
use redmine_watchbot::redmine::{IssueTracker, RedmineClient};
use redmine_watchbot::zulip::{self, Notifier, ZulipClient};
use redmine_watchbot::{config, logger};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Watches Redmine for new issues, assigns them in turn and reports them on Zulip.
#[derive(Parser, Debug)]
#[clap(version)]
struct Cli {
    /// Configuration file. Defaults to `$WATCHBOT_CONFIG`, then to
    /// `watchbot.toml` if it exists.
    #[clap(long)]
    config: Option<PathBuf>,
    /// Run a single polling pass and exit. The first pass of a watch only
    /// records which issues exist, so this is mostly useful for checking
    /// connectivity.
    #[clap(long)]
    once: bool,
}

async fn run_server(cli: Cli) -> anyhow::Result<()> {
    let config = config::load(cli.config.as_deref())?;
    tracing::debug!("configuration: {config:?}");

    let db: Arc<dyn Store> = Arc::new(Pool::new_from_env().await?);
    let tracker: Arc<dyn IssueTracker> = Arc::new(RedmineClient::new_from_env(&config)?);
    let notifier: Arc<dyn Notifier> = Arc::new(ZulipClient::new_from_env(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut poller = Poller::new(
        tracker.clone(),
        db.clone(),
        notifier,
        config.check_interval(),
        shutdown_rx.clone(),
    );
    if cli.once {
        return poller.poll_once().await;
    }

    let webhook_token: SecretString = std::env::var("ZULIP_WEBHOOK_TOKEN")
        .context("ZULIP_WEBHOOK_TOKEN is missing")?
        .into();
    let ctx = Arc::new(Context {
        tracker,
        db,
        webhook_token,
    });

    let poller = tokio::spawn(poller.run());

    let app = Router::new()
        .route("/", get(|| async { "Redmine watchbot is up." }))
        .route("/zulip-hook", post(zulip::webhook))
        .with_state(ctx);

    let port = std::env::var("PORT")
        .ok()
        .map(|p| p.parse::<u16>().context("`PORT` is not a valid port number"))
        .transpose()?
        .unwrap_or(8000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received Ctrl-C, shutting down"),
            Err(e) => {
                tracing::error!("cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("server failed")?;

    poller.await.context("poller task panicked")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    if let Err(e) = run_server(cli).await {
        eprintln!("Failed to run server: {e:?}");
        std::process::exit(1);
    }
}

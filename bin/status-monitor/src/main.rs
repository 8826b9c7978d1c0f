//! Entrypoint.

use std::sync::Arc;

use clap::Parser;
use config::Opts;
use dotenvy::dotenv;
use incident::{Client, EventCache, EventSink, PollScheduler, ProviderRegistry, TracingSink, WebhookProcessor};
use runtime::{logging::init_tracing, shutdown};
use server::AppState;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        dotenvy::from_filename(custom_env_file)?;
    } else {
        // Try the default .env file, and ignore if it doesn't exist.
        dotenv().ok();
    }

    let opts = Opts::parse();
    init_tracing(opts.log_format);

    let registry = Arc::new(ProviderRegistry::builtin().restrict_to(&opts.poller.provider_keys())?);
    let enabled: Vec<&str> = registry.enabled().map(|p| p.key.as_str()).collect();
    info!(providers = ?enabled, "🔭 Status monitor starting...");

    let secret = opts.webhook.resolve_secret();
    info!("Webhook path: /webhook/{}", secret);
    info!("Subscribe endpoint: {}", opts.webhook.endpoint(&secret));

    let cache = Arc::new(EventCache::default());
    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);

    let token = CancellationToken::new();
    let signal_task = shutdown::cancel_on_shutdown(shutdown::ShutdownSignal::new()?, token.clone());

    let client = Client::new(opts.poller.http_timeout())?;
    let poller = PollScheduler::new(
        Arc::clone(&registry),
        client,
        Arc::clone(&cache),
        Arc::clone(&sink),
        opts.poller.interval(),
    )
    .spawn(token.clone());

    let processor = WebhookProcessor::new(registry, cache, sink);
    let addr = opts.server.bind_addr()?;
    let served = server::run(addr, AppState::new(secret, processor), token.clone()).await;

    token.cancel();
    if let Err(e) = poller.await {
        error!(error = %e, "Poller task failed");
    }
    signal_task.abort();
    info!("Status monitor stopped");
    served
}

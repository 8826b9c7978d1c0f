//! Operator CLI for webhook subscriptions and a quick status overview.

use clap::{Parser, Subcommand};
use config::{LogFormat, PollerOpts, WebhookOpts};
use dotenvy::dotenv;
use eyre::{Result, bail};
use futures::future::join_all;
use incident::{Client, Provider, ProviderRegistry};
use runtime::logging::init_tracing;

/// Contact email sent with new subscriptions when none is given.
const DEFAULT_SUBSCRIBER_EMAIL: &str = "monitor@status-monitor.local";

/// CLI options for statusctl
#[derive(Debug, Parser)]
#[clap(name = "statusctl", about = "Manage Statuspage webhook subscriptions")]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    #[clap(flatten)]
    poller: PollerOpts,

    #[clap(flatten)]
    webhook: WebhookOpts,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Subscribe the webhook endpoint to a provider
    Subscribe {
        /// Provider key
        provider: String,
        /// Contact email registered with the subscription
        #[clap(long, default_value = DEFAULT_SUBSCRIBER_EMAIL)]
        email: String,
    },
    /// Remove a webhook subscription
    Unsubscribe {
        /// Provider key
        provider: String,
        /// Subscriber ID returned by `subscribe`
        subscriber_id: String,
    },
    /// List enabled providers and the webhook endpoint
    List,
    /// Show the current status of every enabled provider
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_tracing(LogFormat::Pretty);

    let registry = ProviderRegistry::builtin().restrict_to(&cli.poller.provider_keys())?;
    let client = Client::new(cli.poller.http_timeout())?;

    match cli.command {
        Command::Subscribe { provider, email } => {
            let provider = lookup(&registry, &provider)?;
            let Some(secret) = cli.webhook.secret.as_deref().filter(|s| !s.is_empty()) else {
                bail!("WEBHOOK_SECRET must be set to subscribe");
            };
            let endpoint = cli.webhook.endpoint(secret);
            let id = client.subscribe(provider, &endpoint, &email).await?;
            println!("Subscribed {} to {}", endpoint, provider.name);
            println!("Subscriber ID: {}", id);
        }
        Command::Unsubscribe { provider, subscriber_id } => {
            let provider = lookup(&registry, &provider)?;
            client.unsubscribe(provider, &subscriber_id).await?;
            println!("Removed subscriber {} from {}", subscriber_id, provider.name);
        }
        Command::List => {
            for provider in registry.enabled() {
                println!("{:<12} {:<12} {}", provider.key, provider.name, provider.base_url);
            }
            match cli.webhook.secret.as_deref().filter(|s| !s.is_empty()) {
                Some(secret) => println!("\nWebhook endpoint: {}", cli.webhook.endpoint(secret)),
                None => println!("\nWebhook endpoint: WEBHOOK_SECRET not set"),
            }
        }
        Command::Status => {
            let providers: Vec<&Provider> = registry.enabled().collect();
            let summaries = join_all(providers.iter().map(|p| client.summary(p))).await;
            for (provider, summary) in providers.into_iter().zip(summaries) {
                match summary {
                    Ok(summary) => {
                        println!("{}: {}", provider.name, summary.status.description);
                        for component in summary.degraded_components() {
                            println!("  - {}: {}", component.name, component.status);
                        }
                    }
                    Err(e) => println!("{}: error fetching status: {:#}", provider.name, e),
                }
            }
        }
    }
    Ok(())
}

fn lookup<'a>(registry: &'a ProviderRegistry, key: &str) -> Result<&'a Provider> {
    match registry.get(key) {
        Some(provider) => Ok(provider),
        None => bail!("unknown provider `{}`, available: {}", key, registry.keys().join(", ")),
    }
}

//! WebSub subscription operator tool
//!
//! Creates subscriptions and sends the intents to hubs, inspects stored
//! subscriptions and content, and checks that the callback endpoint is
//! reachable at its public URL. Output is JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use ws_config::{AppConfig, ConfigLoader};
use ws_hub::{CallbackProbe, HubClient};
use ws_store::{SqliteSubscriptionStore, SubscriptionStore};

#[derive(Parser, Debug)]
#[command(name = "ws-cli")]
#[command(about = "Manage WebSub subscriptions")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database URL, e.g. sqlite://websub.db
    #[arg(long, global = true)]
    database: Option<String>,

    /// Public URL of the callback endpoint's /subscriptions route
    #[arg(long, global = true)]
    callback_base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a subscription and ask the hub to subscribe
    Subscribe {
        hub_url: String,
        topic_url: String,
        /// Requested lease; fractional seconds are truncated
        #[arg(long)]
        lease_seconds: Option<f64>,
    },
    /// Ask the hub to unsubscribe an existing subscription
    Unsubscribe { subscription_id: String },
    /// List subscriptions for a hub and topic
    List { hub_url: String, topic_url: String },
    /// Show one subscription
    Show { subscription_id: String },
    /// List content received for a subscription (metadata only)
    Updates { subscription_id: String },
    /// Check the callback endpoint answers validation probes correctly
    Verify,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("failed to load configuration")?;
    if let Some(database) = &cli.database {
        config.database.url = database.clone();
    }
    if let Some(base) = &cli.callback_base_url {
        config.callback.base_url = base.clone();
    }
    config.validate()?;
    Ok(config)
}

fn callback_base(config: &AppConfig) -> Result<&str> {
    let base = config.callback.base_url.as_str();
    if base.is_empty() {
        bail!("a callback base URL is required: pass --callback-base-url or set callback.base_url");
    }
    Ok(base)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Arc<SqliteSubscriptionStore>> {
    let store = SqliteSubscriptionStore::connect(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    store.init_schema().await?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    ws_common::logging::init_stderr_logging("warn");

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Subscribe {
            hub_url,
            topic_url,
            lease_seconds,
        } => {
            let base = callback_base(&config)?;
            let store = open_store(&config).await?;
            let client = HubClient::new(store.clone(), &config.hub)?;

            let subscription = client
                .create_and_subscribe(&hub_url, &topic_url, base, lease_seconds)
                .await?;
            print_json(&subscription)?;
        }
        Command::Unsubscribe { subscription_id } => {
            let base = callback_base(&config)?;
            let store = open_store(&config).await?;
            let client = HubClient::new(store.clone(), &config.hub)?;

            let subscription = client.unsubscribe_by_id(&subscription_id, base).await?;
            print_json(&subscription)?;
        }
        Command::List { hub_url, topic_url } => {
            let store = open_store(&config).await?;
            for subscription in store.find_by_hub_and_topic(&hub_url, &topic_url).await? {
                print_json(&subscription)?;
            }
        }
        Command::Show { subscription_id } => {
            let store = open_store(&config).await?;
            print_json(&store.read(&subscription_id).await?)?;
        }
        Command::Updates { subscription_id } => {
            let store = open_store(&config).await?;
            for update in store.list_updates(&subscription_id).await? {
                let mut value = serde_json::to_value(&update)?;
                value["content_length"] = update.content_length().into();
                print_json(&value)?;
            }
        }
        Command::Verify => {
            let base = callback_base(&config)?;
            let probe = CallbackProbe::new(&config.hub)?;
            probe.verify(base).await?;
            print_json(&serde_json::json!({ "callback_base_url": base, "verified": true }))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subscribe_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ws-cli",
            "subscribe",
            "https://hub.example",
            "https://feed.example/a",
            "--lease-seconds",
            "600.5",
            "--callback-base-url",
            "https://sub.example/subscriptions",
        ])
        .unwrap();

        assert_eq!(cli.callback_base_url.as_deref(), Some("https://sub.example/subscriptions"));
        match cli.command {
            Command::Subscribe { hub_url, topic_url, lease_seconds } => {
                assert_eq!(hub_url, "https://hub.example");
                assert_eq!(topic_url, "https://feed.example/a");
                assert_eq!(lease_seconds, Some(600.5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_callback_base_required() {
        let config = AppConfig::default();
        assert!(callback_base(&config).is_err());
    }
}

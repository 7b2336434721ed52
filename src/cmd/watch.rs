//! Client commands — `cistatus watch` and `cistatus summary`.

use anyhow::{Context, Result};
use cistatus::client::{BackoffConfig, ReconnectingClient, StatusClient};
use cistatus::Summary;
use cistatus::config::ClientConfig;
use tokio::sync::mpsc;

use crate::{SummaryArgs, WatchArgs};

pub async fn cmd_watch(args: WatchArgs) -> Result<()> {
    let mut config = ClientConfig::new(args.host);
    config.port = args.port;
    config.tls = args.tls;
    config.backoff = BackoffConfig {
        initial_interval: args.initial_interval,
        max_interval: args.max_interval,
        max_elapsed: (!args.max_elapsed.is_zero()).then_some(args.max_elapsed),
        ..BackoffConfig::default()
    };

    let mut client = ReconnectingClient::new(&config).context("Failed to build watch client")?;
    let (tx, mut rx) = mpsc::channel::<Summary>(16);

    let printer = tokio::spawn(async move {
        while let Some(summary) = rx.recv().await {
            println!("{}", summary.color);
        }
    });

    let result = tokio::select! {
        result = client.run(tx) => result.context("Watch failed"),
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    let _ = printer.await;
    result
}

pub async fn cmd_summary(args: SummaryArgs) -> Result<()> {
    let mut config = ClientConfig::new(args.host);
    config.port = args.port;
    config.tls = args.tls;
    config.token = args.token;

    let summary = StatusClient::new(&config)
        .context("Failed to build HTTP client")?
        .summary()
        .await
        .context("Failed to fetch summary")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

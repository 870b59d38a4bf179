use anyhow::Context;
use clap::Parser;
use dhcprelya_config::Cli;
use dhcprelya_core::Relay;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let foreground = cli.foreground;
    init_tracing(foreground);

    let config = cli
        .into_relay_config()
        .context("failed to build relay configuration")?;

    if let Some(filter) = &config.bpf_filter {
        tracing::info!(
            filter = %filter,
            "user-supplied capture filter accepted; ANDed with the fixed bootps predicate \
             and evaluated in software after capture rather than compiled into a kernel BPF program"
        );
    }

    tracing::info!(
        interfaces = config.interfaces.len(),
        servers = config.servers.len(),
        plugins = config.plugins.len(),
        "starting relay"
    );

    let relay = Relay::start(&config).context("failed to start relay")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutdown signal received, stopping tasks");
    relay.shutdown().await;

    Ok(())
}

fn init_tracing(foreground: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if foreground {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).compact().init();
    }
}

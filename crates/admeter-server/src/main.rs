use admeter_server::{init_tracing, serve, ServerConfig};
use anyhow::Context;
use clap::{value_parser, Arg, Command};
use std::net::SocketAddr;
use std::path::PathBuf;

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("admeter")
        .version(admeter_server::VERSION)
        .about("Ad selection, metering and stats server")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .help("Path to a TOML configuration file"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_parser(value_parser!(SocketAddr))
                .help("Listen address, overrides the config file"),
        )
        .get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = matches.get_one::<SocketAddr>("bind") {
        config = config.with_bind(*bind);
    }

    init_tracing(config.log_json).context("installing tracing subscriber")?;
    tracing::info!(bind = %config.bind, "starting admeter");

    serve(config, shutdown_signal()).await?;
    Ok(())
}

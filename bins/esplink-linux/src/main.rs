mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use esplink_core::{EspLink, LinkConfig, LinkState, Transport};
use esplink_runtime::{SerialTransport, TcpTransport, Ticker};

use crate::cli::{Cli, Command, NetworkArgs, RequestArgs};

type Link = EspLink<Box<dyn Transport>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,esplink_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Command::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let link = Arc::new(EspLink::with_config(open_transport(&cli)?, config));
    tracing::info!(version = link.version(), "esplink starting");

    match cli.command {
        Command::Info => {
            blocking(&link, |link| link.begin()).await??;
            println!("version: {}", link.version());
            match link.address() {
                Some(address) => println!("address: {}", address),
                None => println!("address: unknown"),
            }
        }
        Command::Status(args) => {
            let ticker = join(&link, &args).await?;
            println!("connected: {}", link.is_connected());
            ticker.stop().await;
        }
        Command::Request(args) => run_request(&link, &args).await?,
        Command::Raw {
            command,
            timeout_ms,
        } => {
            let out = blocking(&link, move |link| link.send_command(&command, timeout_ms)).await??;
            print!("{}", out);
        }
        Command::Restore => {
            blocking(&link, |link| link.restore()).await??;
            println!("restored");
        }
        Command::Config => {}
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<LinkConfig> {
    let mut config = match &cli.config {
        Some(path) => LinkConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => LinkConfig::default(),
    };
    if cli.echo {
        config.echo = true;
    }
    config.validate()?;
    Ok(config)
}

fn open_transport(cli: &Cli) -> anyhow::Result<Box<dyn Transport>> {
    match (&cli.device, &cli.bridge) {
        (Some(device), _) => Ok(Box::new(SerialTransport::open(device, cli.baud)?)),
        (None, Some(bridge)) => Ok(Box::new(TcpTransport::connect(bridge.as_str())?)),
        (None, None) => bail!("one of --device or --bridge is required"),
    }
}

/// Run a blocking setup helper off the async workers.
async fn blocking<R, F>(link: &Arc<Link>, f: F) -> anyhow::Result<R>
where
    F: FnOnce(&Link) -> R + Send + 'static,
    R: Send + 'static,
{
    let link = Arc::clone(link);
    tokio::task::spawn_blocking(move || f(&link))
        .await
        .context("setup task panicked")
}

/// Set up the radio and wait for the first connection check to resolve.
async fn join(link: &Arc<Link>, args: &NetworkArgs) -> anyhow::Result<Ticker> {
    if !args.skip_setup {
        blocking(link, |link| link.begin()).await??;
    }
    link.set_credentials(&args.ssid, &args.password)?;

    let period = Duration::from_millis(link.config().tick_interval_ms);
    let ticker = Ticker::spawn(Arc::clone(link), period);

    let settled = wait_for(args.wait_secs, || {
        !link.credentials_pending() && link.state() == LinkState::Idle
    })
    .await?;
    if !settled {
        bail!("connection check did not finish in {} s", args.wait_secs);
    }
    Ok(ticker)
}

async fn run_request(link: &Arc<Link>, args: &RequestArgs) -> anyhow::Result<()> {
    let ticker = join(link, &args.network).await?;
    if !link.is_connected() && !args.retry {
        bail!("not connected to {}", args.network.ssid);
    }

    let request = args.to_request();
    tracing::info!(method = %request.method, host = %request.host, "Submitting request");
    link.submit(request)?;

    let finished = wait_for(args.network.wait_secs, || !link.is_busy()).await?;
    let sent = link.transmit_count();
    let received = link.receive_count();
    ticker.stop().await;

    if !finished {
        link.cancel();
        bail!("no response within {} s", args.network.wait_secs);
    }
    match link.fetch_response() {
        Some(response) => {
            tracing::debug!(sent, received, "Exchange finished");
            println!("{}", response.into_string());
            Ok(())
        }
        None => bail!("request failed"),
    }
}

/// Poll `done` every tick until it holds, the deadline passes or Ctrl+C.
async fn wait_for(secs: u64, mut done: impl FnMut() -> bool) -> anyhow::Result<bool> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    let mut poll = tokio::time::interval(Duration::from_millis(20));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => bail!("interrupted"),
            _ = poll.tick() => {
                if done() {
                    return Ok(true);
                }
                if tokio::time::Instant::now() >= deadline {
                    return Ok(false);
                }
            }
        }
    }
}

//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use esplink_core::{HttpMethod, Request};

#[derive(Debug, Parser)]
#[command(name = "esplink", version, about = "Talk to an AT-command radio")]
pub struct Cli {
    /// Serial device the radio is attached to.
    #[arg(long, conflicts_with = "bridge")]
    pub device: Option<String>,

    /// Baud rate for `--device`.
    #[arg(long, default_value_t = esplink_runtime::serial::DEFAULT_BAUD)]
    pub baud: u32,

    /// Serial-over-TCP bridge to reach the radio through, as host:port.
    #[arg(long)]
    pub bridge: Option<String>,

    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log raw radio traffic.
    #[arg(long)]
    pub echo: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe and reset the radio, then print its hardware address.
    Info,
    /// Join the network and report whether the radio holds an address.
    Status(NetworkArgs),
    /// Join the network, run one HTTP request and print the response.
    Request(RequestArgs),
    /// Send a raw command line and print what the radio answers.
    Raw {
        command: String,
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
    /// Factory restore the radio.
    Restore,
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[arg(long, env = "ESPLINK_SSID")]
    pub ssid: String,

    #[arg(long, env = "ESPLINK_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Skip probing and resetting the radio first.
    #[arg(long)]
    pub skip_setup: bool,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 60)]
    pub wait_secs: u64,
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    #[arg(long, default_value = "GET")]
    pub method: HttpMethod,

    #[arg(long)]
    pub host: String,

    #[arg(long, default_value_t = 80)]
    pub port: u16,

    #[arg(long, default_value = "/")]
    pub path: String,

    /// Query string for GET, form body for POST.
    #[arg(long, default_value = "")]
    pub body: String,

    /// Keep retrying after failed exchanges.
    #[arg(long)]
    pub retry: bool,
}

impl RequestArgs {
    pub fn to_request(&self) -> Request {
        Request {
            method: self.method,
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            body: self.body.clone(),
            retry: self.retry,
        }
    }
}

//! Command line client for gNMI network targets
//!
//! Talks to a single gNMI target: capability discovery, snapshot reads,
//! configuration writes and streaming subscriptions.

mod config;
mod render;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use gnmi_client::gnmi::subscribe_response::Response;
use gnmi_client::gnmi::{Encoding, SubscriptionMode};
use gnmi_client::{GnmiClient, SubscribeOptions, SubscriptionEvent};

use crate::config::{CliConfig, LoggingConfig};

/// Command line client for gNMI network targets
#[derive(Parser, Debug)]
#[command(name = "gnmi-cli")]
#[command(about = "Interact with gNMI-enabled network devices")]
#[command(version)]
struct Args {
    /// Target address as host:port (overrides the config file)
    #[arg(short, long)]
    target: Option<String>,

    /// Username sent with every request
    #[arg(short, long)]
    username: Option<String>,

    /// Password sent with every request
    #[arg(short, long)]
    password: Option<String>,

    /// Path to configuration file (JSON5 format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the target's models, encodings and gNMI version
    Capabilities,

    /// Read the data tree at a path
    Get {
        /// Path to read, e.g. /system/state/hostname
        path: String,
    },

    /// Write a string value at a path
    Set {
        /// Path to update
        path: String,

        /// Value to write
        value: String,
    },

    /// Stream updates for one or more paths until interrupted
    Subscribe {
        /// Paths to subscribe to
        #[arg(required = true)]
        paths: Vec<String>,

        /// Subscription mode (defaults to the target's choice)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Sample interval in milliseconds (SAMPLE mode)
        #[arg(long)]
        sample_interval_ms: Option<u64>,

        /// Withhold unchanged values between samples (SAMPLE mode)
        #[arg(long)]
        suppress_redundant: bool,

        /// Longest silence the target may keep while withholding values,
        /// in milliseconds
        #[arg(long)]
        heartbeat_interval_ms: Option<u64>,

        /// Value encoding requested from the target
        #[arg(long, value_enum)]
        encoding: Option<EncodingArg>,

        /// Stop after this many update notifications
        #[arg(long)]
        count: Option<u64>,
    },
}

/// Subscription mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Target determines update timing per path
    TargetDefined,

    /// Update on value change
    OnChange,

    /// Sample at fixed intervals
    Sample,
}

impl ModeArg {
    fn to_proto(self) -> SubscriptionMode {
        match self {
            ModeArg::TargetDefined => SubscriptionMode::TargetDefined,
            ModeArg::OnChange => SubscriptionMode::OnChange,
            ModeArg::Sample => SubscriptionMode::Sample,
        }
    }
}

/// Value encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EncodingArg {
    Json,
    Bytes,
    Proto,
    Ascii,
    JsonIetf,
}

impl EncodingArg {
    fn to_proto(self) -> Encoding {
        match self {
            EncodingArg::Json => Encoding::Json,
            EncodingArg::Bytes => Encoding::Bytes,
            EncodingArg::Proto => Encoding::Proto,
            EncodingArg::Ascii => Encoding::Ascii,
            EncodingArg::JsonIetf => Encoding::JsonIetf,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Some(
            CliConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
        ),
        None => None,
    };

    // Initialize logging
    let mut logging: LoggingConfig = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }
    config::init_tracing(&logging)?;

    let mut client = build_client(&args, config.as_ref())?;

    match args.command {
        Command::Capabilities => {
            let response = client.capabilities().await?;
            render::print_capabilities(&response);
        }
        Command::Get { path } => {
            let response = client.get(&path).await?;
            if response.notification.is_empty() {
                info!("Target returned no data for {}", path);
            }
            for notification in &response.notification {
                render::print_notification(notification);
            }
        }
        Command::Set { path, value } => {
            let response = client.set(&path, &value).await?;
            render::print_set_response(&response);
        }
        Command::Subscribe {
            paths,
            mode,
            sample_interval_ms,
            suppress_redundant,
            heartbeat_interval_ms,
            encoding,
            count,
        } => {
            let tuned = mode.is_some()
                || sample_interval_ms.is_some()
                || suppress_redundant
                || heartbeat_interval_ms.is_some()
                || encoding.is_some();
            let options = (paths.len() > 1 || tuned).then(|| SubscribeOptions {
                mode: mode.unwrap_or(ModeArg::TargetDefined).to_proto(),
                sample_interval: sample_interval_ms.map(Duration::from_millis),
                suppress_redundant,
                heartbeat_interval: heartbeat_interval_ms.map(Duration::from_millis),
                encoding: encoding.map_or(Encoding::Json, EncodingArg::to_proto),
                ..Default::default()
            });
            run_subscribe(&client, paths, options, count).await?;
        }
    }

    Ok(())
}

/// Builds the client from flags and the optional config file. Flags win.
fn build_client(args: &Args, config: Option<&CliConfig>) -> Result<GnmiClient> {
    let target_config = config.and_then(|c| c.target.as_ref());

    let address = args
        .target
        .clone()
        .or_else(|| target_config.map(|t| t.address.clone()))
        .context("No target address given, pass --target or set one in the config file")?;

    let credentials = target_config.and_then(|t| t.credentials.as_ref());
    let username = args
        .username
        .clone()
        .or_else(|| credentials.map(|c| c.username.clone()))
        .unwrap_or_default();
    let password = args
        .password
        .clone()
        .or_else(|| credentials.map(|c| c.password.clone()))
        .unwrap_or_default();

    info!("Using target {}", address);

    let mut builder = GnmiClient::builder(&address).credentials(&username, &password);
    if let Some(tls) = target_config.and_then(|t| t.tls.to_options()) {
        builder = builder.tls(tls);
    }

    Ok(builder.build()?)
}

async fn run_subscribe(
    client: &GnmiClient,
    paths: Vec<String>,
    options: Option<SubscribeOptions>,
    count: Option<u64>,
) -> Result<()> {
    // The bare single-path form keeps bracketed segments opaque; tuned or
    // multi-path subscriptions go through the key-parsing form.
    let mut stream = match &options {
        None => client.subscribe(&paths[0]),
        Some(options) => {
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            client.subscribe_with(&refs, options)
        }
    };

    info!("Subscribed to {} path(s)", paths.len());

    let mut seen = 0u64;

    loop {
        tokio::select! {
            event = stream.next_event() => {
                match event {
                    Some(SubscriptionEvent::Update(response)) => match response.response {
                        Some(Response::Update(notification)) => {
                            render::print_notification(&notification);
                            seen += 1;
                            if count.is_some_and(|limit| seen >= limit) {
                                stream.cancel();
                                break;
                            }
                        }
                        Some(Response::SyncResponse(_)) => {
                            info!("Initial sync complete");
                        }
                        Some(Response::Error(err)) => {
                            warn!("Target reported error {}: {}", err.code, err.message);
                        }
                        None => {}
                    },
                    Some(SubscriptionEvent::Ended) => {
                        info!("Subscription closed by target");
                        break;
                    }
                    Some(SubscriptionEvent::Errored(status)) => {
                        bail!("Subscription failed: {}", status);
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                stream.cancel();
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_subscribe_command() {
        let args = Args::parse_from([
            "gnmi-cli",
            "--target",
            "router01:9339",
            "--username",
            "admin",
            "--password",
            "admin",
            "subscribe",
            "/interfaces/interface/state/counters",
            "/system/memory/state",
            "--mode",
            "sample",
            "--sample-interval-ms",
            "5000",
            "--suppress-redundant",
            "--heartbeat-interval-ms",
            "30000",
            "--encoding",
            "json-ietf",
        ]);

        assert_eq!(args.target.as_deref(), Some("router01:9339"));
        match args.command {
            Command::Subscribe {
                paths,
                mode,
                sample_interval_ms,
                suppress_redundant,
                heartbeat_interval_ms,
                encoding,
                count,
            } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(mode, Some(ModeArg::Sample));
                assert_eq!(sample_interval_ms, Some(5000));
                assert!(suppress_redundant);
                assert_eq!(heartbeat_interval_ms, Some(30000));
                assert_eq!(encoding, Some(EncodingArg::JsonIetf));
                assert_eq!(count, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_set_command() {
        let args = Args::parse_from([
            "gnmi-cli",
            "-t",
            "router01:9339",
            "set",
            "/system/config/hostname",
            "edge-01",
        ]);

        match args.command {
            Command::Set { path, value } => {
                assert_eq!(path, "/system/config/hostname");
                assert_eq!(value, "edge-01");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}

//! Command-line interface for devsync.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use devsync_core::{AccessoryConfig, Direction, PropertyValue};
use devsync_devices::{ChannelPublisher, HttpAccessory, NoopPublisher};
use tracing::{debug, info};

/// devsync - Read, write and watch HTTP devices described by a config file.
#[derive(Parser, Debug)]
#[command(name = "devsync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Accessory configuration file (JSON, or TOML by extension).
    #[arg(short, long, global = true, default_value = "accessory.json")]
    config: PathBuf,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and list configured properties.
    Check,
    /// Read properties once and print them.
    Read {
        /// Property names, e.g. Power or "Rotation Speed".
        #[arg(required = true)]
        properties: Vec<String>,
    },
    /// Write a property.
    Write {
        /// Property name.
        property: String,
        /// Value; true/false, integers and decimals are typed, anything else is a string.
        value: String,
    },
    /// Poll properties and print every change until Ctrl-C.
    Watch {
        /// Property names; all properties with a get action when omitted.
        properties: Vec<String>,
        /// Poll interval in seconds, overrides forceRefreshDelay.
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AccessoryConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    init_logging(args.verbose || config.debug);
    debug!("Loaded accessory '{}' from {}", config.name, args.config.display());

    match args.command {
        Command::Check => run_check(config),
        Command::Read { properties } => run_read(config, properties).await,
        Command::Write { property, value } => run_write(config, property, value).await,
        Command::Watch {
            properties,
            interval,
        } => run_watch(config, properties, interval).await,
    }
}

fn init_logging(verbose: bool) {
    // Check if JSON logging is requested (for scripted environments)
    let json_logging = std::env::var("DEVSYNC_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "devsync=debug" } else { "devsync=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_check(config: AccessoryConfig) -> Result<()> {
    let accessory = HttpAccessory::connect(config, Arc::new(NoopPublisher))
        .context("Invalid accessory configuration")?;
    let registry = accessory.registry();

    println!("{}", accessory.name());
    let properties = accessory.configured_properties();
    if properties.is_empty() {
        println!("  (no properties configured)");
    }
    for property in properties {
        let get = registry.resolve(&property, Direction::Get);
        let set = registry.resolve(&property, Direction::Set);
        let fallbacks = get.as_ref().map_or(0, |action| action.chain_len() - 1);
        println!(
            "  {:<20} get: {:<3} set: {:<3} fallbacks: {}",
            property,
            if get.is_some() { "yes" } else { "no" },
            if set.is_some() { "yes" } else { "no" },
            fallbacks
        );
    }

    let config = accessory.config();
    if config.force_refresh_delay > 0 {
        println!("  polling every {}s", config.force_refresh_delay);
    }
    if config.setter_delay > 0 {
        println!("  writes debounced by {}ms", config.setter_delay);
    }
    Ok(())
}

async fn run_read(mut config: AccessoryConfig, properties: Vec<String>) -> Result<()> {
    // A one-shot read must hit the device, not an empty cache
    config.force_refresh_delay = 0;
    let accessory = HttpAccessory::connect(config, Arc::new(NoopPublisher))?;

    let mut failed = 0;
    for (property, result) in accessory.read_many(&properties).await {
        match result {
            Ok(Some(value)) => println!("{} = {}", property, value),
            Ok(None) => println!("{} = (unknown)", property),
            Err(e) => {
                eprintln!("{}: {}", property, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} reads failed", failed, properties.len());
    }
    Ok(())
}

async fn run_write(config: AccessoryConfig, property: String, raw: String) -> Result<()> {
    let accessory = HttpAccessory::connect(config, Arc::new(NoopPublisher))?;

    if accessory.registry().resolve(&property, Direction::Set).is_none() {
        bail!("No set action configured for '{}'", property);
    }

    let value = PropertyValue::parse_literal(&raw);
    accessory
        .write(&property, value.clone())
        .await
        .with_context(|| format!("Failed to write {} = {}", property, value))?;
    // With a setter delay the write was only scheduled
    accessory
        .flush()
        .await
        .with_context(|| format!("Failed to write {} = {}", property, value))?;

    println!("{} <- {}", property, value);
    Ok(())
}

async fn run_watch(
    mut config: AccessoryConfig,
    properties: Vec<String>,
    interval: Option<u64>,
) -> Result<()> {
    if let Some(interval) = interval {
        config.force_refresh_delay = interval;
    }
    if config.force_refresh_delay == 0 {
        bail!("Watching needs a poll interval: set forceRefreshDelay or pass --interval");
    }

    let (publisher, mut updates) = ChannelPublisher::new();
    let accessory = HttpAccessory::connect(config, Arc::new(publisher))?;

    if properties.is_empty() {
        accessory.start_polling();
    } else {
        for property in &properties {
            accessory.synchronizer(property).ensure_polling();
        }
    }
    info!("Watching '{}', press Ctrl-C to stop", accessory.name());

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => println!("{} = {}", update.property, update.value),
                None => break,
            },
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    accessory.shutdown();
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! mqtt2influx CLI
//!
//! Bridges MQTT topics into InfluxDB.
//!
//! # Usage
//!
//! ```bash
//! # Run with config.toml from the current directory
//! mqtt2influx
//!
//! # Override broker connection settings
//! mqtt2influx -f bridge.toml --mh tcp://10.0.0.5:1883 --mu bridge --mp secret -t '/home/#'
//!
//! # Print points instead of writing them
//! mqtt2influx --dry-run
//!
//! # Check how a message would be mapped
//! mqtt2influx map /home/kitchen/temperature 21.5
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mqtt2influx::{
    Bridge, BridgeConfig, BridgeStatsSnapshot, InfluxSink, LineProtocolWriter, MqttOverrides,
    MqttSource, RecordSink, RuleSet, StdoutSink,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// MQTT to InfluxDB bridge
#[derive(Parser, Debug)]
#[command(name = "mqtt2influx")]
#[command(about = "Bridge MQTT topics into InfluxDB time-series points")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    file: PathBuf,

    /// MQTT broker address (overrides mqtt.host)
    #[arg(long = "mqtt-host", visible_alias = "mh")]
    mqtt_host: Option<String>,

    /// MQTT username (overrides mqtt.user)
    #[arg(long = "mqtt-user", visible_alias = "mu")]
    mqtt_user: Option<String>,

    /// MQTT password (overrides mqtt.password)
    #[arg(long = "mqtt-password", visible_alias = "mp")]
    mqtt_password: Option<String>,

    /// Subscription topic filter (overrides mqtt.topic)
    #[arg(short, long)]
    topic: Option<String>,

    /// Print Line Protocol to stdout instead of writing to InfluxDB
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate,

    /// Map one message with the configured rules and print the result
    Map {
        /// Message topic
        topic: String,

        /// Message payload
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(&output),
            Commands::Validate => cmd_validate(&args.file),
            Commands::Map { topic, payload } => cmd_map(&args.file, &topic, &payload),
        };
    }

    let mut config = BridgeConfig::from_file(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    config.apply_overrides(MqttOverrides {
        host: args.mqtt_host,
        user: args.mqtt_user,
        password: args.mqtt_password,
        topic: args.topic,
    })?;

    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));

    if args.dry_run {
        let sink = StdoutSink::new(config.influx.precision);
        run_bridge(config, sink).await
    } else {
        let sink = InfluxSink::from_config(&config.influx)?;
        tracing::info!("Writing to {}", sink.write_url());
        run_bridge(config, sink).await
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_bridge<S: RecordSink + 'static>(config: BridgeConfig, sink: S) -> Result<()> {
    let bridge = Bridge::from_config(&config, sink)?;
    let source = MqttSource::from_config(&config.mqtt)?;

    tracing::info!(
        "mqtt2influx v{} connecting to {} (topic '{}')",
        env!("CARGO_PKG_VERSION"),
        config.mqtt.host,
        config.mqtt.topic
    );

    // Stats reporting task
    let stats = bridge.stats();
    let stats_task = (config.stats_interval > 0).then(|| {
        let stats = bridge.stats();
        let period = Duration::from_secs(config.stats_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                log_stats(&stats.snapshot());
            }
        })
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let result = bridge.run(source, shutdown).await;

    if let Some(task) = stats_task {
        task.abort();
    }
    log_stats(&stats.snapshot());

    result.map_err(Into::into)
}

fn log_stats(snap: &BridgeStatsSnapshot) {
    tracing::info!(
        "Stats: {} received ({:.1}/s), {} mapped, {} unmatched, \
         {} written in {} batches, {} pending, {} failed flushes, {} dropped",
        snap.messages_received,
        snap.messages_per_second(),
        snap.records_mapped,
        snap.messages_unmatched,
        snap.records_written,
        snap.batches_written,
        snap.records_pending(),
        snap.flush_failures,
        snap.records_dropped
    );
}

fn cmd_gen_config(output: &Path) -> Result<()> {
    let toml_str = toml::to_string_pretty(&BridgeConfig::example())?;

    let content = format!(
        r#"# mqtt2influx configuration
# Generated by mqtt2influx gen-config
#
# Rules are tried in order; the first pattern found in the topic wins.
# Named groups (?P<name>...) become tags, unnamed groups form the field name.

{}
"#,
        toml_str
    );

    std::fs::write(output, content)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let loaded = BridgeConfig::from_file(path)
        .map_err(anyhow::Error::from)
        .and_then(|config| {
            let rules = RuleSet::from_config(&config.sync)?;
            Ok((config, rules))
        });

    match loaded {
        Ok((config, rules)) => {
            println!("Configuration valid!");
            println!();
            println!("MQTT:   {} (topic '{}')", config.mqtt.host, config.mqtt.topic);
            println!(
                "Influx: {} database '{}', every {}s",
                config.influx.host, config.influx.database, config.influx.interval
            );
            println!("Rules:  {}", rules.len());
            for (i, rule) in rules.rules().iter().enumerate() {
                println!("  [{}] {} -> {}", i, rule.pattern(), rule.measurement());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_map(path: &Path, topic: &str, payload: &str) -> Result<()> {
    let config = BridgeConfig::from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let rules = RuleSet::from_config(&config.sync)?;

    let Some(record) = rules.map_now(topic, payload.as_bytes()) else {
        println!("no rule matched");
        return Ok(());
    };

    let mut writer = LineProtocolWriter::new(config.influx.precision);
    writer.write_record(&record)?;
    for line in writer.flush() {
        println!("{}", line);
    }
    Ok(())
}

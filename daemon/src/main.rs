//! Selection daemon: entry point for running the vote engine.

use anyhow::Context;
use clap::Parser;
use selection_node::{init_logging, DispatchMode, NodeConfig, SelectionNode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "selection-daemon", about = "Live audience vote engine")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, global = true, env = "SELECTION_CONFIG")]
    config: Option<PathBuf>,

    /// Address the WebSocket server binds to.
    #[arg(long, global = true, env = "SELECTION_BIND")]
    bind: Option<String>,

    /// WebSocket port.
    #[arg(long, global = true, env = "SELECTION_PORT")]
    port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "SELECTION_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, global = true, env = "SELECTION_LOG_FORMAT")]
    log_format: Option<String>,

    /// Shortest round duration in seconds.
    #[arg(long, global = true, env = "SELECTION_BASE_DURATION")]
    base_duration: Option<u32>,

    /// Longest round duration in seconds.
    #[arg(long, global = true, env = "SELECTION_MAX_DURATION")]
    max_duration: Option<u32>,

    /// How winning actions are executed: "log" or "command".
    #[arg(long, global = true, env = "SELECTION_DISPATCH_MODE")]
    dispatch_mode: Option<String>,

    /// Codes to disable (comma-separated: "x,l").
    #[arg(long, global = true, env = "SELECTION_DISABLE", value_delimiter = ',')]
    disable: Vec<String>,

    /// Enable Prometheus metrics endpoint.
    #[arg(long, global = true, env = "SELECTION_ENABLE_METRICS")]
    metrics: bool,

    /// Wait for an admin `start_cycle` instead of opening voting at boot.
    #[arg(long, global = true, env = "SELECTION_NO_AUTOSTART")]
    no_autostart: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the vote engine until SIGINT/SIGTERM.
    Run,
    /// Print the action catalog with the effective enable flags.
    Actions,
    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    /// File settings (or defaults) overridden by flags and env vars.
    fn resolve_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(&path.to_string_lossy())
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        if let Some(base) = self.base_duration {
            config.timer.base_secs = base;
        }
        if let Some(max) = self.max_duration {
            config.timer.max_secs = max;
        }
        if let Some(mode) = &self.dispatch_mode {
            config.dispatch.mode = mode.parse::<DispatchMode>()?;
        }
        if !self.disable.is_empty() {
            config.disabled_actions = self.disable.clone();
        }
        config.enable_metrics |= self.metrics;
        if self.no_autostart {
            config.start_cycle_on_boot = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command {
        Command::Run => {
            init_logging(config.parsed_log_format()?, &config.log_level)?;
            if let Some(path) = &cli.config {
                tracing::info!("Loaded config from {}", path.display());
            }
            tracing::info!(
                "Starting selection daemon on {}:{} (base {}s, max {}s, dispatch: {}, metrics: {})",
                config.bind_address,
                config.port,
                config.timer.base_secs,
                config.timer.max_secs,
                config.dispatch.mode.as_str(),
                if config.enable_metrics { "on" } else { "off" },
            );

            let mut node = SelectionNode::new(config)?;
            node.run().await?;

            tracing::info!("selection daemon exited cleanly");
        }
        Command::Actions => {
            let registry = config.build_registry()?;
            for action in registry.all() {
                println!(
                    "{}  {:<8} {:<10} {:<9} {}",
                    action.code,
                    action.name,
                    action.keypress.as_deref().unwrap_or("-"),
                    if action.enabled { "enabled" } else { "disabled" },
                    action.description,
                );
            }
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use selection_actions::{ActionDispatcher, ActionRegistry, CommandDispatcher, LogDispatcher};
use selection_types::VoteCode;
use selection_voting::TimerPolicy;

use crate::logging::LogFormat;
use crate::NodeError;

/// How resolved actions leave the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Dry run: log the action and report success.
    #[default]
    Log,
    /// Run an external program per action.
    Command,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Log => "log",
            DispatchMode::Command => "command",
        }
    }
}

impl std::str::FromStr for DispatchMode {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(DispatchMode::Log),
            "command" => Ok(DispatchMode::Command),
            other => Err(NodeError::Config(format!(
                "unknown dispatch mode '{other}' (expected 'log' or 'command')"
            ))),
        }
    }
}

/// Action dispatch settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: DispatchMode,

    /// Program run in `command` mode.
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments; `{key}` and `{code}` are substituted per action.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

/// Configuration for a selection node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the WebSocket server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// WebSocket port. 0 picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Countdown tick period in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Codes to load disabled, e.g. `["x"]`.
    #[serde(default)]
    pub disabled_actions: Vec<String>,

    /// Whether to serve Prometheus metrics on `/metrics`.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Capacity of each WebSocket topic channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Capacity of the inbound vote/command queue.
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,

    /// Open a voting cycle as soon as the node starts.
    #[serde(default = "default_true")]
    pub start_cycle_on_boot: bool,

    /// Round duration formula.
    #[serde(default)]
    pub timer: TimerPolicy,

    #[serde(default = "default_dispatch")]
    pub dispatch: DispatchConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_program() -> String {
    "xdotool".to_string()
}

fn default_args() -> Vec<String> {
    vec!["key".to_string(), "{key}".to_string()]
}

fn default_dispatch() -> DispatchConfig {
    DispatchConfig {
        mode: DispatchMode::default(),
        program: default_program(),
        args: default_args(),
    }
}

fn default_channel_capacity() -> usize {
    256
}

fn default_command_queue() -> usize {
    1024
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        self.timer.validate()?;
        if self.tick_interval_ms == 0 {
            return Err(NodeError::Config("tick_interval_ms must be positive".into()));
        }
        if self.channel_capacity == 0 || self.command_queue == 0 {
            return Err(NodeError::Config(
                "channel_capacity and command_queue must be positive".into(),
            ));
        }
        self.parsed_log_format()?;
        Ok(())
    }

    pub fn parsed_log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    /// The default catalog with `disabled_actions` switched off.
    pub fn build_registry(&self) -> Result<ActionRegistry, NodeError> {
        let mut registry = ActionRegistry::with_defaults();
        for raw in &self.disabled_actions {
            let code = VoteCode::parse(raw)?;
            registry.set_enabled(code, false)?;
        }
        Ok(registry)
    }

    pub fn build_dispatcher(&self) -> Arc<dyn ActionDispatcher> {
        match self.dispatch.mode {
            DispatchMode::Log => Arc::new(LogDispatcher),
            DispatchMode::Command => Arc::new(CommandDispatcher::new(
                self.dispatch.program.clone(),
                self.dispatch.args.clone(),
            )),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            timer: TimerPolicy::default(),
            tick_interval_ms: default_tick_interval_ms(),
            disabled_actions: Vec::new(),
            dispatch: default_dispatch(),
            enable_metrics: false,
            channel_capacity: default_channel_capacity(),
            command_queue: default_command_queue(),
            start_cycle_on_boot: default_true(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.port, 5000);
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.timer.base_secs, 60);
        assert_eq!(config.timer.max_secs, 120);
        assert_eq!(config.dispatch.mode, DispatchMode::Log);
        assert_eq!(config.log_format, "human");
        assert!(config.start_cycle_on_boot);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            port = 9999
            disabled_actions = ["x"]

            [timer]
            base_secs = 30

            [dispatch]
            mode = "command"
            program = "echo"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.port, 9999);
        assert_eq!(config.timer.base_secs, 30);
        assert_eq!(config.timer.max_secs, 120); // default
        assert_eq!(config.dispatch.mode, DispatchMode::Command);
        assert_eq!(config.dispatch.args, vec!["key", "{key}"]);

        let registry = config.build_registry().unwrap();
        assert!(!registry.is_valid(VoteCode::new('x')));
        assert!(registry.is_valid(VoteCode::new('k')));
        assert_eq!(config.build_dispatcher().name(), "command");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(NodeConfig::from_toml_str("tick_interval_ms = 0").is_err());
        assert!(NodeConfig::from_toml_str("log_format = \"xml\"").is_err());
        assert!(NodeConfig::from_toml_str("[timer]\nbase_secs = 500").is_err());
        assert!(NodeConfig::from_toml_str("port = \"abc\"").is_err());
    }

    #[test]
    fn unknown_disabled_action_fails_registry() {
        let config = NodeConfig {
            disabled_actions: vec!["q".into()],
            ..NodeConfig::default()
        };
        assert!(matches!(config.build_registry(), Err(NodeError::Action(_))));

        let config = NodeConfig {
            disabled_actions: vec!["kill".into()],
            ..NodeConfig::default()
        };
        assert!(matches!(config.build_registry(), Err(NodeError::InvalidInput(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 6001\nenable_metrics = true").unwrap();

        let config = NodeConfig::from_toml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port, 6001);
        assert!(config.enable_metrics);

        assert!(NodeConfig::from_toml_file("/nonexistent/selection.toml").is_err());
    }

    #[test]
    fn dispatch_mode_parses() {
        assert_eq!("Command".parse::<DispatchMode>().unwrap(), DispatchMode::Command);
        assert!("keyboard".parse::<DispatchMode>().is_err());
    }
}

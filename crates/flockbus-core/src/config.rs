//! Runtime configuration for both halves of the bus.
//!
//! [`BusConfig`] and [`PipelineConfig`] are plain `const`-constructible
//! structs with builder methods, so a process can declare its configuration
//! as a static:
//!
//! ```ignore
//! use std::time::Duration;
//! use flockbus_core::BusConfig;
//!
//! pub static BUS: BusConfig = BusConfig::new().with_apply_interval(Duration::from_millis(20));
//! ```
//!
//! [`ConfigFile`] is the on-disk (TOML) form of the same settings.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default receiver tick period.
pub const DEFAULT_APPLY_INTERVAL: Duration = Duration::from_millis(30);

/// Default controller tick period (40 Hz).
pub const DEFAULT_CONTROLLER_INTERVAL: Duration = Duration::from_millis(25);

/// Default time a failed link waits before reporting itself connected again.
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// Default UDP port of the offsets channel.
pub const DEFAULT_PORT: u16 = 57300;

/// Default number of agents in the reference flock.
pub const DEFAULT_AGENTS: usize = 24;

/// Longest accepted tick period.
const MAX_INTERVAL_MS: u64 = 1_000;

const LOCALHOST: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT));

// =========================================================================
// BusConfig
// =========================================================================

/// Receiver-side configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Period of the apply tick.
    pub apply_interval: Duration,

    /// Whether modulation offsets are enabled after `initialize`.
    pub enabled_at_start: bool,

    /// UDP address the offsets receiver binds to.
    pub listen_addr: SocketAddr,
}

impl BusConfig {
    /// Configuration with all defaults.
    pub const fn new() -> Self {
        Self {
            apply_interval: DEFAULT_APPLY_INTERVAL,
            enabled_at_start: true,
            listen_addr: LOCALHOST,
        }
    }

    /// Set the apply tick period.
    pub const fn with_apply_interval(mut self, interval: Duration) -> Self {
        self.apply_interval = interval;
        self
    }

    /// Set whether offsets start enabled.
    pub const fn with_enabled_at_start(mut self, enabled: bool) -> Self {
        self.enabled_at_start = enabled;
        self
    }

    /// Set the receiver bind address.
    pub const fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// PipelineConfig
// =========================================================================

/// Sender-side configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Period of the controller tick.
    pub controller_interval: Duration,

    /// How long a link stays "disconnected" after a failed transmission.
    pub reconnect_backoff: Duration,

    /// Whether the pipeline runs after construction.
    pub enabled_at_start: bool,

    /// UDP address of the receiver.
    pub target_addr: SocketAddr,

    /// Seed for the reference flock.
    pub seed: u64,

    /// Number of agents in the reference flock.
    pub agents: usize,
}

impl PipelineConfig {
    /// Configuration with all defaults.
    pub const fn new() -> Self {
        Self {
            controller_interval: DEFAULT_CONTROLLER_INTERVAL,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            enabled_at_start: true,
            target_addr: LOCALHOST,
            seed: 0,
            agents: DEFAULT_AGENTS,
        }
    }

    /// Set the controller tick period.
    pub const fn with_controller_interval(mut self, interval: Duration) -> Self {
        self.controller_interval = interval;
        self
    }

    /// Set the reconnect back-off.
    pub const fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Set whether the pipeline starts enabled.
    pub const fn with_enabled_at_start(mut self, enabled: bool) -> Self {
        self.enabled_at_start = enabled;
        self
    }

    /// Set the receiver address.
    pub const fn with_target_addr(mut self, addr: SocketAddr) -> Self {
        self.target_addr = addr;
        self
    }

    /// Set the flock seed.
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the flock size.
    pub const fn with_agents(mut self, agents: usize) -> Self {
        self.agents = agents;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// ConfigFile
// =========================================================================

/// Configuration file contents (`flockbus.toml`).
///
/// ```toml
/// [receiver]
/// listen = "127.0.0.1:57300"
/// apply_interval_ms = 30
///
/// [sender]
/// target = "127.0.0.1:57300"
/// tick_interval_ms = 25
/// seed = 7
/// ```
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Receiver section.
    pub receiver: ReceiverSection,
    /// Sender section.
    pub sender: SenderSection,
}

/// `[receiver]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiverSection {
    /// Bind address for the offsets channel.
    pub listen: String,
    /// Apply tick period in milliseconds.
    pub apply_interval_ms: u64,
    /// Whether offsets start enabled.
    pub enabled: bool,
}

impl Default for ReceiverSection {
    fn default() -> Self {
        let defaults = BusConfig::new();
        Self {
            listen: defaults.listen_addr.to_string(),
            apply_interval_ms: defaults.apply_interval.as_millis() as u64,
            enabled: defaults.enabled_at_start,
        }
    }
}

/// `[sender]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SenderSection {
    /// Receiver address.
    pub target: String,
    /// Controller tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Reconnect back-off in milliseconds.
    pub reconnect_ms: u64,
    /// Whether the pipeline starts enabled.
    pub enabled: bool,
    /// Flock seed.
    pub seed: u64,
    /// Flock size.
    pub agents: usize,
}

impl Default for SenderSection {
    fn default() -> Self {
        let defaults = PipelineConfig::new();
        Self {
            target: defaults.target_addr.to_string(),
            tick_interval_ms: defaults.controller_interval.as_millis() as u64,
            reconnect_ms: defaults.reconnect_backoff.as_millis() as u64,
            enabled: defaults.enabled_at_start,
            seed: defaults.seed,
            agents: defaults.agents,
        }
    }
}

impl ConfigFile {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let file = Self::from_toml_str(&text)?;
        log::debug!("loaded config from {}", path.display());
        Ok(file)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    /// Validate the file contents.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_addr("receiver.listen", &self.receiver.listen)?;
        parse_addr("sender.target", &self.sender.target)?;
        check_interval("receiver.apply_interval_ms", self.receiver.apply_interval_ms)?;
        check_interval("sender.tick_interval_ms", self.sender.tick_interval_ms)?;
        if self.sender.reconnect_ms == 0 {
            return Err(ConfigError::Invalid(
                "sender.reconnect_ms must be greater than 0".to_string(),
            ));
        }
        if !(1..=1024).contains(&self.sender.agents) {
            return Err(ConfigError::Invalid(format!(
                "sender.agents must be within 1..=1024, got {}",
                self.sender.agents
            )));
        }
        Ok(())
    }

    /// Receiver-side runtime configuration.
    pub fn bus_config(&self) -> Result<BusConfig, ConfigError> {
        Ok(BusConfig::new()
            .with_listen_addr(parse_addr("receiver.listen", &self.receiver.listen)?)
            .with_apply_interval(Duration::from_millis(self.receiver.apply_interval_ms))
            .with_enabled_at_start(self.receiver.enabled))
    }

    /// Sender-side runtime configuration.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        Ok(PipelineConfig::new()
            .with_target_addr(parse_addr("sender.target", &self.sender.target)?)
            .with_controller_interval(Duration::from_millis(self.sender.tick_interval_ms))
            .with_reconnect_backoff(Duration::from_millis(self.sender.reconnect_ms))
            .with_enabled_at_start(self.sender.enabled)
            .with_seed(self.sender.seed)
            .with_agents(self.sender.agents))
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{field} must be an ip:port address, got {value:?}")))
}

fn check_interval(field: &str, millis: u64) -> Result<(), ConfigError> {
    if millis == 0 || millis > MAX_INTERVAL_MS {
        return Err(ConfigError::Invalid(format!(
            "{field} must be within 1..={MAX_INTERVAL_MS}, got {millis}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_builders() {
        const BUS: BusConfig = BusConfig::new()
            .with_apply_interval(Duration::from_millis(20))
            .with_enabled_at_start(false);
        assert_eq!(BUS.apply_interval, Duration::from_millis(20));
        assert!(!BUS.enabled_at_start);
        assert_eq!(BUS.listen_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = ConfigFile::from_toml_str("").unwrap();
        assert_eq!(file.bus_config().unwrap(), BusConfig::new());
        assert_eq!(file.pipeline_config().unwrap(), PipelineConfig::new());
    }

    #[test]
    fn test_sections_override_defaults() {
        let file = ConfigFile::from_toml_str(
            r#"
            [receiver]
            listen = "0.0.0.0:9000"
            apply_interval_ms = 10

            [sender]
            target = "10.0.0.2:9000"
            seed = 42
            agents = 8
            "#,
        )
        .unwrap();

        let bus = file.bus_config().unwrap();
        assert_eq!(bus.listen_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(bus.apply_interval, Duration::from_millis(10));

        let pipeline = file.pipeline_config().unwrap();
        assert_eq!(pipeline.seed, 42);
        assert_eq!(pipeline.agents, 8);
        assert_eq!(pipeline.controller_interval, DEFAULT_CONTROLLER_INTERVAL);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ConfigFile::from_toml_str("[sender]\nspeed = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_addr = ConfigFile::from_toml_str("[receiver]\nlisten = \"nowhere\"\n");
        assert!(matches!(bad_addr, Err(ConfigError::Invalid(_))));

        let zero_tick = ConfigFile::from_toml_str("[sender]\ntick_interval_ms = 0\n");
        assert!(matches!(zero_tick, Err(ConfigError::Invalid(_))));

        let no_agents = ConfigFile::from_toml_str("[sender]\nagents = 0\n");
        assert!(matches!(no_agents, Err(ConfigError::Invalid(_))));
    }
}

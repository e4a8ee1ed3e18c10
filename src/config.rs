//! Tunable parameters (§6) as a loadable configuration struct.
//!
//! Modeled directly on `control::config::ControlConfig::load`: read the file
//! to a `String`, parse with `toml::from_str`, wrap both failure modes with
//! `anyhow::Context`. Every field carries the default from the spec's
//! tunables table and is individually optional in the TOML via
//! `#[serde(default = "...")]`, so a partial override file only changes the
//! knobs it mentions.

use anyhow::Context;
use embassy_time::Duration;
use serde::Deserialize;
use std::path::Path;

fn default_t_min() -> u64 {
    2
}
fn default_t_max() -> u64 {
    20
}
fn default_rss_hysteresis() -> i8 {
    3
}
fn default_timeout_children() -> u64 {
    100
}
fn default_timeout_parent() -> u64 {
    100
}
fn default_max_retransmits() -> u8 {
    4
}
fn default_initial_capacity() -> usize {
    16
}
fn default_max_chain() -> usize {
    7
}
fn default_max_tracked() -> usize {
    5
}
fn default_max_samples() -> usize {
    30
}
fn default_min_samples() -> usize {
    10
}
fn default_slope_threshold() -> i32 {
    30
}
fn default_data_period() -> u64 {
    60
}
fn default_open_duration() -> u64 {
    600
}

/// Runtime-tunable parameters. Construct with [`MoteConfig::default`] and
/// optionally overlay a TOML file with [`MoteConfig::load`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MoteConfig {
    /// Trickle lower bound, seconds.
    #[serde(default = "default_t_min")]
    pub t_min_secs: u64,
    /// Trickle upper bound, seconds.
    #[serde(default = "default_t_max")]
    pub t_max_secs: u64,
    /// Parent-change RSS guard, dB.
    #[serde(default = "default_rss_hysteresis")]
    pub rss_hysteresis: i8,
    /// Routing-entry age-out window, seconds.
    #[serde(default = "default_timeout_children")]
    pub timeout_children_secs: u64,
    /// Parent liveness window, seconds.
    #[serde(default = "default_timeout_parent")]
    pub timeout_parent_secs: u64,
    /// Reliable-unicast attempts.
    #[serde(default = "default_max_retransmits")]
    pub max_retransmits: u8,
    /// Initial routing-table slot count.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Probe length before a rehash is triggered.
    #[serde(default = "default_max_chain")]
    pub max_chain: usize,
    /// Slope buffers a compute node can hold concurrently.
    #[serde(default = "default_max_tracked")]
    pub max_tracked: usize,
    /// Ring size per slope buffer.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Minimum samples before a slope decision is made.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Percent-per-step worsening threshold; `slope >= threshold` opens the valve.
    #[serde(default = "default_slope_threshold")]
    pub slope_threshold: i32,
    /// Sensor reporting interval, seconds.
    #[serde(default = "default_data_period")]
    pub data_period_secs: u64,
    /// Valve auto-close delay, seconds.
    #[serde(default = "default_open_duration")]
    pub open_duration_secs: u64,
}

impl Default for MoteConfig {
    fn default() -> Self {
        MoteConfig {
            t_min_secs: default_t_min(),
            t_max_secs: default_t_max(),
            rss_hysteresis: default_rss_hysteresis(),
            timeout_children_secs: default_timeout_children(),
            timeout_parent_secs: default_timeout_parent(),
            max_retransmits: default_max_retransmits(),
            initial_capacity: default_initial_capacity(),
            max_chain: default_max_chain(),
            max_tracked: default_max_tracked(),
            max_samples: default_max_samples(),
            min_samples: default_min_samples(),
            slope_threshold: default_slope_threshold(),
            data_period_secs: default_data_period(),
            open_duration_secs: default_open_duration(),
        }
    }
}

impl MoteConfig {
    /// Load a configuration overlay from a TOML file.
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", config_path.display()))
    }

    pub fn t_min(&self) -> Duration {
        Duration::from_secs(self.t_min_secs)
    }
    pub fn t_max(&self) -> Duration {
        Duration::from_secs(self.t_max_secs)
    }
    pub fn timeout_children(&self) -> Duration {
        Duration::from_secs(self.timeout_children_secs)
    }
    pub fn timeout_parent(&self) -> Duration {
        Duration::from_secs(self.timeout_parent_secs)
    }
    pub fn data_period(&self) -> Duration {
        Duration::from_secs(self.data_period_secs)
    }
    pub fn open_duration(&self) -> Duration {
        Duration::from_secs(self.open_duration_secs)
    }
}

/// Detach sentinel rank (§6). Not runtime-tunable: it is part of the wire
/// protocol's meaning of "rank", not an operational knob.
pub const INFINITE_RANK: u8 = 255;

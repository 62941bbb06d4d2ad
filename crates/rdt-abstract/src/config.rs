use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("protocol must be one of 'AB', 'GBN', or 'SR' (got '{0}')")]
    UnknownProtocol(String),
    #[error("{name} must lie in [0, 1] (got {value})")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("windowsize must be at least 1")]
    InvalidWindowSize,
    #[error("timeout must be a positive, finite duration (got {0})")]
    InvalidTimeout(f64),
    #[error("avg_delay must be non-negative and finite (got {0})")]
    InvalidDelay(f64),
    #[error("drain_limit must be non-negative and finite (got {0})")]
    InvalidDrainLimit(f64),
}

/// Which ARQ variant a simulation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Stop-and-wait with an alternating sequence bit.
    #[serde(rename = "AB")]
    AlternatingBit,
    #[serde(rename = "GBN")]
    GoBackN,
    #[serde(rename = "SR")]
    SelectiveRepeat,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::AlternatingBit => "AB",
            Protocol::GoBackN => "GBN",
            Protocol::SelectiveRepeat => "SR",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AB" => Ok(Protocol::AlternatingBit),
            "GBN" => Ok(Protocol::GoBackN),
            "SR" => Ok(Protocol::SelectiveRepeat),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub protocol: Protocol,
    /// Messages accepted from layer 5 before the run stops.
    pub num_messages: u64,
    pub loss_probability: f64,
    pub corruption_probability: f64,
    /// Mean time between two messages from layer 5.
    pub avg_delay: f64,
    /// Ignored by the alternating-bit protocol.
    pub windowsize: usize,
    /// Retransmission interval.
    pub timeout: f64,
    /// `None` picks a random seed.
    pub seed: Option<u32>,
    /// Log verbosity, -1 (errors only) through 4. Never changes the outcome.
    pub trace: i8,
    /// Keep running after the last message until the sender is idle, for at
    /// most this much extra simulated time. `None` stops at the quota.
    pub drain_limit: Option<f64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::AlternatingBit,
            num_messages: 25,
            loss_probability: 0.2,
            corruption_probability: 0.2,
            avg_delay: 40.0,
            windowsize: 8,
            timeout: 20.0,
            seed: None,
            trace: 2,
            drain_limit: None,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("loss_probability", self.loss_probability)?;
        check_probability("corruption_probability", self.corruption_probability)?;
        if self.windowsize == 0 {
            return Err(ConfigError::InvalidWindowSize);
        }
        if !(self.timeout.is_finite() && self.timeout > 0.0) {
            return Err(ConfigError::InvalidTimeout(self.timeout));
        }
        if !(self.avg_delay.is_finite() && self.avg_delay >= 0.0) {
            return Err(ConfigError::InvalidDelay(self.avg_delay));
        }
        if let Some(limit) = self.drain_limit {
            if !(limit.is_finite() && limit >= 0.0) {
                return Err(ConfigError::InvalidDrainLimit(limit));
            }
        }
        Ok(())
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}

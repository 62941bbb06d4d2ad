use crate::config::{Protocol, SimConfig};
use serde::Deserialize;

/// Partial configuration read from a TOML file; unset fields keep the
/// values already in the target [`SimConfig`].
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SimConfigOverride {
    pub protocol: Option<Protocol>,
    pub num_messages: Option<u64>,
    pub loss_probability: Option<f64>,
    pub corruption_probability: Option<f64>,
    pub avg_delay: Option<f64>,
    pub windowsize: Option<usize>,
    pub timeout: Option<f64>,
    pub seed: Option<u32>,
    pub trace: Option<i8>,
    pub drain_limit: Option<f64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.protocol {
            config.protocol = v;
        }
        if let Some(v) = self.num_messages {
            config.num_messages = v;
        }
        if let Some(v) = self.loss_probability {
            config.loss_probability = v;
        }
        if let Some(v) = self.corruption_probability {
            config.corruption_probability = v;
        }
        if let Some(v) = self.avg_delay {
            config.avg_delay = v;
        }
        if let Some(v) = self.windowsize {
            config.windowsize = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        if let Some(v) = self.seed {
            config.seed = Some(v);
        }
        if let Some(v) = self.trace {
            config.trace = v;
        }
        if let Some(v) = self.drain_limit {
            config.drain_limit = Some(v);
        }
    }
}

use serde::Serialize;
use std::collections::HashMap;
use rdt_abstract::SimConfig;

use crate::engine::LinkEventSummary;

/// Per-endpoint counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    /// Messages accepted from layer 5.
    pub num_sent: u64,
    /// Packets that arrived from layer 3, corrupted or not.
    pub num_received: u64,
    /// Arrivals that failed the checksum.
    pub num_corrupt: u64,
    /// Packets handed to the link, retransmissions included.
    pub num_transmitted: u64,
    pub num_retransmitted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    /// Simulated time when the run stopped.
    pub duration: f64,
    /// Packets received by the receiving endpoint per time unit.
    pub throughput: f64,
    /// Words delivered to layer 5 per time unit.
    pub goodput: f64,
    pub rtts: Vec<f64>,
    pub mean_rtt: Option<f64>,
    pub num_sent: u64,
    pub num_retransmitted: u64,
    /// Packets corrupted by either link.
    pub num_corrupt: u64,
    /// Packets dropped by either link.
    pub num_lost: u64,
    pub sender: EndpointStats,
    pub receiver: EndpointStats,
    pub output: Vec<String>,
    pub metrics: HashMap<String, Vec<(f64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulationReport {
    /// Everything the receiving application saw, one line per delivery.
    pub fn transcript(&self) -> String {
        self.output
            .iter()
            .map(|line| format!("{line}\n"))
            .collect()
    }

    pub fn words_delivered(&self) -> usize {
        word_count(&self.output)
    }
}

pub(crate) fn word_count(output: &[String]) -> usize {
    output.iter().map(|line| line.split_whitespace().count()).sum()
}

/// `count / duration`, or zero for a run that never advanced the clock.
pub(crate) fn rate(count: f64, duration: f64) -> f64 {
    if duration > 0.0 { count / duration } else { 0.0 }
}

pub(crate) fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

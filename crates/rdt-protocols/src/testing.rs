//! A [`SystemContext`] that records what a handler asked for, so state
//! machines can be driven one event at a time without a scheduler.

use rdt_abstract::{Packet, SystemContext};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(Packet),
    Retransmit(Packet),
    StartTimer(f64),
    StopTimer,
    Deliver(String),
}

#[derive(Default)]
pub struct RecordingContext {
    pub now: f64,
    pub actions: Vec<Action>,
    pub metrics: Vec<(String, f64)>,
    pub timer_pending: bool,
}

impl RecordingContext {
    pub fn at(now: f64) -> Self {
        Self {
            now,
            ..Default::default()
        }
    }

    /// Every packet handed to layer 3, first transmissions and retransmissions alike.
    pub fn packets(&self) -> Vec<&Packet> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(p) | Action::Retransmit(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn retransmitted(&self) -> Vec<u32> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Retransmit(p) => Some(p.seqnum),
                _ => None,
            })
            .collect()
    }

    pub fn delivered(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Deliver(d) => Some(d.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.metrics.clear();
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.actions.push(Action::Send(packet));
    }

    fn retransmit_packet(&mut self, packet: Packet) {
        self.actions.push(Action::Retransmit(packet));
    }

    fn start_timer(&mut self, delay: f64) {
        if !self.timer_pending {
            self.timer_pending = true;
            self.actions.push(Action::StartTimer(delay));
        }
    }

    fn stop_timer(&mut self) {
        self.timer_pending = false;
        self.actions.push(Action::StopTimer);
    }

    fn deliver_data(&mut self, data: &str) {
        self.actions.push(Action::Deliver(data.to_string()));
    }

    fn log(&mut self, _message: &str) {}

    fn now(&self) -> f64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}

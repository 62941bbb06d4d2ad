//! Go-Back-N: cumulative ACKs and a single timer covering the oldest
//! unacknowledged packet.

use std::collections::{HashMap, VecDeque};

use rdt_abstract::{Message, Packet, SystemContext, TransportProtocol, make_packet};

pub struct GbnSender {
    windowsize: usize,
    timeout: f64,
    nextseqnum: u32,
    /// In-flight packets ordered by sequence number (front = oldest).
    window: VecDeque<Packet>,
    pending: VecDeque<Message>,
    sent_at: HashMap<u32, f64>,
}

impl GbnSender {
    pub fn new(windowsize: usize, timeout: f64) -> Self {
        Self {
            windowsize,
            timeout,
            nextseqnum: 1,
            window: VecDeque::with_capacity(windowsize),
            pending: VecDeque::new(),
            sent_at: HashMap::new(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    pub fn window_seqnums(&self) -> Vec<u32> {
        self.window.iter().map(|p| p.seqnum).collect()
    }

    fn dispatch(&mut self, ctx: &mut dyn SystemContext, message: Message) {
        let packet = make_packet(self.nextseqnum, 0, message.data());
        ctx.log(&format!("GBN send {packet}"));
        ctx.send_packet(packet.clone());
        self.sent_at.insert(packet.seqnum, ctx.now());
        if self.window.is_empty() {
            ctx.start_timer(self.timeout);
        }
        self.window.push_back(packet);
        self.nextseqnum += 1;
    }

    /// Position of `seqnum` in the window. An ACK outside the window is
    /// stale, not an error.
    fn index_of(&self, seqnum: u32) -> Option<usize> {
        self.window.iter().position(|p| p.seqnum == seqnum)
    }
}

impl TransportProtocol for GbnSender {
    fn from_layer5(&mut self, ctx: &mut dyn SystemContext, message: Message) {
        if self.window.len() >= self.windowsize {
            self.pending.push_back(message);
        } else {
            self.dispatch(ctx, message);
        }
    }

    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupt() {
            ctx.log(&format!("GBN sender discarding corrupt ACK {packet}"));
            return;
        }
        match self.index_of(packet.acknum) {
            Some(index) => {
                for acked in self.window.drain(..=index) {
                    if let Some(sent_at) = self.sent_at.remove(&acked.seqnum) {
                        ctx.record_metric("rtt", ctx.now() - sent_at);
                    }
                }
                ctx.log(&format!(
                    "GBN ACK {} slides window to {} outstanding",
                    packet.acknum,
                    self.window.len()
                ));
            }
            None => ctx.log(&format!("GBN stale ACK {}", packet.acknum)),
        }
        while self.window.len() < self.windowsize {
            let Some(message) = self.pending.pop_front() else {
                break;
            };
            self.dispatch(ctx, message);
        }
        // Restarting on every ACK extends the timeout for what is still
        // outstanding.
        ctx.stop_timer();
        if !self.window.is_empty() {
            ctx.start_timer(self.timeout);
        }
    }

    fn timer_interrupt(&mut self, ctx: &mut dyn SystemContext) {
        ctx.start_timer(self.timeout);
        ctx.log(&format!(
            "GBN timeout, resending {} packets",
            self.window.len()
        ));
        for packet in &self.window {
            ctx.retransmit_packet(packet.clone());
        }
    }

    fn is_idle(&self) -> bool {
        self.window.is_empty() && self.pending.is_empty()
    }
}

pub struct GbnReceiver {
    expected_seqnum: u32,
    ack_to_send: Packet,
}

impl Default for GbnReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self {
            expected_seqnum: 1,
            ack_to_send: make_packet(0, 0, ""),
        }
    }

    pub fn expected_seqnum(&self) -> u32 {
        self.expected_seqnum
    }
}

impl TransportProtocol for GbnReceiver {
    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if !packet.is_corrupt() && packet.seqnum == self.expected_seqnum {
            ctx.deliver_data(&packet.payload);
            self.ack_to_send = make_packet(0, self.expected_seqnum, "");
            self.expected_seqnum += 1;
        } else {
            ctx.log(&format!(
                "GBN receiver expected {}, re-ACKing {}",
                self.expected_seqnum, self.ack_to_send.acknum
            ));
        }
        ctx.send_packet(self.ack_to_send.clone());
    }
}

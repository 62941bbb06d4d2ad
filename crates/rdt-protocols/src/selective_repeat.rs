//! Selective repeat: per-packet ACKs and per-packet timeouts.
//!
//! The sender keeps a single periodic tick running (period 1) and files each
//! packet's timeout under the integer part of its expiry time. A tick at time
//! `t` retransmits whatever is filed under `t`. Expiry times are therefore
//! quantized to whole time units; a `timeout` below 1 can file a packet under
//! a tick that has already passed.

use std::collections::{BTreeMap, HashMap, VecDeque};

use rdt_abstract::{Message, Packet, SystemContext, TransportProtocol, make_packet};

const TICK: f64 = 1.0;

pub struct SrSender {
    windowsize: usize,
    timeout: f64,
    nextseqnum: u32,
    window: VecDeque<Packet>,
    /// Ack flag for every packet still in the window.
    acked: HashMap<u32, bool>,
    pending: VecDeque<Message>,
    /// Truncated expiry time -> sequence numbers due then.
    timeouts: BTreeMap<i64, Vec<u32>>,
    sent_at: HashMap<u32, f64>,
}

impl SrSender {
    pub fn new(windowsize: usize, timeout: f64) -> Self {
        Self {
            windowsize,
            timeout,
            nextseqnum: 1,
            window: VecDeque::with_capacity(windowsize),
            acked: HashMap::new(),
            pending: VecDeque::new(),
            timeouts: BTreeMap::new(),
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

    /// Sequence numbers whose timeout is filed under `bucket`.
    pub fn due_at(&self, bucket: i64) -> &[u32] {
        self.timeouts
            .get(&bucket)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn schedule_timeout(&mut self, now: f64, seqnum: u32) {
        let bucket = (now + self.timeout).trunc() as i64;
        self.timeouts.entry(bucket).or_default().push(seqnum);
    }

    fn remove_timeout(&mut self, seqnum: u32) {
        let found = self.timeouts.iter_mut().find_map(|(bucket, seqnums)| {
            let index = seqnums.iter().position(|&s| s == seqnum)?;
            seqnums.remove(index);
            Some((*bucket, seqnums.is_empty()))
        });
        if let Some((bucket, true)) = found {
            self.timeouts.remove(&bucket);
        }
    }

    fn dispatch(&mut self, ctx: &mut dyn SystemContext, message: Message) {
        let packet = make_packet(self.nextseqnum, 0, message.data());
        ctx.log(&format!("SR send {packet}"));
        ctx.send_packet(packet.clone());
        self.sent_at.insert(packet.seqnum, ctx.now());
        self.acked.insert(packet.seqnum, false);
        self.schedule_timeout(ctx.now(), packet.seqnum);
        self.window.push_back(packet);
        self.nextseqnum += 1;
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        ctx.start_timer(0.0);
    }

    fn from_layer5(&mut self, ctx: &mut dyn SystemContext, message: Message) {
        if self.window.len() >= self.windowsize {
            self.pending.push_back(message);
        } else {
            self.dispatch(ctx, message);
        }
    }

    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupt() {
            ctx.log(&format!("SR sender discarding corrupt ACK {packet}"));
            return;
        }
        let acknum = packet.acknum;
        if self.acked.get(&acknum) != Some(&false) {
            ctx.log(&format!("SR duplicate or unknown ACK {acknum}"));
            return;
        }
        if !self.window.iter().any(|p| p.seqnum == acknum) {
            return;
        }
        self.acked.insert(acknum, true);
        if let Some(sent_at) = self.sent_at.remove(&acknum) {
            ctx.record_metric("rtt", ctx.now() - sent_at);
        }
        self.remove_timeout(acknum);

        while let Some(front) = self.window.front() {
            if self.acked.get(&front.seqnum) != Some(&true) {
                break;
            }
            let seqnum = front.seqnum;
            self.acked.remove(&seqnum);
            self.window.pop_front();
        }
        while self.window.len() < self.windowsize {
            let Some(message) = self.pending.pop_front() else {
                break;
            };
            self.dispatch(ctx, message);
        }
    }

    fn timer_interrupt(&mut self, ctx: &mut dyn SystemContext) {
        let now = ctx.now();
        if let Some(due) = self.timeouts.remove(&(now.trunc() as i64)) {
            for seqnum in due {
                let Some(packet) = self.window.iter().find(|p| p.seqnum == seqnum) else {
                    continue;
                };
                ctx.log(&format!("SR timeout, resending {packet}"));
                ctx.retransmit_packet(packet.clone());
                self.schedule_timeout(now, seqnum);
            }
        }
        ctx.start_timer(TICK);
    }

    fn is_idle(&self) -> bool {
        self.window.is_empty() && self.pending.is_empty()
    }
}

pub struct SrReceiver {
    windowsize: usize,
    expected_seqnum: u32,
    buffered: BTreeMap<u32, String>,
}

impl SrReceiver {
    pub fn new(windowsize: usize) -> Self {
        Self {
            windowsize,
            expected_seqnum: 1,
            buffered: BTreeMap::new(),
        }
    }

    pub fn expected_seqnum(&self) -> u32 {
        self.expected_seqnum
    }

    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }
}

impl TransportProtocol for SrReceiver {
    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupt() {
            ctx.log(&format!("SR receiver discarding corrupt {packet}"));
            return;
        }
        let window_end = self.expected_seqnum as u64 + self.windowsize as u64;
        if packet.seqnum as u64 >= window_end {
            ctx.log(&format!(
                "SR receiver dropping seq {} beyond window end {window_end}",
                packet.seqnum
            ));
            return;
        }
        ctx.send_packet(make_packet(0, packet.seqnum, ""));
        if packet.seqnum >= self.expected_seqnum {
            self.buffered.insert(packet.seqnum, packet.payload);
            while let Some(data) = self.buffered.remove(&self.expected_seqnum) {
                ctx.deliver_data(&data);
                self.expected_seqnum += 1;
            }
        }
    }
}

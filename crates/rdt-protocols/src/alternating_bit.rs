//! Stop-and-wait with a one-bit sequence number.

use std::collections::VecDeque;

use rdt_abstract::{Message, Packet, SystemContext, TransportProtocol, make_packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbState {
    /// Waiting for message 0 from layer 5.
    Wait0,
    /// Waiting for message 1 from layer 5.
    Wait1,
    WaitAck0,
    WaitAck1,
}

impl AbState {
    fn awaiting_ack(self) -> bool {
        matches!(self, AbState::WaitAck0 | AbState::WaitAck1)
    }
}

pub struct AbSender {
    state: AbState,
    timeout: f64,
    /// Head is the message in flight (once sent) until its ACK arrives.
    waiting: VecDeque<Message>,
    last_packet: Option<Packet>,
    sent_at: Option<f64>,
}

impl AbSender {
    pub fn new(timeout: f64) -> Self {
        Self {
            state: AbState::Wait0,
            timeout,
            waiting: VecDeque::new(),
            last_packet: None,
            sent_at: None,
        }
    }

    pub fn state(&self) -> AbState {
        self.state
    }

    pub fn queued(&self) -> usize {
        self.waiting.len()
    }

    fn send_waiting(&mut self, ctx: &mut dyn SystemContext) {
        let Some(message) = self.waiting.front() else {
            return;
        };
        let (seqnum, next_state) = match self.state {
            AbState::Wait0 => (0, AbState::WaitAck0),
            AbState::Wait1 => (1, AbState::WaitAck1),
            AbState::WaitAck0 | AbState::WaitAck1 => {
                ctx.log(&format!(
                    "AB queuing message {} while still waiting for an ACK",
                    message.data()
                ));
                return;
            }
        };
        let packet = make_packet(seqnum, 0, message.data());
        ctx.log(&format!("AB send {packet}"));
        ctx.send_packet(packet.clone());
        ctx.start_timer(self.timeout);
        self.sent_at = Some(ctx.now());
        self.last_packet = Some(packet);
        self.state = next_state;
    }
}

impl TransportProtocol for AbSender {
    fn from_layer5(&mut self, ctx: &mut dyn SystemContext, message: Message) {
        self.waiting.push_back(message);
        if self.waiting.len() == 1 {
            self.send_waiting(ctx);
        }
    }

    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupt() {
            ctx.log(&format!("AB sender discarding corrupt ACK {packet}"));
            return;
        }
        let (expected, next_state) = match self.state {
            AbState::WaitAck0 => (0, AbState::Wait1),
            AbState::WaitAck1 => (1, AbState::Wait0),
            AbState::Wait0 | AbState::Wait1 => {
                ctx.log("AB sender got an ACK while waiting for layer 5");
                return;
            }
        };
        if packet.acknum != expected {
            ctx.log(&format!(
                "AB sender expected ACK {expected}, got {}",
                packet.acknum
            ));
            return;
        }
        ctx.stop_timer();
        if let Some(sent_at) = self.sent_at.take() {
            ctx.record_metric("rtt", ctx.now() - sent_at);
        }
        self.state = next_state;
        self.waiting.pop_front();
        self.send_waiting(ctx);
    }

    fn timer_interrupt(&mut self, ctx: &mut dyn SystemContext) {
        if !self.state.awaiting_ack() {
            ctx.log("AB timeout while waiting for layer 5");
            return;
        }
        if let Some(packet) = &self.last_packet {
            ctx.log(&format!("AB timeout, resending {packet}"));
            ctx.retransmit_packet(packet.clone());
            ctx.start_timer(self.timeout);
        }
    }

    fn is_idle(&self) -> bool {
        self.waiting.is_empty()
    }
}

pub struct AbReceiver {
    expected: u32,
    last_ack: Option<Packet>,
}

impl Default for AbReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl AbReceiver {
    pub fn new() -> Self {
        Self {
            expected: 0,
            last_ack: None,
        }
    }

    pub fn expected_seqnum(&self) -> u32 {
        self.expected
    }
}

impl TransportProtocol for AbReceiver {
    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.seqnum != self.expected {
            ctx.log(&format!(
                "AB receiver expected seq {}, got {}; re-ACKing",
                self.expected, packet.seqnum
            ));
            if let Some(ack) = &self.last_ack {
                ctx.send_packet(ack.clone());
            }
            return;
        }
        if packet.is_corrupt() {
            ctx.log(&format!("AB receiver discarding corrupt {packet}"));
            return;
        }
        ctx.deliver_data(&packet.payload);
        self.expected ^= 1;
        let ack = make_packet(0, packet.seqnum, "");
        ctx.send_packet(ack.clone());
        self.last_ack = Some(ack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Action, RecordingContext};
    use rdt_abstract::checksum;

    #[test]
    fn from_layer5_sends_with_current_bit() {
        let mut sender = AbSender::new(1.0);
        let mut ctx = RecordingContext::default();

        sender.from_layer5(&mut ctx, Message::new("foo"));
        assert_eq!(sender.state(), AbState::WaitAck0);
        let packets = ctx.packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].seqnum, 0);
        assert!(!packets[0].is_corrupt());
        assert!(ctx.actions.contains(&Action::StartTimer(1.0)));

        let mut sender = AbSender::new(1.0);
        sender.state = AbState::Wait1;
        let mut ctx = RecordingContext::default();
        sender.from_layer5(&mut ctx, Message::new("bar"));
        assert_eq!(sender.state(), AbState::WaitAck1);
        assert_eq!(ctx.packets()[0].seqnum, 1);
    }

    #[test]
    fn messages_queue_while_awaiting_ack() {
        let mut sender = AbSender::new(1.0);
        let mut ctx = RecordingContext::default();
        sender.from_layer5(&mut ctx, Message::new("foo"));
        sender.from_layer5(&mut ctx, Message::new("bar"));

        assert_eq!(ctx.packets().len(), 1);
        assert_eq!(sender.queued(), 2);
        assert!(!sender.is_idle());

        ctx.clear();
        sender.from_layer3(&mut ctx, make_packet(0, 0, ""));
        assert_eq!(sender.state(), AbState::WaitAck1);
        let packets = ctx.packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].seqnum, 1);
        assert_eq!(packets[0].payload, "bar");
    }

    #[test]
    fn good_ack_flips_the_bit_and_stops_the_timer() {
        let mut sender = AbSender::new(1.0);
        let mut ctx = RecordingContext::default();
        sender.from_layer5(&mut ctx, Message::new("foo"));
        ctx.clear();

        ctx.now = 4.0;
        sender.from_layer3(&mut ctx, Packet::new(0, 0, checksum(0, 0, "foo"), "foo"));
        assert_eq!(sender.state(), AbState::Wait1);
        assert_eq!(ctx.actions, vec![Action::StopTimer]);
        assert!(!ctx.timer_pending);
        assert_eq!(ctx.metrics, vec![("rtt".to_string(), 4.0)]);
        assert!(sender.is_idle());
    }

    #[test]
    fn corrupt_ack_is_dropped() {
        let mut sender = AbSender::new(1.0);
        sender.state = AbState::WaitAck0;
        let mut ctx = RecordingContext::default();
        sender.from_layer3(&mut ctx, Packet::new(0, 0, 12345, "corrupt"));
        assert_eq!(sender.state(), AbState::WaitAck0);

        sender.state = AbState::WaitAck1;
        sender.from_layer3(&mut ctx, Packet::new(0, 0, 67890, "corrupt"));
        assert_eq!(sender.state(), AbState::WaitAck1);
        assert!(ctx.actions.is_empty());
    }

    #[test]
    fn wrong_acknum_is_dropped() {
        let mut sender = AbSender::new(1.0);
        sender.state = AbState::WaitAck0;
        let mut ctx = RecordingContext::default();
        sender.from_layer3(&mut ctx, make_packet(0, 1, "foo"));
        assert_eq!(sender.state(), AbState::WaitAck0);

        sender.state = AbState::WaitAck1;
        sender.from_layer3(&mut ctx, make_packet(0, 0, "bar"));
        assert_eq!(sender.state(), AbState::WaitAck1);
        assert!(ctx.actions.is_empty());
    }

    #[test]
    fn timer_interrupt_resends_only_when_awaiting() {
        let mut sender = AbSender::new(1.0);
        let mut ctx = RecordingContext::default();
        sender.from_layer5(&mut ctx, Message::new("foo"));
        let sent = ctx.packets()[0].clone();
        ctx.clear();
        ctx.timer_pending = false;

        sender.timer_interrupt(&mut ctx);
        assert_eq!(
            ctx.actions,
            vec![Action::Retransmit(sent), Action::StartTimer(1.0)]
        );

        let mut idle = AbSender::new(1.0);
        let mut ctx = RecordingContext::default();
        idle.timer_interrupt(&mut ctx);
        assert!(ctx.actions.is_empty());
    }

    #[test]
    fn receiver_delivers_each_bit_once() {
        let mut receiver = AbReceiver::new();
        let mut ctx = RecordingContext::default();

        let foo = make_packet(0, 0, "foo");
        receiver.from_layer3(&mut ctx, foo.clone());
        receiver.from_layer3(&mut ctx, foo);
        assert_eq!(ctx.delivered(), vec!["foo"]);

        let bar = make_packet(1, 0, "bar");
        receiver.from_layer3(&mut ctx, bar.clone());
        receiver.from_layer3(&mut ctx, bar);
        assert_eq!(ctx.delivered(), vec!["foo", "bar"]);

        // every duplicate was answered with the previous ACK
        let acks: Vec<u32> = ctx.packets().iter().map(|p| p.acknum).collect();
        assert_eq!(acks, vec![0, 0, 1, 1]);
    }

    #[test]
    fn receiver_ignores_corrupt_payload() {
        let mut receiver = AbReceiver::new();
        let mut ctx = RecordingContext::default();
        let mut packet = make_packet(0, 0, "foo");
        packet.garble_payload();
        receiver.from_layer3(&mut ctx, packet);
        assert!(ctx.actions.is_empty());
        assert_eq!(receiver.expected_seqnum(), 0);
    }
}

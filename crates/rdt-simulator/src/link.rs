use rdt_abstract::{CORRUPT_SENTINEL, Packet};
use serde::Serialize;
use tracing::debug;

use crate::engine::{EventType, NodeId};
use crate::random::{OsiRandom, STREAM_CORRUPT, STREAM_CORRUPT_KIND, STREAM_DELAY, STREAM_LOSS};
use crate::scheduler::{EventHandle, Scheduler};

/// Shortest propagation delay of a link.
pub const MIN_DELAY: f64 = 1.0;
/// Width of the uniform band added on top of [`MIN_DELAY`].
pub const DELAY_SPREAD: f64 = 9.0;

/// Which part of a packet the channel damaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Corruption {
    Payload,
    SeqNum,
    AckNum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkOutcome {
    Lost,
    Delivered {
        at: f64,
        corrupted: Option<Corruption>,
    },
}

/// One direction of the lossy channel between the two endpoints.
///
/// Packets on one link never overtake each other: each arrival is scheduled
/// after the latest arrival still pending on the same link.
#[derive(Debug)]
pub struct UnreliableLink {
    from: NodeId,
    to: NodeId,
    loss_probability: f64,
    corruption_probability: f64,
    num_lost: u64,
    num_corrupt: u64,
    last_arrival: Option<(EventHandle, f64)>,
}

impl UnreliableLink {
    pub fn new(from: NodeId, loss_probability: f64, corruption_probability: f64) -> Self {
        Self {
            from,
            to: from.peer(),
            loss_probability,
            corruption_probability,
            num_lost: 0,
            num_corrupt: 0,
            last_arrival: None,
        }
    }

    pub fn destination(&self) -> NodeId {
        self.to
    }

    pub fn num_lost(&self) -> u64 {
        self.num_lost
    }

    pub fn num_corrupt(&self) -> u64 {
        self.num_corrupt
    }

    /// Put a copy of `packet` on the wire. The caller keeps its original.
    pub fn send(
        &mut self,
        packet: &Packet,
        scheduler: &mut Scheduler<EventType>,
        rng: &mut OsiRandom,
    ) -> LinkOutcome {
        let mut packet = packet.clone();
        debug!("[{:?}->{:?}] send {}", self.from, self.to, packet);

        if chance(rng, STREAM_LOSS, self.loss_probability) {
            self.num_lost += 1;
            debug!("[{:?}->{:?}] packet being lost", self.from, self.to);
            return LinkOutcome::Lost;
        }

        let mut corrupted = None;
        if chance(rng, STREAM_CORRUPT, self.corruption_probability) {
            self.num_corrupt += 1;
            let kind = rng.next_double(STREAM_CORRUPT_KIND);
            let corruption = if kind < 0.75 {
                packet.garble_payload();
                Corruption::Payload
            } else if kind < 0.875 {
                packet.seqnum = CORRUPT_SENTINEL;
                Corruption::SeqNum
            } else {
                packet.acknum = CORRUPT_SENTINEL;
                Corruption::AckNum
            };
            debug!(
                "[{:?}->{:?}] packet being corrupted ({:?}): {}",
                self.from, self.to, corruption, packet
            );
            corrupted = Some(corruption);
        }

        let base = match self.last_arrival {
            Some((handle, at)) if scheduler.is_pending(handle) => at,
            _ => scheduler.now(),
        };
        let at = base + MIN_DELAY + DELAY_SPREAD * rng.next_double(STREAM_DELAY);
        let handle = scheduler.schedule_at(at, EventType::PacketArrival { to: self.to, packet });
        self.last_arrival = Some((handle, at));

        LinkOutcome::Delivered { at, corrupted }
    }
}

/// Draws from `stream` and reports whether an event of `probability` hit.
/// `next_double` can return exactly 1.0, so a probability of 1 is forced.
fn chance(rng: &mut OsiRandom, stream: usize, probability: f64) -> bool {
    let roll = rng.next_double(stream);
    roll < probability || probability >= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdt_abstract::make_packet;

    fn arrivals(scheduler: &mut Scheduler<EventType>) -> Vec<(f64, Packet)> {
        let mut out = Vec::new();
        while let Some((_, event)) = scheduler.pop() {
            if let EventType::PacketArrival { packet, .. } = event {
                out.push((scheduler.now(), packet));
            }
        }
        out
    }

    #[test]
    fn clean_link_delivers_an_identical_copy_later() {
        let mut scheduler = Scheduler::new();
        let mut rng = OsiRandom::new(Some(1234));
        let mut link = UnreliableLink::new(NodeId::Sender, 0.0, 0.0);

        let packet = make_packet(0, 0, "foo");
        let outcome = link.send(&packet, &mut scheduler, &mut rng);
        assert!(matches!(
            outcome,
            LinkOutcome::Delivered { corrupted: None, at } if at >= MIN_DELAY
        ));
        assert_eq!(scheduler.len(), 1);

        let delivered = arrivals(&mut scheduler);
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].0 > 0.0);
        assert_eq!(delivered[0].1, packet);
    }

    #[test]
    fn packets_on_one_link_are_never_reordered() {
        let mut scheduler = Scheduler::new();
        let mut rng = OsiRandom::new(Some(1234));
        let mut link = UnreliableLink::new(NodeId::Sender, 0.0, 0.0);

        for seq in 0..50 {
            link.send(&make_packet(seq, 0, "foo"), &mut scheduler, &mut rng);
        }
        let delivered = arrivals(&mut scheduler);
        let seqs: Vec<u32> = delivered.iter().map(|(_, p)| p.seqnum).collect();
        assert_eq!(seqs, (0..50).collect::<Vec<_>>());
        assert!(delivered.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn cancelled_tail_does_not_delay_the_next_packet() {
        let mut scheduler = Scheduler::new();
        let mut rng = OsiRandom::new(Some(3));
        let mut link = UnreliableLink::new(NodeId::Receiver, 0.0, 0.0);

        link.send(&make_packet(0, 1, ""), &mut scheduler, &mut rng);
        scheduler.clear();
        let outcome = link.send(&make_packet(0, 2, ""), &mut scheduler, &mut rng);
        let LinkOutcome::Delivered { at, .. } = outcome else {
            panic!("clean link lost a packet");
        };
        assert!(at <= MIN_DELAY + DELAY_SPREAD);
        assert_eq!(link.destination(), NodeId::Sender);
    }

    #[test]
    fn certain_loss_schedules_nothing() {
        let mut scheduler = Scheduler::new();
        let mut rng = OsiRandom::new(Some(1234));
        let mut link = UnreliableLink::new(NodeId::Sender, 1.0, 0.0);

        for seq in 0..3 {
            let outcome = link.send(&make_packet(seq, 0, "foo"), &mut scheduler, &mut rng);
            assert_eq!(outcome, LinkOutcome::Lost);
        }
        assert!(scheduler.is_empty());
        assert_eq!(link.num_lost(), 3);
    }

    #[test]
    fn certain_corruption_always_breaks_the_copy() {
        let mut scheduler = Scheduler::new();
        let mut rng = OsiRandom::new(Some(1234));
        let mut link = UnreliableLink::new(NodeId::Sender, 0.0, 1.0);

        let originals: Vec<Packet> = (0..40).map(|seq| make_packet(seq, 0, "foo")).collect();
        for packet in &originals {
            link.send(packet, &mut scheduler, &mut rng);
        }
        assert_eq!(link.num_corrupt(), 40);

        let delivered = arrivals(&mut scheduler);
        for ((_, copy), original) in delivered.iter().zip(&originals) {
            assert_ne!(copy, original);
            assert!(copy.is_corrupt());
            // the sender's copy is untouched
            assert!(!original.is_corrupt());
        }
    }
}

use crate::packet::{Message, Packet};

/// The capability provided by the simulator to an endpoint.
/// Endpoints never touch the event queue directly; everything they want done
/// goes through these calls and is applied once the handler returns.
pub trait SystemContext {
    /// Hand a packet to layer 3 (the endpoint's outbound unreliable link).
    fn send_packet(&mut self, packet: Packet);

    /// Hand an already-sent packet to layer 3 again. Counted as a
    /// retransmission.
    fn retransmit_packet(&mut self, packet: Packet);

    /// Start the retransmission timer, `delay` time units from now.
    /// A no-op while a timer is already pending for this endpoint.
    fn start_timer(&mut self, delay: f64);

    /// Cancel the pending timer, if any.
    fn stop_timer(&mut self);

    /// Deliver a payload to layer 5 on the receiving side.
    fn deliver_data(&mut self, data: &str);

    /// Log a message to the simulator's trace output.
    fn log(&mut self, message: &str);

    /// Current simulation time.
    fn now(&self) -> f64;

    /// Record a numeric sample (e.g. "rtt") against the current time.
    fn record_metric(&mut self, _name: &str, _value: f64) {}
}

/// One side of a reliable-data-transfer protocol.
///
/// Senders implement all three event handlers; receivers only ever see
/// packets, so `from_layer5` and `timer_interrupt` default to no-ops.
pub trait TransportProtocol {
    /// Called once before the first event is processed.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Layer 5 has a message that must be delivered reliably.
    fn from_layer5(&mut self, _ctx: &mut dyn SystemContext, _message: Message) {}

    /// A packet (possibly corrupt, duplicated or stale) arrived from layer 3.
    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// The retransmission timer fired.
    fn timer_interrupt(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Nothing queued and nothing awaiting acknowledgement.
    fn is_idle(&self) -> bool {
        true
    }
}

//! Built-in sender/receiver state machines for the three ARQ variants.

pub mod alternating_bit;
pub mod go_back_n;
pub mod selective_repeat;
pub mod registry;

#[cfg(test)]
mod testing;

use rdt_abstract::{Message, Packet, Protocol, SimConfig, SystemContext, TransportProtocol};

pub use alternating_bit::{AbReceiver, AbSender, AbState};
pub use go_back_n::{GbnReceiver, GbnSender};
pub use selective_repeat::{SrReceiver, SrSender};
pub use registry::{builtin_by_name, builtin_pair};

/// Sending side of any built-in protocol.
pub enum SenderMachine {
    AlternatingBit(AbSender),
    GoBackN(GbnSender),
    SelectiveRepeat(SrSender),
}

/// Receiving side of any built-in protocol.
pub enum ReceiverMachine {
    AlternatingBit(AbReceiver),
    GoBackN(GbnReceiver),
    SelectiveRepeat(SrReceiver),
}

macro_rules! each_variant {
    ($machine:expr, $inner:ident => $body:expr) => {
        match $machine {
            Self::AlternatingBit($inner) => $body,
            Self::GoBackN($inner) => $body,
            Self::SelectiveRepeat($inner) => $body,
        }
    };
}

impl SenderMachine {
    pub fn new(config: &SimConfig) -> Self {
        match config.protocol {
            Protocol::AlternatingBit => Self::AlternatingBit(AbSender::new(config.timeout)),
            Protocol::GoBackN => Self::GoBackN(GbnSender::new(config.windowsize, config.timeout)),
            Protocol::SelectiveRepeat => {
                Self::SelectiveRepeat(SrSender::new(config.windowsize, config.timeout))
            }
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Self::AlternatingBit(_) => Protocol::AlternatingBit,
            Self::GoBackN(_) => Protocol::GoBackN,
            Self::SelectiveRepeat(_) => Protocol::SelectiveRepeat,
        }
    }

    /// Packets sent but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        match self {
            Self::AlternatingBit(s) => usize::from(!s.is_idle()),
            Self::GoBackN(s) => s.in_flight(),
            Self::SelectiveRepeat(s) => s.in_flight(),
        }
    }
}

impl ReceiverMachine {
    pub fn new(config: &SimConfig) -> Self {
        match config.protocol {
            Protocol::AlternatingBit => Self::AlternatingBit(AbReceiver::new()),
            Protocol::GoBackN => Self::GoBackN(GbnReceiver::new()),
            Protocol::SelectiveRepeat => Self::SelectiveRepeat(SrReceiver::new(config.windowsize)),
        }
    }
}

impl TransportProtocol for SenderMachine {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        each_variant!(self, s => s.init(ctx))
    }

    fn from_layer5(&mut self, ctx: &mut dyn SystemContext, message: Message) {
        each_variant!(self, s => s.from_layer5(ctx, message))
    }

    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        each_variant!(self, s => s.from_layer3(ctx, packet))
    }

    fn timer_interrupt(&mut self, ctx: &mut dyn SystemContext) {
        each_variant!(self, s => s.timer_interrupt(ctx))
    }

    fn is_idle(&self) -> bool {
        each_variant!(self, s => s.is_idle())
    }
}

impl TransportProtocol for ReceiverMachine {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        each_variant!(self, r => r.init(ctx))
    }

    fn from_layer3(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        each_variant!(self, r => r.from_layer3(ctx, packet))
    }
}

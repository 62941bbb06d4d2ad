pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{CORRUPT_SENTINEL, MAX_DATA_SIZE, Message, Packet, checksum, make_packet};

pub use config::{ConfigError, Protocol, SimConfig};
pub use scenario::SimConfigOverride;

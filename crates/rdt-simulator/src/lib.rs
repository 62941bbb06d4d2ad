//! Discrete-event simulation of a sender and a receiver talking over two
//! unreliable links.

pub mod engine;
pub mod link;
pub mod random;
pub mod scheduler;
pub mod trace;

use rdt_abstract::ConfigError;
use thiserror::Error;

pub use engine::{EventType, LinkEventSummary, NodeId, Simulator};
pub use link::{Corruption, LinkOutcome, UnreliableLink};
pub use random::OsiRandom;
pub use scheduler::{EventHandle, Scheduler};
pub use trace::{EndpointStats, SimulationReport};

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("this simulation has already been run")]
    AlreadyRun,
}

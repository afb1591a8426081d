pub mod adversary;
pub mod config;
pub mod event;
pub mod peer;
pub mod scheduler;
pub mod simulator;

pub use adversary::{Adversary, MinedOutcome, Release};
pub use config::{build_peer_specs, Mode, PeerSpec, SimConfig};
pub use event::Event;
pub use peer::Peer;
pub use scheduler::Scheduler;
pub use simulator::{Role, Simulator};

pub mod miner;

pub use miner::{Miner, MiningClock};

// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// This file implements the Miner struct and related methods.
// Unlike a real PoW miner that searches for a nonce, a miner here just
// owns the exponentially-distributed clock that determines how long a
// mining attempt takes: the expected delay is `Tk / hash_fraction`, so a
// peer with twice the hash power finds a block in half the expected time.
use rand::SeedableRng;
use rand_distr::{Distribution, Exp};
use rand_pcg::Pcg32;
use sim_chain::PeerId;
use std::collections::BTreeMap;

/// A seedable exponential clock for one peer's mining attempts.
pub struct MiningClock {
    rng: Pcg32,
    /// mean = Tk / hash_fraction
    mean: f64,
}

impl MiningClock {
    pub fn new(seed: u64, tk: f64, hash_fraction: f64) -> MiningClock {
        MiningClock {
            rng: Pcg32::seed_from_u64(seed),
            mean: tk / hash_fraction,
        }
    }

    /// Sample the delay until the next mining attempt completes.
    pub fn sample_delay(&mut self) -> f64 {
        let exp = Exp::new(1.0 / self.mean).expect("mean must be positive");
        let delay = exp.sample(&mut self.rng);
        log::trace!("sampled mining delay {:.6} (mean {:.6})", delay, self.mean);
        delay
    }
}

/// A miner owned by one peer: wraps the peer's mining clock and keeps a
/// running count of blocks it has produced, for status reporting.
pub struct Miner {
    pub peer_id: PeerId,
    pub hash_fraction: f64,
    clock: MiningClock,
    blocks_mined: u64,
}

impl Miner {
    pub fn new(peer_id: PeerId, hash_fraction: f64, tk: f64, seed: u64) -> Miner {
        Miner {
            peer_id,
            hash_fraction,
            clock: MiningClock::new(seed, tk, hash_fraction),
            blocks_mined: 0,
        }
    }

    /// Sample the delay until the next mining attempt for this peer
    /// completes.
    pub fn next_mining_delay(&mut self) -> f64 {
        self.clock.sample_delay()
    }

    pub fn record_block_mined(&mut self) {
        self.blocks_mined += 1;
        log::debug!("peer {} has now mined {} block(s)", self.peer_id, self.blocks_mined);
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined
    }

    /// Get status information of the miner for debug printing.
    pub fn get_status(&self) -> BTreeMap<String, String> {
        let mut status = BTreeMap::new();
        status.insert("peer_id".to_string(), self.peer_id.to_string());
        status.insert("hash_fraction".to_string(), self.hash_fraction.to_string());
        status.insert("blocks_mined".to_string(), self.blocks_mined.to_string());
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_hash_fraction_yields_a_shorter_mean_delay() {
        let mut fast = MiningClock::new(1, 10.0, 0.5);
        let mut slow = MiningClock::new(1, 10.0, 0.1);
        let fast_avg: f64 = (0..2000).map(|_| fast.sample_delay()).sum::<f64>() / 2000.0;
        let slow_avg: f64 = (0..2000).map(|_| slow.sample_delay()).sum::<f64>() / 2000.0;
        assert!(fast_avg < slow_avg);
    }

    #[test]
    fn same_seed_reproduces_the_same_sequence() {
        let mut a = MiningClock::new(42, 10.0, 1.0);
        let mut b = MiningClock::new(42, 10.0, 1.0);
        for _ in 0..10 {
            assert_eq!(a.sample_delay(), b.sample_delay());
        }
    }

    #[test]
    fn get_status_reports_blocks_mined() {
        let mut miner = Miner::new(3, 0.25, 10.0, 7);
        miner.record_block_mined();
        miner.record_block_mined();
        let status = miner.get_status();
        assert_eq!(status["blocks_mined"], "2");
        assert_eq!(status["peer_id"], "3");
    }
}

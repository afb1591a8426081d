// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// An honest network participant: owns a `BlockTree`, a local `Mempool`, a
// mining clock, and a lazily-sampled propagation latency to each neighbor.
// Event handling itself lives in `Simulator::step`, which has the peer
// arena available to look neighbors up by id; this struct only holds state
// and per-peer operations (tx generation, candidate assembly, mining timing).
use rand::SeedableRng;
use rand::Rng;
use rand_pcg::Pcg32;
use sim_chain::{BlockTree, IdGen, PeerId, SimTime, Transaction};
use sim_miner::Miner;
use sim_network::sample_rho;
use sim_tx_pool::{Mempool, UniversePool};
use std::collections::{BTreeMap, HashMap};

pub struct Peer {
    pub id: PeerId,
    pub is_slow: bool,
    pub hash_fraction: f64,
    pub neighbors: Vec<PeerId>,
    pub mempool: Mempool,
    pub tree: BlockTree,
    /// Cached balance at the current longest-chain tip, updated whenever
    /// the tip changes and optimistically at transaction generation time.
    pub balance: i64,
    pub is_mining: bool,
    miner: Miner,
    rho_out: HashMap<PeerId, f64>,
    rng: Pcg32,
}

impl Peer {
    pub fn new(
        id: PeerId,
        is_slow: bool,
        hash_fraction: f64,
        neighbors: Vec<PeerId>,
        tk: f64,
        seed: u64,
    ) -> Peer {
        Peer {
            id,
            is_slow,
            hash_fraction,
            neighbors,
            mempool: Mempool::new(),
            tree: BlockTree::new(),
            balance: sim_chain::DEFAULT_BALANCE,
            is_mining: false,
            miner: Miner::new(id, hash_fraction, tk, seed),
            rho_out: HashMap::new(),
            rng: Pcg32::seed_from_u64(seed.wrapping_add(0x9E37_79B9_7F4A_7C15)),
        }
    }

    /// The propagation latency term rho from this peer to `other`, sampled
    /// once on first use and cached for the rest of the run.
    pub fn rho_to(&mut self, other: PeerId) -> f64 {
        *self
            .rho_out
            .entry(other)
            .or_insert_with(|| sample_rho(&mut self.rng))
    }

    /// Create and broadcast a new transaction, unless this peer's cached
    /// balance is below 1 (a peer with zero balance generates no transaction).
    pub fn generate_tx(&mut self, receiver: PeerId, now: SimTime, id_gen: &mut IdGen) -> Option<Transaction> {
        if self.balance < 1 {
            return None;
        }
        let amount = self.rng.gen_range(1..=self.balance as u64);
        let tx = Transaction::new(id_gen.next_tx_id(), self.id, receiver, amount, now);
        self.mempool.insert(tx.clone());
        Some(tx)
    }

    /// Assemble a candidate block's transaction list from the global
    /// universe pool, starting from the balances at this peer's current
    /// longest-chain tip.
    pub fn find_valid_txs(&self, utx: &mut UniversePool, candidate_timestamp: SimTime) -> Vec<Transaction> {
        let tip_balances = self.tree.balances[&self.tree.tip_id()].clone();
        utx.select_block_txs(&tip_balances, candidate_timestamp)
    }

    /// Sample the delay until this peer's next mining attempt completes,
    /// marking it as currently mining.
    pub fn next_mining_delay(&mut self) -> SimTime {
        self.is_mining = true;
        self.miner.next_mining_delay()
    }

    pub fn record_block_mined(&mut self) {
        self.miner.record_block_mined();
    }

    pub fn blocks_mined(&self) -> u64 {
        self.miner.blocks_mined()
    }

    /// Recompute the cached balance from the current longest-chain tip.
    pub fn refresh_balance(&mut self) {
        let tip = self.tree.tip_id();
        self.balance = *self
            .tree
            .balances
            .get(&tip)
            .and_then(|bal| bal.get(&self.id))
            .unwrap_or(&sim_chain::DEFAULT_BALANCE);
    }

    pub fn get_status(&self) -> BTreeMap<String, String> {
        let mut status = BTreeMap::new();
        status.insert("id".to_string(), self.id.to_string());
        status.insert("is_slow".to_string(), self.is_slow.to_string());
        status.insert("hash_fraction".to_string(), self.hash_fraction.to_string());
        status.insert("balance".to_string(), self.balance.to_string());
        status.insert(
            "chain_length".to_string(),
            self.tree.longest_chain.len().to_string(),
        );
        status.insert("blocks_mined".to_string(), self.blocks_mined().to_string());
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_peer_with_no_balance_generates_no_transaction() {
        let mut peer = Peer::new(0, false, 1.0, vec![1, 2], 10.0, 1);
        peer.balance = 0;
        let mut id_gen = IdGen::new();
        assert!(peer.generate_tx(1, 0.0, &mut id_gen).is_none());
    }

    #[test]
    fn rho_to_a_given_neighbor_is_stable_across_calls() {
        let mut peer = Peer::new(0, false, 1.0, vec![1], 10.0, 1);
        let first = peer.rho_to(1);
        let second = peer.rho_to(1);
        assert_eq!(first, second);
    }

    #[test]
    fn refresh_balance_reads_the_cached_tip_snapshot() {
        let mut peer = Peer::new(0, false, 1.0, vec![], 10.0, 1);
        let block = sim_chain::Block::new(1, sim_chain::GENESIS_ID, 0, 10.0, vec![]);
        peer.tree.add_block(block, 10.0);
        peer.refresh_balance();
        assert_eq!(peer.balance, sim_chain::DEFAULT_BALANCE + sim_chain::COINBASE_REWARD);
    }
}

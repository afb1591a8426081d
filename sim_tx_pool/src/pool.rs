// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// This file contains the definition of the transaction pools.
// `Mempool` is a peer-local pool of transactions not yet confirmed on that
// peer's longest chain. `UniversePool` is the shared `UTX` pool of every
// transaction ever observed, from which honest miners assemble candidate
// blocks.
use serde::{Deserialize, Serialize};
use sim_chain::{PeerId, Transaction, TxId, MAX_TX_PER_BLOCK};
use std::collections::{HashMap, HashSet, VecDeque};

/// A peer-local, insertion-ordered, id-deduplicated set of transactions.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Mempool {
    order: Vec<TxId>,
    by_id: HashMap<TxId, Transaction>,
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool {
            order: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Insert a transaction if its id is not already present. Returns true
    /// if it was newly inserted.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        if self.by_id.contains_key(&tx.id) {
            return false;
        }
        self.order.push(tx.id);
        self.by_id.insert(tx.id, tx);
        true
    }

    pub fn contains(&self, id: TxId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.order.iter().map(move |id| &self.by_id[id])
    }
}

/// The global `UTX` pool: every transaction observed anywhere in the
/// network that has not yet been consumed by a block on some peer's
/// longest chain.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UniversePool {
    order: VecDeque<TxId>,
    by_id: HashMap<TxId, Transaction>,
}

impl UniversePool {
    pub fn new() -> UniversePool {
        UniversePool {
            order: VecDeque::new(),
            by_id: HashMap::new(),
        }
    }

    /// Insert a transaction if its id is not already present. Returns true
    /// if it was newly inserted.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        if self.by_id.contains_key(&tx.id) {
            return false;
        }
        self.order.push_back(tx.id);
        self.by_id.insert(tx.id, tx);
        true
    }

    /// Return a transaction that a miner failed to commit (e.g. a stale
    /// candidate, or a block that did not validate) back to the pool, at
    /// the back of the insertion order.
    pub fn return_txs(&mut self, txs: Vec<Transaction>) {
        if !txs.is_empty() {
            log::debug!("returning {} unconsumed tx(s) to the universe pool", txs.len());
        }
        for tx in txs {
            self.insert(tx);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Select transactions to include in a candidate block with the given
    /// timestamp, starting from `tip_balances` (the balance snapshot at the
    /// current longest-chain tip). Transactions are considered in insertion
    /// order; a transaction is accepted iff applying it keeps both the
    /// sender's and receiver's balance non-negative (defaulting a
    /// newly-seen peer to `DEFAULT_BALANCE`) and its creation timestamp is
    /// not after `candidate_timestamp`. Selection stops once
    /// `MAX_TX_PER_BLOCK` transactions have been accepted. Accepted
    /// transactions are removed from the pool.
    pub fn select_block_txs(
        &mut self,
        tip_balances: &HashMap<PeerId, i64>,
        candidate_timestamp: sim_chain::SimTime,
    ) -> Vec<Transaction> {
        let mut bal = tip_balances.clone();
        let mut accepted_ids: HashSet<TxId> = HashSet::new();
        let mut accepted = Vec::new();

        for id in self.order.iter() {
            if accepted.len() == MAX_TX_PER_BLOCK {
                break;
            }
            let tx = &self.by_id[id];
            if tx.created_at > candidate_timestamp {
                continue;
            }
            bal.entry(tx.sender).or_insert(sim_chain::DEFAULT_BALANCE);
            bal.entry(tx.receiver)
                .or_insert(sim_chain::DEFAULT_BALANCE);
            let sender_bal = bal[&tx.sender] - tx.amount as i64;
            let receiver_bal = bal[&tx.receiver] + tx.amount as i64;
            if sender_bal < 0 || receiver_bal < 0 {
                // Undo the default-balance insert attempt; the transaction is
                // simply skipped, not consumed.
                log::trace!("skipping tx {} from block selection: would go negative", id);
                continue;
            }
            *bal.get_mut(&tx.sender).unwrap() = sender_bal;
            *bal.get_mut(&tx.receiver).unwrap() = receiver_bal;
            accepted_ids.insert(*id);
            accepted.push(tx.clone());
        }

        self.order.retain(|id| !accepted_ids.contains(id));
        for id in &accepted_ids {
            self.by_id.remove(id);
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_tx(
        id: TxId,
        sender: PeerId,
        receiver: PeerId,
        amount: u64,
        created_at: sim_chain::SimTime,
    ) -> Transaction {
        Transaction::new(id, sender, receiver, amount, created_at)
    }

    #[test]
    fn mempool_deduplicates_by_id() {
        let mut pool = Mempool::new();
        assert!(pool.insert(mk_tx(1, 0, 1, 5, 0.0)));
        assert!(!pool.insert(mk_tx(1, 0, 1, 5, 0.0)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn select_block_txs_skips_transactions_from_the_future() {
        let mut utx = UniversePool::new();
        utx.insert(mk_tx(1, 0, 1, 5, 100.0));
        let mut balances = HashMap::new();
        balances.insert(0usize, 1000i64);
        let picked = utx.select_block_txs(&balances, 50.0);
        assert!(picked.is_empty());
        assert_eq!(utx.len(), 1);
    }

    #[test]
    fn select_block_txs_preserves_sub_second_ordering() {
        // Both timestamps truncate to the same integer second; only the
        // fractional part tells the transaction was created after the
        // candidate block, and it must still be excluded.
        let mut utx = UniversePool::new();
        utx.insert(mk_tx(1, 0, 1, 5, 10.7));
        let mut balances = HashMap::new();
        balances.insert(0usize, 1000i64);
        let picked = utx.select_block_txs(&balances, 10.3);
        assert!(picked.is_empty());
        assert_eq!(utx.len(), 1);
    }

    #[test]
    fn select_block_txs_rejects_overspend_but_keeps_the_tx_available() {
        let mut utx = UniversePool::new();
        utx.insert(mk_tx(1, 0, 1, 500, 0.0));
        let mut balances = HashMap::new();
        balances.insert(0usize, 10i64);
        let picked = utx.select_block_txs(&balances, 10.0);
        assert!(picked.is_empty());
        assert_eq!(utx.len(), 1);
    }

    #[test]
    fn select_block_txs_caps_at_max_tx_per_block() {
        let mut utx = UniversePool::new();
        for i in 0..(MAX_TX_PER_BLOCK + 5) as u64 {
            utx.insert(mk_tx(i + 1, 0, 1, 0, 0.0));
        }
        let balances = HashMap::new();
        let picked = utx.select_block_txs(&balances, 0.0);
        assert_eq!(picked.len(), MAX_TX_PER_BLOCK);
        assert_eq!(utx.len(), 5);
    }

    #[test]
    fn return_txs_makes_them_selectable_again() {
        let mut utx = UniversePool::new();
        let tx = mk_tx(1, 0, 1, 5, 0.0);
        utx.insert(tx.clone());
        let balances = HashMap::new();
        let picked = utx.select_block_txs(&balances, 0.0);
        assert_eq!(picked.len(), 1);
        assert!(utx.is_empty());
        utx.return_txs(picked);
        assert_eq!(utx.len(), 1);
    }
}

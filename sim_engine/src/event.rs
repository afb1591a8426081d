// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// The closed set of event kinds that drive the simulation. Represented as
// one tagged variant per kind (spec design note: "represent events as a
// tagged sum ... pattern-match in the main dispatch") rather than a
// heterogeneous payload list.
use sim_chain::{Block, BlockId, PeerId, Transaction};

#[derive(Debug, Clone)]
pub enum Event {
    /// A peer creates and broadcasts a new transaction, then reschedules
    /// its own next generation.
    TxGen { peer: PeerId },
    /// A peer receives a transaction forwarded by a neighbor.
    TxRecv { peer: PeerId, tx: Transaction },
    /// One-shot initial seed: a peer begins its first mining attempt.
    MineStart { peer: PeerId },
    /// A peer forwards a freshly accepted block to its neighbors.
    BlkBroadcast { peer: PeerId, block_id: BlockId },
    /// An honest peer's proof-of-work attempt completes.
    MineDoneHonest { peer: PeerId, candidate: Block },
    /// A peer receives a block from a neighbor.
    BlkRecv { peer: PeerId, block: Block },
    /// An adversary's proof-of-work attempt completes.
    MineDoneAdversary { peer: PeerId, candidate: Block },
}

impl Event {
    /// Whether this event belongs to the drain phase the simulator keeps
    /// processing after the quota is reached (pending block propagation).
    pub fn is_drainable(&self) -> bool {
        matches!(self, Event::BlkBroadcast { .. } | Event::BlkRecv { .. })
    }
}

// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// The selfish-mining adversary: a `Peer` specialization that holds a
// private suffix of mined-but-unreleased blocks and decides, on every
// public-chain advance, how much of that suffix (if any) to reveal.
use crate::peer::Peer;
use sim_chain::{Block, BlockId, GENESIS_ID};

pub struct Adversary {
    pub peer: Peer,
    /// Blocks this adversary has mined but not yet broadcast, oldest first,
    /// each chained to the previous (or to `private_anchor` for the first).
    pub private_suffix: Vec<Block>,
    /// The public block this adversary's private branch extends from.
    pub private_anchor: BlockId,
    /// "State 0'": entered when the adversary last revealed and tied the
    /// public chain at lead 0.
    pub state0: bool,
}

/// What the adversary decided to do in response to a public-chain advance.
pub enum Release {
    /// Nothing released; the race continues.
    None,
    /// Release these blocks, in order, onto the public chain.
    Blocks(Vec<Block>),
}

/// What happened to a block the adversary just finished mining itself.
pub enum MinedOutcome {
    /// Released immediately (the state-0' -> 0 transition).
    Released(Block),
    /// Joined the private suffix; still withheld.
    Appended,
    /// Neither: its parent was neither the anchor nor the suffix tip (a
    /// stale candidate left over from an abandoned race), so it is
    /// discarded rather than chained.
    Dropped,
}

impl Adversary {
    pub fn new(peer: Peer) -> Adversary {
        Adversary {
            peer,
            private_suffix: Vec::new(),
            private_anchor: GENESIS_ID,
            state0: false,
        }
    }

    /// The parent of this adversary's next mining attempt: the tip of its
    /// private suffix if it holds one, else the public anchor.
    pub fn mining_parent(&self) -> BlockId {
        self.private_suffix
            .last()
            .map(|b| b.id)
            .unwrap_or(self.private_anchor)
    }

    /// `lead = depth(private_anchor) + |private_suffix| - depth(public_tip)`.
    pub fn lead(&self) -> i64 {
        let anchor_depth = self.peer.tree.depth_of(self.private_anchor).unwrap_or(1) as i64;
        let public_depth = self.peer.tree.depth_of(self.peer.tree.tip_id()).unwrap_or(1) as i64;
        anchor_depth + self.private_suffix.len() as i64 - public_depth
    }

    /// React to this adversary's own mining attempt completing. A block
    /// only ever joins the private suffix if it actually extends it (or
    /// extends the anchor, starting a fresh suffix); a candidate whose
    /// parent is neither is stale (left over from a race the adversary has
    /// since abandoned) and is dropped rather than chained in, since
    /// chaining it in would break the suffix's parent-linkage invariant.
    pub fn on_own_block_mined(&mut self, block: Block) -> MinedOutcome {
        if self.state0 && block.parent == Some(self.private_anchor) {
            self.private_anchor = block.id;
            self.state0 = false;
            MinedOutcome::Released(block)
        } else if !self.private_suffix.is_empty() || block.parent == Some(self.private_anchor) {
            self.private_suffix.push(block);
            MinedOutcome::Appended
        } else {
            log::debug!(
                "adversary {} dropped a stale private block (parent {:?} is neither the anchor {} nor the suffix tip)",
                self.peer.id,
                block.parent,
                self.private_anchor
            );
            MinedOutcome::Dropped
        }
    }

    /// React to the public longest chain having just advanced (called only
    /// after the caller confirms the tip actually changed). Computes the
    /// lead and decides how much of the private suffix, if any, to reveal.
    pub fn on_public_chain_advanced(&mut self) -> Release {
        let lead = self.lead();
        if lead >= 2 {
            let released = self.private_suffix.remove(0);
            self.private_anchor = released.id;
            Release::Blocks(vec![released])
        } else if lead == 1 {
            let released = std::mem::take(&mut self.private_suffix);
            if let Some(last) = released.last() {
                self.private_anchor = last.id;
            }
            Release::Blocks(released)
        } else if lead == 0 {
            let released = std::mem::take(&mut self.private_suffix);
            if let Some(last) = released.last() {
                self.private_anchor = last.id;
            }
            self.state0 = true;
            Release::Blocks(released)
        } else {
            self.private_suffix.clear();
            self.state0 = false;
            self.private_anchor = self.peer.tree.tip_id();
            Release::None
        }
    }
}

// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// Wires the event kernel to the peer/adversary state machines and drives
// the main loop: pop the earliest event, dispatch it to the owning peer,
// let the peer mutate its local state and emit new events, repeat until
// the block-creation quota is reached, then drain pending block
// propagation.
use crate::adversary::{Adversary, MinedOutcome, Release};
use crate::config::{build_peer_specs, Mode, SimConfig};
use crate::event::Event;
use crate::peer::Peer;
use crate::scheduler::Scheduler;
use rand::SeedableRng;
use rand::{Rng, RngCore};
use rand_pcg::Pcg32;
use sim_chain::{Block, BlockId, BlockTree, IdGen, PeerId, SimTime};
use sim_network::{message_delay, BLOCK_MESSAGE_BITS, TX_MESSAGE_BITS};
use sim_tx_pool::UniversePool;

/// A peer slot is either an honest `Peer` or a selfish-mining `Adversary`
/// wrapping one.
pub enum Role {
    Honest(Peer),
    Adversary(Adversary),
}

impl Role {
    pub fn peer(&self) -> &Peer {
        match self {
            Role::Honest(p) => p,
            Role::Adversary(a) => &a.peer,
        }
    }

    pub fn peer_mut(&mut self) -> &mut Peer {
        match self {
            Role::Honest(p) => p,
            Role::Adversary(a) => &mut a.peer,
        }
    }

    pub fn is_adversary(&self) -> bool {
        matches!(self, Role::Adversary(_))
    }
}

pub struct Simulator {
    pub config: SimConfig,
    pub roles: Vec<Role>,
    scheduler: Scheduler,
    utx: UniversePool,
    id_gen: IdGen,
    rng: Pcg32,
    honest_blocks_created: usize,
    draining: bool,
}

/// A fixed offset so the simulator-global RNG stream never collides with
/// any per-peer seed derived from the same `--seed` argument.
const GLOBAL_RNG_OFFSET: u64 = 0xD1B5_4A32_D192_ED03;

impl Simulator {
    pub fn new(config: SimConfig, neighbors: Vec<Vec<PeerId>>) -> Simulator {
        let mut setup_rng = Pcg32::seed_from_u64(config.seed);
        let specs = build_peer_specs(&config, &mut setup_rng);
        let is_selfish = matches!(config.mode, Mode::Selfish { .. });

        let roles: Vec<Role> = specs
            .into_iter()
            .zip(neighbors)
            .enumerate()
            .map(|(id, (spec, nbrs))| {
                let peer = Peer::new(
                    id,
                    spec.is_slow,
                    spec.hash_fraction,
                    nbrs,
                    config.tk,
                    config.seed.wrapping_add(id as u64),
                );
                if is_selfish && (id == 0 || id == 1) {
                    Role::Adversary(Adversary::new(peer))
                } else {
                    Role::Honest(peer)
                }
            })
            .collect();

        let mut sim = Simulator {
            rng: Pcg32::seed_from_u64(config.seed.wrapping_add(GLOBAL_RNG_OFFSET)),
            config,
            roles,
            scheduler: Scheduler::new(),
            utx: UniversePool::new(),
            id_gen: IdGen::new(),
            honest_blocks_created: 0,
            draining: false,
        };
        sim.seed();
        sim
    }

    fn seed(&mut self) {
        let n = self.roles.len();
        if self.config.ttx.is_some() {
            for i in 0..n {
                self.scheduler.push(Event::TxGen { peer: i }, 0.0);
            }
        }
        for i in 0..n {
            match &mut self.roles[i] {
                Role::Honest(_) => self.scheduler.push(Event::MineStart { peer: i }, 0.0),
                Role::Adversary(adv) => {
                    let parent = adv.mining_parent();
                    let candidate = Block::new(self.id_gen.next_block_id(), parent, i, 0.0, Vec::new());
                    let delay = adv.peer.next_mining_delay();
                    self.scheduler
                        .push(Event::MineDoneAdversary { peer: i, candidate }, delay);
                }
            }
        }
    }

    /// Run until the block-creation quota is reached and every pending
    /// propagation event has drained.
    pub fn run(&mut self) {
        loop {
            let (time, event) = match self.scheduler.pop() {
                Some(x) => x,
                None => break,
            };
            log::trace!("t={:.6} dispatching {:?}", time, event);
            if self.draining {
                if event.is_drainable() {
                    self.handle_event(event);
                }
                continue;
            }
            let is_honest_creation = matches!(event, Event::MineDoneHonest { .. });
            self.handle_event(event);
            if is_honest_creation {
                self.honest_blocks_created += 1;
                if self.honest_blocks_created >= self.config.blocks {
                    log::info!(
                        "block-creation quota ({}) reached, draining pending propagation",
                        self.config.blocks
                    );
                    self.draining = true;
                }
            }
        }
    }

    pub fn block_tree(&self, peer: PeerId) -> &BlockTree {
        &self.roles[peer].peer().tree
    }

    pub fn is_adversary(&self, peer: PeerId) -> bool {
        self.roles[peer].is_adversary()
    }

    fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    fn link_delay(&mut self, sender: PeerId, receiver: PeerId, size_bits: f64) -> SimTime {
        let sender_is_fast = !self.roles[sender].peer().is_slow;
        let receiver_is_fast = !self.roles[receiver].peer().is_slow;
        let rho = self.roles[sender].peer_mut().rho_to(receiver);
        message_delay(rho, size_bits, sender_is_fast, receiver_is_fast, &mut self.rng)
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::TxGen { peer } => self.on_tx_gen(peer),
            Event::TxRecv { peer, tx } => self.on_tx_recv(peer, tx),
            Event::MineStart { peer } => self.on_mine_start(peer),
            Event::BlkBroadcast { peer, block_id } => self.on_blk_broadcast(peer, block_id),
            Event::MineDoneHonest { peer, candidate } => self.on_mine_done_honest(peer, candidate),
            Event::BlkRecv { peer, block } => self.on_blk_recv(peer, block),
            Event::MineDoneAdversary { peer, candidate } => self.on_mine_done_adversary(peer, candidate),
        }
    }

    fn on_tx_gen(&mut self, peer: PeerId) {
        let now = self.now();
        let n = self.roles.len();
        let receiver = loop {
            let r = self.rng.gen_range(0..n);
            if r != peer {
                break r;
            }
        };
        let tx = self.roles[peer].peer_mut().generate_tx(receiver, now, &mut self.id_gen);
        if let Some(tx) = tx {
            log::debug!("peer {} generated tx {}", peer, tx.id);
            self.utx.insert(tx.clone());
            self.gossip_tx(peer, tx);
        }
        if let Some(ttx) = self.config.ttx {
            let delay = sample_exp(&mut self.rng, ttx);
            self.scheduler.push(Event::TxGen { peer }, now + delay);
        }
    }

    fn gossip_tx(&mut self, sender: PeerId, tx: sim_chain::Transaction) {
        let now = self.now();
        let neighbors = self.roles[sender].peer().neighbors.clone();
        for nbr in neighbors {
            if self.roles[nbr].peer().mempool.contains(tx.id) {
                continue;
            }
            let delay = self.link_delay(sender, nbr, TX_MESSAGE_BITS);
            self.scheduler
                .push(Event::TxRecv { peer: nbr, tx: tx.clone() }, now + delay);
        }
    }

    fn on_tx_recv(&mut self, peer: PeerId, tx: sim_chain::Transaction) {
        let inserted = self.roles[peer].peer_mut().mempool.insert(tx.clone());
        if inserted {
            self.utx.insert(tx.clone());
            self.gossip_tx(peer, tx);
        }
    }

    fn on_mine_start(&mut self, peer: PeerId) {
        let now = self.now();
        let parent = self.roles[peer].peer().tree.tip_id();
        let candidate = self.build_candidate(peer, parent, now);
        let delay = self.roles[peer].peer_mut().next_mining_delay();
        self.scheduler
            .push(Event::MineDoneHonest { peer, candidate }, now + delay);
    }

    fn build_candidate(&mut self, peer: PeerId, parent: BlockId, now: SimTime) -> Block {
        let txs = self.roles[peer]
            .peer()
            .find_valid_txs(&mut self.utx, now);
        Block::new(self.id_gen.next_block_id(), parent, peer, now, txs)
    }

    fn on_mine_done_honest(&mut self, peer: PeerId, candidate: Block) {
        let now = self.now();
        let tip = self.roles[peer].peer().tree.tip_id();
        if candidate.parent != Some(tip) {
            log::debug!("peer {}'s candidate went stale, restarting mining", peer);
            let txs = candidate.txs;
            self.utx.return_txs(txs);
            self.restart_honest_mining(peer, now);
            return;
        }
        let validation = self.roles[peer].peer().tree.validate(&candidate);
        if validation != sim_chain::ValidationOutcome::Valid {
            log::debug!("peer {}'s candidate failed validation, restarting mining", peer);
            let txs = candidate.txs;
            self.utx.return_txs(txs);
            self.restart_honest_mining(peer, now);
            return;
        }

        let block_id = candidate.id;
        let old_tip = tip;
        self.roles[peer].peer_mut().tree.add_block(candidate, now);
        self.roles[peer].peer_mut().refresh_balance();
        self.roles[peer].peer_mut().record_block_mined();
        let new_tip = self.roles[peer].peer().tree.tip_id();
        if new_tip == block_id && new_tip != old_tip {
            log::info!("peer {} mined block {}, extending its longest chain", peer, block_id);
        } else {
            log::debug!(
                "peer {} mined block {} but it did not become the tip (fork)",
                peer,
                block_id
            );
        }
        self.scheduler
            .push(Event::BlkBroadcast { peer, block_id }, now);
        self.restart_honest_mining(peer, now);
    }

    fn restart_honest_mining(&mut self, peer: PeerId, now: SimTime) {
        let parent = self.roles[peer].peer().tree.tip_id();
        let candidate = self.build_candidate(peer, parent, now);
        let delay = self.roles[peer].peer_mut().next_mining_delay();
        self.scheduler
            .push(Event::MineDoneHonest { peer, candidate }, now + delay);
    }

    fn on_blk_broadcast(&mut self, peer: PeerId, block_id: BlockId) {
        let now = self.now();
        let block = self.roles[peer].peer().tree.blocks[&block_id].clone();
        let neighbors = self.roles[peer].peer().neighbors.clone();
        for nbr in neighbors {
            if self.roles[nbr].peer().tree.contains(block_id) {
                continue;
            }
            let delay = self.link_delay(peer, nbr, BLOCK_MESSAGE_BITS);
            self.scheduler.push(
                Event::BlkRecv { peer: nbr, block: block.clone() },
                now + delay,
            );
        }
    }

    fn on_blk_recv(&mut self, peer: PeerId, block: Block) {
        let now = self.now();
        if self.roles[peer].peer().tree.contains(block.id) {
            log::debug!("peer {} already has block {}, dropping duplicate", peer, block.id);
            return;
        }
        let validation = self.roles[peer].peer().tree.validate(&block);
        if validation != sim_chain::ValidationOutcome::Valid {
            log::debug!("peer {} rejected block {}: {:?}", peer, block.id, validation);
            return;
        }

        let block_id = block.id;
        let old_tip = self.roles[peer].peer().tree.tip_id();
        self.roles[peer].peer_mut().tree.add_block(block, now);
        self.roles[peer].peer_mut().refresh_balance();
        let new_tip = self.roles[peer].peer().tree.tip_id();
        let tip_changed = new_tip != old_tip;
        if tip_changed {
            log::info!("peer {}'s longest chain advanced to block {}", peer, new_tip);
        } else {
            log::debug!("block {} joined peer {}'s tree without changing the tip (fork)", block_id, peer);
        }

        if self.roles[peer].is_adversary() {
            if tip_changed {
                self.on_adversary_public_advance(peer, now);
            }
            return;
        }

        self.scheduler.push(Event::BlkBroadcast { peer, block_id }, now);
        if !self.roles[peer].peer().is_mining {
            self.restart_honest_mining(peer, now);
        }
    }

    fn on_adversary_public_advance(&mut self, peer: PeerId, now: SimTime) {
        let release = match &mut self.roles[peer] {
            Role::Adversary(adv) => adv.on_public_chain_advanced(),
            Role::Honest(_) => unreachable!("called only for adversary roles"),
        };
        if let Release::Blocks(blocks) = release {
            for block in blocks {
                self.release_adversary_block(peer, block, now);
            }
        }
    }

    fn release_adversary_block(&mut self, peer: PeerId, block: Block, now: SimTime) {
        let block_id = block.id;
        self.roles[peer].peer_mut().tree.add_block(block, now);
        self.roles[peer].peer_mut().refresh_balance();
        log::info!("adversary {} released private block {}", peer, block_id);
        self.scheduler.push(Event::BlkBroadcast { peer, block_id }, now);
    }

    fn on_mine_done_adversary(&mut self, peer: PeerId, candidate: Block) {
        let now = self.now();
        let outcome = match &mut self.roles[peer] {
            Role::Adversary(adv) => adv.on_own_block_mined(candidate),
            Role::Honest(_) => unreachable!("MineDoneAdversary only targets adversary roles"),
        };
        match outcome {
            MinedOutcome::Released(block) => {
                self.release_adversary_block(peer, block, now);
                self.roles[peer].peer_mut().record_block_mined();
            }
            MinedOutcome::Appended => {
                self.roles[peer].peer_mut().record_block_mined();
            }
            MinedOutcome::Dropped => {}
        }

        let parent = match &self.roles[peer] {
            Role::Adversary(adv) => adv.mining_parent(),
            Role::Honest(_) => unreachable!("MineDoneAdversary only targets adversary roles"),
        };
        let next_candidate = Block::new(self.id_gen.next_block_id(), parent, peer, now, Vec::new());
        let delay = self.roles[peer].peer_mut().next_mining_delay();
        self.scheduler
            .push(Event::MineDoneAdversary { peer, candidate: next_candidate }, now + delay);
    }
}

/// Sample an exponential delay with the given mean using `rng`.
fn sample_exp(rng: &mut impl RngCore, mean: f64) -> SimTime {
    use rand_distr::{Distribution, Exp};
    Exp::new(1.0 / mean).expect("mean must be positive").sample(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_chain::GENESIS_ID;

    fn two_peer_honest_config(blocks: usize) -> SimConfig {
        SimConfig {
            n: 2,
            ttx: None,
            tk: 10.0,
            blocks,
            seed: 1,
            mode: Mode::Honest { z0: 0.0, z1: 0.0 },
        }
    }

    #[test]
    fn s1_two_fast_peers_no_transactions_one_block() {
        let config = two_peer_honest_config(1);
        let neighbors = vec![vec![1], vec![0]];
        let mut sim = Simulator::new(config, neighbors);
        sim.run();

        let tree0 = sim.block_tree(0);
        let tree1 = sim.block_tree(1);
        let non_genesis0: Vec<_> = tree0.blocks.keys().filter(|&&id| id != GENESIS_ID).collect();
        assert_eq!(non_genesis0.len(), 1);
        assert_eq!(tree0.tip_id(), tree1.tip_id());

        let miner_block = *non_genesis0[0];
        let miner = tree0.blocks[&miner_block].miner.unwrap();
        let bal = &tree0.balances[&miner_block];
        assert_eq!(bal[&miner], sim_chain::DEFAULT_BALANCE + sim_chain::COINBASE_REWARD);
        let other = 1 - miner;
        assert_eq!(bal[&other], sim_chain::DEFAULT_BALANCE);
    }

    #[test]
    fn balances_never_go_negative_after_a_short_honest_run() {
        let config = SimConfig {
            n: 6,
            ttx: Some(2.0),
            tk: 3.0,
            blocks: 8,
            seed: 42,
            mode: Mode::Honest { z0: 20.0, z1: 20.0 },
        };
        let mut rng = Pcg32::seed_from_u64(config.seed);
        let neighbors = sim_network::build_overlay(config.n, &mut rng);
        let mut sim = Simulator::new(config, neighbors);
        sim.run();

        for peer in 0..sim.roles.len() {
            let tree = sim.block_tree(peer);
            for bal in tree.balances.values() {
                for &amount in bal.values() {
                    assert!(amount >= 0);
                }
            }
        }
    }

    #[test]
    fn a_selfish_mining_run_does_not_panic_and_produces_blocks() {
        let config = SimConfig {
            n: 6,
            ttx: Some(5.0),
            tk: 3.0,
            blocks: 6,
            seed: 7,
            mode: Mode::Selfish { c1: 30.0, c2: 10.0 },
        };
        let mut rng = Pcg32::seed_from_u64(config.seed);
        let neighbors = sim_network::build_overlay(config.n, &mut rng);
        let mut sim = Simulator::new(config, neighbors);
        sim.run();

        let non_genesis: Vec<_> = sim
            .block_tree(2)
            .blocks
            .keys()
            .filter(|&&id| id != GENESIS_ID)
            .collect();
        assert!(!non_genesis.is_empty());
    }

    #[test]
    fn the_same_seed_produces_a_deterministic_number_of_blocks_mined() {
        let run = || {
            let config = two_peer_honest_config(3);
            let neighbors = vec![vec![1], vec![0]];
            let mut sim = Simulator::new(config, neighbors);
            sim.run();
            sim.block_tree(0).blocks.len()
        };
        assert_eq!(run(), run());
    }
}

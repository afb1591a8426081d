// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// Output writers. The ASCII tree dump is a direct port of
// `Assignment-1/Tree.py`'s `PrintTree`: a preorder walk carrying a stack of
// "is this ancestor the last child of its parent" flags, which is all the
// state the `+- `/`|  ` marker-string prefix needs at each level.
use sim_chain::{BlockId, BlockTree, GENESIS_ID};
use sim_engine::{Mode, Simulator};

const MARKER: &str = "+- ";

pub fn render_tree(tree: &BlockTree) -> String {
    let mut out = String::new();
    let mut stack: Vec<(BlockId, Vec<bool>)> = vec![(GENESIS_ID, Vec::new())];
    while let Some((id, levels)) = stack.pop() {
        write_block(&mut out, tree, id, &levels);
        if let Some(children) = tree.children.get(&id) {
            for (i, &child) in children.iter().enumerate().rev() {
                let is_last = i == children.len() - 1;
                let mut child_levels = levels.clone();
                child_levels.push(!is_last);
                stack.push((child, child_levels));
            }
        }
    }
    out
}

fn write_block(out: &mut String, tree: &BlockTree, id: BlockId, levels: &[bool]) {
    let empty = " ".repeat(MARKER.len());
    let connection = format!("|{}", &empty[1..]);
    let mut prefix = String::new();
    if let Some((_, ancestors)) = levels.split_last() {
        for &draw in ancestors {
            prefix.push_str(if draw { &connection } else { &empty });
        }
    }
    if !levels.is_empty() {
        prefix.push_str(MARKER);
    }

    out.push_str(&format!("{}Block ID: {}\n", prefix, id));
    let block = &tree.blocks[&id];
    match block.miner {
        Some(miner) => out.push_str(&format!("{}|__ Miner: peer {}\n", prefix, miner)),
        None => out.push_str(&format!("{}|__ Miner: Genesis Block\n", prefix)),
    }
    out.push_str(&format!("{}|__ Size: {}KB\n", prefix, block.txs.len() + 1));
}

pub fn render_summary(sim: &Simulator) -> String {
    let mut out = String::new();
    let mode_name = match sim.config.mode {
        Mode::Honest { .. } => "honest",
        Mode::Selfish { .. } => "selfish",
    };
    out.push_str(&format!("mode: {}\n", mode_name));
    out.push_str(&format!("peers: {}\n", sim.roles.len()));
    out.push_str(&format!("seed: {}\n", sim.config.seed));
    out.push_str(&format!("block quota: {}\n\n", sim.config.blocks));

    for (id, role) in sim.roles.iter().enumerate() {
        let peer = role.peer();
        out.push_str(&format!(
            "peer {}: slow_link={} hash_fraction={:.4} chain_length={} longest_chain_length={} blocks_mined={}\n",
            id,
            peer.is_slow,
            peer.hash_fraction,
            peer.tree.blocks.len(),
            peer.tree.longest_chain.len(),
            peer.blocks_mined(),
        ));
    }

    if matches!(sim.config.mode, Mode::Selfish { .. }) {
        out.push_str("\nadversary mining-power utilization:\n");
        for adv_id in 0..sim.roles.len().min(2) {
            if !sim.roles[adv_id].is_adversary() {
                continue;
            }
            let peer = sim.roles[adv_id].peer();
            let on_chain = peer
                .tree
                .longest_chain
                .iter()
                .filter(|&&id| peer.tree.blocks[&id].miner == Some(adv_id))
                .count();
            out.push_str(&format!(
                "adversary {}: blocks_mined={} blocks_on_own_longest_chain={}\n",
                adv_id,
                peer.blocks_mined(),
                on_chain
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_chain::Block;

    #[test]
    fn a_single_child_tree_renders_two_blocks() {
        let mut tree = BlockTree::new();
        tree.add_block(Block::new(1, GENESIS_ID, 0, 10.0, vec![]), 10.0);
        let text = render_tree(&tree);
        assert!(text.contains("Block ID: 0"));
        assert!(text.contains("Miner: Genesis Block"));
        assert!(text.contains("Block ID: 1"));
        assert!(text.contains("Miner: peer 0"));
        assert!(text.contains("Size: 1KB"));
    }

    #[test]
    fn a_fork_marks_the_non_last_sibling_with_a_connector() {
        let mut tree = BlockTree::new();
        tree.add_block(Block::new(1, GENESIS_ID, 0, 10.0, vec![]), 10.0);
        tree.add_block(Block::new(2, GENESIS_ID, 1, 10.0, vec![]), 11.0);
        let text = render_tree(&tree);
        assert!(text.contains("|  Block ID: 1") || text.contains("+- Block ID: 1"));
        assert!(text.contains("Block ID: 2"));
    }
}

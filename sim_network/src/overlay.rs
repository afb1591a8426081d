// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// The overlay graph builder: generates a random connected undirected graph
// over `n` peers where every peer has degree 3-6. Ported from the
// configuration-model approach of the original assignment's network
// generator: draw a target degree per node, greedily pair down a shrinking
// candidate list, and restart from scratch whenever a node runs out of
// distinct candidates or the resulting graph is not connected.
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Build a random connected overlay graph over peers `0..n`, returned as an
/// adjacency list (sorted, deduplicated neighbor ids per peer). Every peer's
/// degree is drawn uniformly from 3-6, clamped to `n - 1` so the generator
/// terminates even for small `n` (a network of 2 peers cannot give either of
/// them 3 distinct neighbors).
pub fn build_overlay(n: usize, rng: &mut impl Rng) -> Vec<Vec<usize>> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![Vec::new()];
    }
    loop {
        if let Some(adjacency) = try_build(n, rng) {
            if is_connected(&adjacency) {
                return adjacency
                    .into_iter()
                    .map(|s| {
                        let mut v: Vec<usize> = s.into_iter().collect();
                        v.sort_unstable();
                        v
                    })
                    .collect();
            }
            log::debug!("overlay of {} peers came out disconnected, retrying", n);
        } else {
            log::debug!("overlay degree assignment for {} peers ran out of candidates, retrying", n);
        }
    }
}

fn try_build(n: usize, rng: &mut impl Rng) -> Option<Vec<HashSet<usize>>> {
    let max_degree = n - 1;
    let mut remaining: Vec<usize> = (0..n)
        .map(|_| rng.gen_range(3..=6).min(max_degree))
        .collect();
    let mut adjacency: Vec<HashSet<usize>> = vec![HashSet::new(); n];
    let mut curr_list: Vec<usize> = (0..n).collect();

    for node in 0..n {
        let pos = curr_list.iter().position(|&x| x == node)?;
        curr_list.remove(pos);
        let need = remaining[node];
        if curr_list.len() < need {
            return None;
        }
        let chosen: Vec<usize> = curr_list.choose_multiple(rng, need).copied().collect();
        for nb in chosen {
            adjacency[node].insert(nb);
            adjacency[nb].insert(node);
            remaining[nb] = remaining[nb].saturating_sub(1);
            if remaining[nb] == 0 {
                if let Some(nb_pos) = curr_list.iter().position(|&x| x == nb) {
                    curr_list.remove(nb_pos);
                }
            }
        }
        if curr_list.is_empty() {
            break;
        }
    }
    Some(adjacency)
}

fn is_connected(adjacency: &[HashSet<usize>]) -> bool {
    let n = adjacency.len();
    if n == 0 {
        return true;
    }
    let mut visited = vec![false; n];
    let mut stack = vec![0usize];
    visited[0] = true;
    let mut count = 1;
    while let Some(node) = stack.pop() {
        for &nb in &adjacency[node] {
            if !visited[nb] {
                visited[nb] = true;
                count += 1;
                stack.push(nb);
            }
        }
    }
    count == n
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn builds_a_connected_graph_for_a_typical_network_size() {
        let mut rng = Pcg32::seed_from_u64(99);
        let adjacency = build_overlay(20, &mut rng);
        assert_eq!(adjacency.len(), 20);
        assert!(is_connected(&adjacency));
        for neighbors in &adjacency {
            assert!(neighbors.len() >= 3 && neighbors.len() <= 6);
        }
    }

    #[test]
    fn adjacency_is_symmetric() {
        let mut rng = Pcg32::seed_from_u64(5);
        let adjacency = build_overlay(12, &mut rng);
        for (i, neighbors) in adjacency.iter().enumerate() {
            for &j in neighbors {
                assert!(adjacency[j].contains(&i));
            }
        }
    }

    #[test]
    fn degenerately_small_networks_still_connect() {
        let mut rng = Pcg32::seed_from_u64(3);
        let adjacency = build_overlay(2, &mut rng);
        assert_eq!(adjacency, vec![vec![1], vec![0]]);
    }

    #[test]
    fn single_peer_network_has_no_neighbors() {
        let mut rng = Pcg32::seed_from_u64(1);
        let adjacency = build_overlay(1, &mut rng);
        assert_eq!(adjacency, vec![Vec::<usize>::new()]);
    }
}

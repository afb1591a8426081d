// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// The simulator's run configuration and the peer-population shape it
// implies (slow/fast link class and normalized hash fraction per peer).
// Range/positivity validation of the raw numbers lives in `bin_simulator`
// (the `InvalidConfig` error kind is a CLI-layer concern); by the time a
// `SimConfig` reaches this crate it is assumed well-formed.
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone)]
pub enum Mode {
    /// `z0`: percent of peers with a slow link. `z1`: percent of peers
    /// with low CPU power (low:high hash-power ratio is 1:10).
    Honest { z0: f64, z1: f64 },
    /// `c1`/`c2`: percent hash power of adversary 0 / adversary 1. The
    /// remaining `100 - c1 - c2` percent is split uniformly over peers
    /// `2..n`, half slow / half fast.
    Selfish { c1: f64, c2: f64 },
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub n: usize,
    /// Mean seconds between a peer's transaction generations. `None`
    /// means infinite (no transactions are ever generated).
    pub ttx: Option<f64>,
    /// Mean seconds between block-mining attempts per unit hash fraction.
    pub tk: f64,
    /// The block-creation quota `N`.
    pub blocks: usize,
    pub seed: u64,
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy)]
pub struct PeerSpec {
    pub is_slow: bool,
    pub hash_fraction: f64,
}

/// Derive each peer's link class and hash fraction from the configuration.
/// Peers 0 and 1 are always fast in `Selfish` mode, matching the usual
/// selfish-mining setup where the adversary's advantage comes from
/// withholding blocks rather than from a faster link.
pub fn build_peer_specs(config: &SimConfig, rng: &mut impl Rng) -> Vec<PeerSpec> {
    match &config.mode {
        Mode::Honest { z0, z1 } => build_honest_specs(config.n, *z0, *z1, rng),
        Mode::Selfish { c1, c2 } => build_selfish_specs(config.n, *c1, *c2, rng),
    }
}

fn shuffled_prefix(n: usize, count: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(count.min(n));
    indices
}

fn build_honest_specs(n: usize, z0: f64, z1: f64, rng: &mut impl Rng) -> Vec<PeerSpec> {
    let slow_count = ((z0 / 100.0) * n as f64).round() as usize;
    let low_count = ((z1 / 100.0) * n as f64).round() as usize;
    let high_count = n - low_count.min(n);

    let slow_peers: std::collections::HashSet<usize> =
        shuffled_prefix(n, slow_count, rng).into_iter().collect();
    let low_peers: std::collections::HashSet<usize> =
        shuffled_prefix(n, low_count, rng).into_iter().collect();

    let total_weight = low_count as f64 * 1.0 + high_count as f64 * 10.0;
    let low_frac = if total_weight > 0.0 { 1.0 / total_weight } else { 0.0 };
    let high_frac = if total_weight > 0.0 { 10.0 / total_weight } else { 0.0 };

    (0..n)
        .map(|i| PeerSpec {
            is_slow: slow_peers.contains(&i),
            hash_fraction: if low_peers.contains(&i) { low_frac } else { high_frac },
        })
        .collect()
}

fn build_selfish_specs(n: usize, c1: f64, c2: f64, rng: &mut impl Rng) -> Vec<PeerSpec> {
    let mut specs = vec![
        PeerSpec {
            is_slow: false,
            hash_fraction: c1 / 100.0,
        },
        PeerSpec {
            is_slow: false,
            hash_fraction: c2 / 100.0,
        },
    ];
    let rest_count = n.saturating_sub(2);
    if rest_count > 0 {
        let remaining_frac = ((100.0 - c1 - c2).max(0.0) / 100.0) / rest_count as f64;
        let slow_count = rest_count / 2;
        let rest_indices: Vec<usize> = (2..n).collect();
        let mut shuffled = rest_indices.clone();
        shuffled.shuffle(rng);
        let slow_rest: std::collections::HashSet<usize> =
            shuffled.into_iter().take(slow_count).collect();
        for i in rest_indices {
            specs.push(PeerSpec {
                is_slow: slow_rest.contains(&i),
                hash_fraction: remaining_frac,
            });
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn honest_hash_fractions_sum_to_one() {
        let mut rng = Pcg32::seed_from_u64(1);
        let config = SimConfig {
            n: 10,
            ttx: Some(1.0),
            tk: 1.0,
            blocks: 1,
            seed: 1,
            mode: Mode::Honest { z0: 30.0, z1: 40.0 },
        };
        let specs = build_peer_specs(&config, &mut rng);
        let total: f64 = specs.iter().map(|s| s.hash_fraction).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn selfish_hash_fractions_sum_to_one() {
        let mut rng = Pcg32::seed_from_u64(1);
        let config = SimConfig {
            n: 6,
            ttx: Some(1.0),
            tk: 1.0,
            blocks: 1,
            seed: 1,
            mode: Mode::Selfish { c1: 20.0, c2: 10.0 },
        };
        let specs = build_peer_specs(&config, &mut rng);
        let total: f64 = specs.iter().map(|s| s.hash_fraction).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(specs[0].hash_fraction, 0.20);
        assert_eq!(specs[1].hash_fraction, 0.10);
    }
}

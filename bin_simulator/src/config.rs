// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

// CLI argument validation. Malformed configuration is fatal and refuses to
// start, reported via a non-zero exit code.
use clap::{Parser, Subcommand};
use sim_engine::{Mode, SimConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bin_simulator")]
#[command(about = "Discrete-event simulator of a Nakamoto-style P2P mining network", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run with only honest peers.
    Honest {
        #[arg(long)]
        n: usize,
        #[arg(long)]
        z0: f64,
        #[arg(long)]
        z1: f64,
        /// Mean seconds between a peer's transaction generations. 0 means
        /// infinite (no transactions are ever generated).
        #[arg(long)]
        ttx: f64,
        #[arg(long)]
        tk: f64,
        #[arg(long)]
        blocks: usize,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long = "out-dir")]
        out_dir: Option<PathBuf>,
    },
    /// Run with two selfish-mining adversaries (peers 0 and 1).
    Selfish {
        #[arg(long)]
        n: usize,
        #[arg(long)]
        ttx: f64,
        #[arg(long)]
        tk: f64,
        #[arg(long)]
        c1: f64,
        #[arg(long)]
        c2: f64,
        #[arg(long)]
        blocks: usize,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long = "out-dir")]
        out_dir: Option<PathBuf>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("peer count n must be at least 2, got {0}")]
    TooFewPeers(usize),
    #[error("{name} must be within [0, 100], got {value}")]
    PercentOutOfRange { name: &'static str, value: f64 },
    #[error("combined adversary hash power C1 + C2 must not exceed 100, got {0}")]
    AdversaryPowerTooHigh(f64),
    #[error("block quota --blocks must be at least 1, got {0}")]
    ZeroBlocks(usize),
    #[error("mean interval --{name} must be non-negative, got {value}")]
    NegativeMean { name: &'static str, value: f64 },
    #[error("mean interval --tk must be positive, got {0}")]
    NonPositiveTk(f64),
}

fn check_percent(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&value) {
        Err(ConfigError::PercentOutOfRange { name, value })
    } else {
        Ok(())
    }
}

fn ttx_option(ttx: f64) -> Option<f64> {
    if ttx <= 0.0 {
        None
    } else {
        Some(ttx)
    }
}

pub fn build_config(command: Command) -> Result<(SimConfig, Option<PathBuf>), ConfigError> {
    match command {
        Command::Honest { n, z0, z1, ttx, tk, blocks, seed, out_dir } => {
            if n < 2 {
                return Err(ConfigError::TooFewPeers(n));
            }
            check_percent("z0", z0)?;
            check_percent("z1", z1)?;
            if ttx < 0.0 {
                return Err(ConfigError::NegativeMean { name: "ttx", value: ttx });
            }
            if tk <= 0.0 {
                return Err(ConfigError::NonPositiveTk(tk));
            }
            if blocks < 1 {
                return Err(ConfigError::ZeroBlocks(blocks));
            }
            let config = SimConfig {
                n,
                ttx: ttx_option(ttx),
                tk,
                blocks,
                seed: seed.unwrap_or_else(random_seed),
                mode: Mode::Honest { z0, z1 },
            };
            Ok((config, out_dir))
        }
        Command::Selfish { n, ttx, tk, c1, c2, blocks, seed, out_dir } => {
            if n < 2 {
                return Err(ConfigError::TooFewPeers(n));
            }
            check_percent("c1", c1)?;
            check_percent("c2", c2)?;
            if c1 + c2 > 100.0 {
                return Err(ConfigError::AdversaryPowerTooHigh(c1 + c2));
            }
            if ttx < 0.0 {
                return Err(ConfigError::NegativeMean { name: "ttx", value: ttx });
            }
            if tk <= 0.0 {
                return Err(ConfigError::NonPositiveTk(tk));
            }
            if blocks < 1 {
                return Err(ConfigError::ZeroBlocks(blocks));
            }
            let config = SimConfig {
                n,
                ttx: ttx_option(ttx),
                tk,
                blocks,
                seed: seed.unwrap_or_else(random_seed),
                mode: Mode::Selfish { c1, c2 },
            };
            Ok((config, out_dir))
        }
    }
}

fn random_seed() -> u64 {
    use rand::RngCore;
    let seed = rand::thread_rng().next_u64();
    log::info!("no --seed given, using randomly generated seed {}", seed);
    seed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_few_peers() {
        let cmd = Command::Honest {
            n: 1,
            z0: 0.0,
            z1: 0.0,
            ttx: 1.0,
            tk: 1.0,
            blocks: 1,
            seed: Some(1),
            out_dir: None,
        };
        assert!(matches!(build_config(cmd), Err(ConfigError::TooFewPeers(1))));
    }

    #[test]
    fn rejects_excess_combined_adversary_power() {
        let cmd = Command::Selfish {
            n: 5,
            ttx: 1.0,
            tk: 1.0,
            c1: 60.0,
            c2: 50.0,
            blocks: 1,
            seed: Some(1),
            out_dir: None,
        };
        assert!(matches!(
            build_config(cmd),
            Err(ConfigError::AdversaryPowerTooHigh(_))
        ));
    }

    #[test]
    fn zero_ttx_means_no_transactions() {
        let cmd = Command::Honest {
            n: 2,
            z0: 0.0,
            z1: 0.0,
            ttx: 0.0,
            tk: 1.0,
            blocks: 1,
            seed: Some(1),
            out_dir: None,
        };
        let (config, _) = build_config(cmd).unwrap();
        assert_eq!(config.ttx, None);
    }

    #[test]
    fn a_valid_honest_config_is_accepted() {
        let cmd = Command::Honest {
            n: 10,
            z0: 30.0,
            z1: 40.0,
            ttx: 2.0,
            tk: 5.0,
            blocks: 20,
            seed: Some(9),
            out_dir: None,
        };
        assert!(build_config(cmd).is_ok());
    }
}

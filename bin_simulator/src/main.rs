// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

mod config;
mod report;

use clap::Parser;
use config::{build_config, Cli};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use sim_engine::Simulator;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_default_env().init();

    let cli = Cli::parse();
    let (sim_config, out_dir) = match build_config(cli.command) {
        Ok(parts) => parts,
        Err(err) => {
            log::error!("invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("out"));
    let mut overlay_rng = Pcg32::seed_from_u64(sim_config.seed);
    let neighbors = sim_network::build_overlay(sim_config.n, &mut overlay_rng);

    log::info!(
        "starting simulation: n={} seed={} blocks={}",
        sim_config.n,
        sim_config.seed,
        sim_config.blocks
    );
    let mut sim = Simulator::new(sim_config, neighbors);
    sim.run();
    log::info!("simulation finished, writing report to {}", out_dir.display());

    if let Err(err) = write_report(&sim, &out_dir) {
        log::error!("failed to write report: {}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn write_report(sim: &Simulator, out_dir: &Path) -> std::io::Result<()> {
    let trees_dir = out_dir.join("trees");
    fs::create_dir_all(&trees_dir)?;

    for peer in 0..sim.roles.len() {
        let tree = sim.block_tree(peer);
        let text = report::render_tree(tree);
        fs::write(trees_dir.join(format!("peer_{}.txt", peer)), text)?;
    }

    fs::write(out_dir.join("summary.txt"), report::render_summary(sim))?;
    Ok(())
}

//! boost-pow - command line tools for Boost proof of work
//!
//! Decodes Boost scripts, reports target difficulty and solves Boost puzzles
//! on the CPU.

use anyhow::{bail, Context};
use boost_pow::{
    backend::Backend,
    crypto::Sha256dHasher,
    utils::{format_duration, header_timestamp, hex_to_bytes, init_logging},
    Config, InputScript, Job, OutputScript, Proof, Solution, Target, APP_DESCRIPTION, APP_NAME,
    APP_VERSION,
};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().await.context("Failed to load configuration")?;
    init_logging(config.log_level.into(), config.log_format)?;

    if config.info {
        print_info();
        return Ok(());
    }

    if config.print_config {
        print_configuration(&config)?;
        return Ok(());
    }

    if let Some(hex) = &config.decode_output {
        return decode_output(hex);
    }

    if let Some(hex) = &config.decode_input {
        return decode_input(hex);
    }

    if let Some(target) = &config.difficulty {
        return print_difficulty(target);
    }

    if let Some(hex) = &config.solve {
        return solve(&config, hex).await;
    }

    let settings = config.backend_settings()?;
    info!("Starting {} v{}", APP_NAME, APP_VERSION);
    let backend = Backend::new(settings);
    println!("{}", serde_json::to_string_pretty(&backend.status())?);
    Ok(())
}

/// Print basic program information
fn print_info() {
    println!("{} v{}", APP_NAME, APP_VERSION);
    println!("{}", APP_DESCRIPTION);
}

/// Print current configuration
fn print_configuration(config: &Config) -> anyhow::Result<()> {
    let config_yaml = serde_yaml::to_string(config)?;
    println!("{}", config_yaml);
    Ok(())
}

fn decode_output(hex: &str) -> anyhow::Result<()> {
    let script = OutputScript::read(&hex_to_bytes(hex)?);
    if !script.is_valid() {
        bail!("not a Boost output script");
    }

    println!("{}", script);
    println!("id:         {}", script.id());
    println!("difficulty: {}", script.difficulty()?.to_f64());
    println!("{}", serde_json::to_string_pretty(&script)?);
    Ok(())
}

fn decode_input(hex: &str) -> anyhow::Result<()> {
    let script = InputScript::read(&hex_to_bytes(hex)?);
    if !script.is_valid() {
        bail!("not a Boost input script");
    }

    println!("{}", script);
    println!("{}", serde_json::to_string_pretty(&script.solution())?);
    Ok(())
}

fn print_difficulty(target: &str) -> anyhow::Result<()> {
    let target = Target::from_str(target)?;
    let difficulty = target.difficulty()?;
    println!("target:     {}", target);
    println!("expanded:   {:064x}", target.expand());
    println!("difficulty: {} ({})", difficulty.to_f64(), difficulty);
    Ok(())
}

/// Search the nonce space of a script for the configured miner address
///
/// Each pass scans `solve_nonces` nonces, then moves to the next extra nonce.
async fn solve(config: &Config, hex: &str) -> anyhow::Result<()> {
    let script = OutputScript::read(&hex_to_bytes(hex)?);
    if !script.is_valid() {
        bail!("not a Boost output script");
    }
    let address = config.miner_address()?.context("--miner-address is required")?;

    let job = Job::new(&script, address);
    if !job.is_valid() {
        bail!("script cannot be mined by {}", address);
    }
    info!(id = %script.id(), difficulty = script.difficulty()?.to_f64(), "solving");

    let nonces = config.solve_nonces;
    let puzzle = job.puzzle.clone();
    let (solution, hashes, elapsed) = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let mut hasher = Sha256dHasher::new();
        let extra_nonce_1 = rand::random::<u32>();
        let mut extra_nonce_2 = 0u64;
        loop {
            let template = Solution::new(header_timestamp(), 0, extra_nonce_1, extra_nonce_2);
            if let Some(solution) = hasher.search(&puzzle, template, nonces) {
                return (solution, hasher.hashes(), started.elapsed());
            }
            debug!(extra_nonce_2, hashes = hasher.hashes(), "nonce space exhausted");
            extra_nonce_2 += 1;
        }
    })
    .await?;

    let proof = Proof::new(job.puzzle, solution);
    println!("{}", serde_json::to_string_pretty(&solution)?);
    println!("hash:    {}", proof.candidate().hash());
    println!("valid:   {}", proof.is_valid());
    println!(
        "hashes:  {} in {}",
        hashes,
        format_duration(elapsed.as_secs())
    );
    Ok(())
}

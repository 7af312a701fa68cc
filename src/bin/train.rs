use std::process;

use anyhow::Context;
use clap::Parser;

use convclass::config::TrainConfig;

fn run() -> anyhow::Result<()> {
    let config = TrainConfig::parse();
    let history = convclass::train::run(&config)
        .with_context(|| format!("training from {:?} failed", config.train_dir))?;
    if let Some(last) = history.last() {
        log::info!(
            "final epoch {}: accuracy={:.4} val_accuracy={:.4}",
            last.epoch,
            last.accuracy,
            last.val_accuracy.unwrap_or(f32::NAN)
        );
    }
    println!("model saved to {}", config.output.display());
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

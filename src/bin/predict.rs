use std::process;

use anyhow::Context;
use clap::Parser;

use convclass::config::PredictConfig;

fn run() -> anyhow::Result<()> {
    let config = PredictConfig::parse();
    let records = convclass::predict::run(&config).with_context(|| {
        format!(
            "error checking {} against {:?}",
            config.model.display(),
            config.val_dir
        )
    })?;
    log::info!(
        "{} images, accuracy {:.4}",
        records.len(),
        convclass::predict::accuracy(&records)
    );
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

use anyhow::Result;
use clap::Parser;
use mindfold::config::MindfoldConfig;
use mindfold::logging::init_logging;
use mindfold::tooling::cli::{Cli, CliContext};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = MindfoldConfig::load(Some(&cli.map))?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.logging.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        config.logging.file = Some(file.clone());
    }
    init_logging(Some(&config.logging))?;

    let context = CliContext::new(cli.map.clone(), config);
    let output = context.execute(&cli.command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

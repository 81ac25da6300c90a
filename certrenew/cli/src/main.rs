use std::path::PathBuf;

use anyhow::{Context, Result};
use certrenew::CertRenewer;
use clap::Parser;
use config::Config;
use fs_err as fs;
use tracing::info;

mod config;

#[derive(Parser)]
enum Command {
    /// Renew all configured certificates once, then reload the server
    Renew {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Renew all configured certificates periodically
    Run {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Generate configuration template
    Cfg {
        /// Write to file
        #[arg(short, long)]
        write_to: Option<PathBuf>,
    },
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn build_renewer(config: Option<PathBuf>) -> Result<CertRenewer> {
    let config = Config::load(config.as_deref()).context("Failed to load configuration")?;
    info!("loaded configuration for {} domain(s)", config.domains.len());
    config
        .to_renewer_config()?
        .build_renewer()
        .context("Failed to build renewer")
}

#[tokio::main]
async fn main() -> Result<()> {
    {
        use tracing_subscriber::{fmt, EnvFilter};
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();
    match args.command {
        Command::Renew { config } => {
            let renewer = build_renewer(config)?;
            renewer.renew_all().await?;
        }
        Command::Run { config } => {
            let renewer = build_renewer(config)?;
            renewer.run().await;
        }
        Command::Cfg { write_to } => {
            let toml_str = Config::default().to_commented_toml()?;
            match write_to {
                Some(path) => fs::write(path, toml_str)?,
                None => println!("{}", toml_str),
            }
        }
    }
    Ok(())
}

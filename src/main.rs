use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mri_prep::progress::LogObserver;
use mri_prep::{Pipeline, PrepConfig};

#[derive(Debug, Parser)]
#[command(name = "mri-prep", version, about = "Prepare MRI scans for training")]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy selected scans into the dataset tree and cache their center slices
    Prepare(PrepareArgs),
}

#[derive(Debug, clap::Args)]
struct PrepareArgs {
    /// TOML config file; flags below override its values
    #[arg(long, env = "MRI_PREP_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "MRI_PREP_SOURCE_ROOT")]
    source_root: Option<PathBuf>,

    #[arg(long, env = "MRI_PREP_DATASET_ROOT")]
    dataset_root: Option<PathBuf>,

    /// Tabular metadata file (.csv or .json)
    #[arg(long, env = "MRI_PREP_TABULAR")]
    tabular: Option<PathBuf>,

    #[arg(long)]
    scan_number: Option<i64>,

    #[arg(long)]
    project: Option<String>,
}

impl PrepareArgs {
    fn into_config(self) -> Result<PrepConfig> {
        let mut config = match &self.config {
            Some(path) => PrepConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PrepConfig::default(),
        };

        if let Some(v) = self.source_root {
            config.source_root = v;
        }
        if let Some(v) = self.dataset_root {
            config.dataset_root = v;
        }
        if let Some(v) = self.tabular {
            config.tabular_path = v;
        }
        if let Some(v) = self.scan_number {
            config.scan_number = v;
        }
        if let Some(v) = self.project {
            config.project = v;
        }
        config.validate().context("validating configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Prepare(args) => {
            let config = args.into_config()?;
            let report = Pipeline::new(config)
                .run(&mut LogObserver)
                .context("preparing images")?;
            if !report.failed_subjects.is_empty() {
                log::warn!("failed subjects: {}", report.failed_subjects.join(", "));
            }
        }
    }
    Ok(())
}

use anyhow::Context;
use clap::Parser;
use common::config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Trains the accident risk classifier", long_about = None)]
pub struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "training/config/dev.yaml")]
    pub config: String,

    /// Overrides `trainer.dataset_path`
    #[arg(long)]
    pub dataset: Option<String>,

    /// Overrides `trainer.output_dir`
    #[arg(long)]
    pub output_dir: Option<String>,
}

impl Args {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config =
            Config::load(&self.config).with_context(|| format!("failed to load config from {}", self.config))?;
        if let Some(dataset) = &self.dataset {
            config.trainer.dataset_path = dataset.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.trainer.output_dir = output_dir.clone();
        }
        Ok(config)
    }
}

pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn initialize_executable() -> anyhow::Result<Config> {
    let args = Args::parse();
    let config = args.load_config()?;

    init_tracing(&config.common.log_level);
    tracing::info!(
        config = %args.config,
        dataset = %config.trainer.dataset_path,
        output_dir = %config.trainer.output_dir,
        "Loaded config"
    );
    Ok(config)
}

use clap::Parser;

/// Matching engine and chat synchronization service.
#[derive(Debug, Parser)]
#[command(name = "heartline", version)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: String,
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(env!("GIT_VERSION"), " (built ", env!("BUILD_TIME"), ")");

#[derive(Parser)]
#[command(
    name = "tapfarm",
    about = "tapfarm - multi-account session farm",
    version = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, env = "TAPFARM_ENV_FILE", default_value = ".env")]
    pub env_file: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run every account session until shutdown (default if no command specified)")]
    Run {
        #[arg(short, long, help = "Print the final summary as JSON")]
        json: bool,
    },

    #[command(subcommand, about = "Inspect configured accounts")]
    Accounts(AccountCommands),

    #[command(subcommand, about = "Inspect configured proxies")]
    Proxies(ProxyCommands),

    #[command(subcommand, about = "View configuration")]
    Config(ConfigCommands),

    #[command(about = "Back up every session file")]
    Backup,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    #[command(about = "List accounts found in the sessions directory")]
    List {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ProxyCommands {
    #[command(about = "Probe every proxy in the proxy file")]
    Check {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,

        #[arg(long, default_value = tapfarm_core::modules::proxies::DEFAULT_PROBE_URL)]
        probe_url: String,

        #[arg(long, default_value = "10", help = "Probe timeout in seconds")]
        timeout: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show current configuration")]
    Show {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}

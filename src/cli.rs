use clap::Parser;
use std::path::PathBuf;

use ytbrief::transcript::Strategy;

#[derive(Parser)]
#[command(
    name = "ytbrief",
    about = "Web service that summarizes YouTube videos",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Caption retrieval strategy
    #[arg(short, long, value_enum, env = "YTBRIEF_STRATEGY")]
    pub strategy: Option<Strategy>,

    /// LLM model for summarization
    #[arg(short, long, env = "YTBRIEF_MODEL")]
    pub model: Option<String>,

    /// Config file (default: ~/.config/ytbrief/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write logs to stderr instead of the log file
    #[arg(long)]
    pub log_stderr: bool,

    /// Print startup settings
    #[arg(short, long)]
    pub verbose: bool,
}

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Result, WrapErr};
use log::{debug, info};

use ytbrief::config::Config;
use ytbrief::server::{self, AppState};
use ytbrief::summarize::{self, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, Summarizer};
use ytbrief::transcript::{self, DEFAULT_LANGUAGES, ProxyConfig};

mod cli;

use cli::Cli;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;

fn setup_logging(to_stderr: bool) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if to_stderr {
        builder.target(env_logger::Target::Stderr).init();
        return Ok(());
    }

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytbrief.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytbrief")
        .join("logs")
}

fn build_after_help() -> String {
    let log_path = log_dir().join("ytbrief.log");

    format!(
        "\nENVIRONMENT:\n  ANTHROPIC_API_KEY / OPENAI_API_KEY   credentials for the summarization model\n  \
         PROXY_IP, PROXY_PORT, PROXY_USER, PROXY_PASS   optional proxy for caption requests\n\n\
         Logs are written to: {}",
        log_path.display()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    setup_logging(cli.log_stderr)?;

    let config = Config::load(cli.config.as_deref())?;

    // CLI flags and environment take priority over the config file
    let host = cli.host.or(config.host).unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = cli.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let strategy = cli.strategy.or(config.strategy).unwrap_or_default();
    let model = cli.model.or(config.model).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let max_tokens = config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    let languages = config
        .languages
        .unwrap_or_else(|| DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect());

    let ip: IpAddr = host.parse().wrap_err_with(|| format!("invalid listen address: {host}"))?;
    let addr = SocketAddr::new(ip, port);

    let proxy = ProxyConfig::from_env();
    debug!("Caption proxy configured: {}", proxy.is_some());

    if cli.verbose {
        eprintln!(
            "Listening: http://{addr}\nStrategy: {strategy}\nModel: {model}\nLanguages: {}\nProxy: {}",
            languages.join(","),
            proxy.as_ref().map(|p| p.url()).unwrap_or_else(|| "none".to_string()),
        );
    }

    let transcripts = transcript::build_provider(strategy, proxy, languages)?;
    let completion = summarize::provider_for_model(reqwest::Client::new(), &model);
    let state = AppState {
        transcripts,
        summarizer: Arc::new(Summarizer::new(completion, max_tokens)),
    };

    info!("Starting ytbrief: strategy={strategy} model={model}");
    server::serve(addr, state).await
}

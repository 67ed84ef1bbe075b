use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use lyricdeck_lib::config::{AppConfig, HistoryBackend, Provider};
use lyricdeck_lib::error::Result;
use lyricdeck_lib::logging;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "lyricdeck exited with an error");
        eprintln!("lyricdeck failed: {}", err);
        std::process::exit(1);
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Compose lyric prompts and send them to an LLM", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "PATH", help = "Path to a TOML config file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Address to listen on")]
    host: Option<IpAddr>,

    #[arg(short, long, help = "Preferred port; nearby ports are tried if taken")]
    port: Option<u16>,

    #[arg(long, value_name = "PATH", conflicts_with = "history_file", help = "SQLite history database")]
    db: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Keep history in a JSON file instead of SQLite")]
    history_file: Option<PathBuf>,

    #[arg(long, help = "Number of submissions kept in the history")]
    history_limit: Option<usize>,

    #[arg(long, help = "Completion provider: openai or anthropic")]
    provider: Option<String>,

    #[arg(long, help = "Model name passed to the provider")]
    model: Option<String>,

    #[arg(long, value_name = "TOKEN", help = "Fixed API bearer token instead of a generated one")]
    access_token: Option<String>,

    #[arg(short, long, help = "Debug-level logging")]
    verbose: bool,
}

async fn run(args: Args) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    apply_args(&mut config, &args)?;
    config.validate()?;
    lyricdeck_lib::run(config).await
}

fn apply_args(config: &mut AppConfig, args: &Args) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = &args.db {
        config.history.backend = HistoryBackend::Sqlite;
        config.history.path = Some(path.clone());
    }
    if let Some(path) = &args.history_file {
        config.history.backend = HistoryBackend::Json;
        config.history.path = Some(path.clone());
    }
    if let Some(limit) = args.history_limit {
        config.history.limit = limit;
    }
    if let Some(provider) = &args.provider {
        config.switch_provider(provider.parse::<Provider>()?);
    }
    if let Some(model) = &args.model {
        config.completion.model = Some(model.clone());
    }
    if let Some(token) = &args.access_token {
        config.server.access_token = Some(token.clone());
    }
    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use feedelta::config::Config;
use feedelta::delta::{Mode, TracingSink};

#[derive(Parser, Debug)]
#[command(
    name = "feedelta",
    about = "Print the entries of an RSS/Atom feed that are newer than a watermark"
)]
struct Args {
    /// Feed URL to poll
    url: String,

    /// Watermark: UTC epoch seconds of the newest entry already seen
    #[arg(long, default_value_t = 0, value_name = "EPOCH")]
    since: i64,

    /// Also mine entry bodies for links
    #[arg(long)]
    deep_links: bool,

    /// Name used in log output (overrides config)
    #[arg(long)]
    user: Option<String>,

    /// Config file (default: ~/.config/feedelta/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("feedelta=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let mode = if args.deep_links {
        Mode::DeepLink
    } else {
        config.mode
    };
    let user = args.user.as_deref().unwrap_or(&config.user);

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.fetch.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let result = feedelta::poll(
        &client,
        &config.fetch,
        user,
        &args.url,
        args.since,
        mode,
        &TracingSink,
    )
    .await
    .with_context(|| format!("Failed to poll {}", args.url))?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);

    Ok(())
}

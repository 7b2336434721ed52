use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use cistatus::logging::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "cistatus")]
#[command(version, about = "Aggregate CI build status into one traffic-light color")]
pub struct Cli {
    /// Debug logging; the VERBOSE variable accepts 1/0, true/false, yes/no
    #[arg(
        short,
        long,
        global = true,
        env = "VERBOSE",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll GitLab and serve the summary over HTTP and WebSocket
    Serve(ServeArgs),
    /// Subscribe to a server and print every color it reports
    Watch(WatchArgs),
    /// Fetch the current summary once and print it as JSON
    Summary(SummaryArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// TOML config file; flags and environment override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "CI_STATUS_HTTP_SERVER_ADDRESS")]
    pub address: Option<String>,

    /// How often to poll GitLab (e.g. "10s", "1m30s")
    #[arg(long, env = "GITLAB_REFRESH_PERIOD", value_parser = parse_duration_arg)]
    pub refresh_period: Option<Duration>,

    #[arg(long, env = "GITLAB_API_BASE_URL")]
    pub gitlab_url: Option<String>,

    #[arg(long, env = "GITLAB_API_TOKEN", hide_env_values = true)]
    pub gitlab_token: Option<String>,

    #[arg(long)]
    pub gitlab_api_path: Option<String>,

    #[arg(long, env = "CI_STATUS_HTTP_SERVER_JWT_ALGORITHM")]
    pub jwt_algorithm: Option<String>,

    /// Shared secret for bearer tokens; without it project details are public
    #[arg(long, env = "CI_STATUS_HTTP_SERVER_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Allow cross-origin requests from browser dashboards
    #[arg(long)]
    pub cors: bool,
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    pub host: String,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// Connect with wss:// instead of ws://
    #[arg(long)]
    pub tls: bool,

    #[arg(long, default_value = "1s", value_parser = parse_duration_arg)]
    pub initial_interval: Duration,

    #[arg(long, default_value = "5m", value_parser = parse_duration_arg)]
    pub max_interval: Duration,

    /// Stop retrying after this long without a connection; 0 retries forever
    #[arg(long, default_value = "0", value_parser = parse_duration_arg)]
    pub max_elapsed: Duration,
}

#[derive(clap::Args, Debug)]
pub struct SummaryArgs {
    pub host: String,

    #[arg(short, long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub tls: bool,

    /// Bearer token; the project list is only returned when it is accepted
    #[arg(long, env = "CI_STATUS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    cistatus::config::parse_duration(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Serve(args) => cmd::cmd_serve(args).await?,
        Commands::Watch(args) => cmd::cmd_watch(args).await?,
        Commands::Summary(args) => cmd::cmd_summary(args).await?,
    }

    Ok(())
}

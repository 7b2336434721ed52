//! Status server command — `cistatus serve`.

use anyhow::{Context, Result};
use cistatus::config::{ServerConfig, ServerOverrides};

use crate::ServeArgs;

pub fn resolve_config(args: ServeArgs) -> Result<ServerConfig> {
    let mut config = ServerConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    config.apply(ServerOverrides {
        poll_interval: args.refresh_period,
        bind_address: args.address,
        cors: args.cors.then_some(true),
        jwt_algorithm: args.jwt_algorithm,
        jwt_secret: args.jwt_secret,
        gitlab_base_url: args.gitlab_url,
        gitlab_token: args.gitlab_token,
        gitlab_api_path: args.gitlab_api_path,
    });
    Ok(config)
}

pub async fn cmd_serve(args: ServeArgs) -> Result<()> {
    let config = resolve_config(args)?;
    cistatus::status::server::start_server(config).await
}

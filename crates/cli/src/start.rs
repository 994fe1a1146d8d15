use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use common::config::{Config, Server};
use dispatch::{handler, CommandNode, Invocation, ParamSpec};
use serde_json::Value;
use tracing::info;

use crate::app::CONFIG_PARAM;

/// Terminal-only command that starts the HTTP API.
pub(crate) fn command() -> CommandNode {
    CommandNode::new("server")
        .description("HTTP API server")
        .subcommand(
            CommandNode::new("start")
                .description("Serve every API command over HTTP")
                .param(
                    ParamSpec::value("address", "Listen address, overrides the configuration")
                        .short('a'),
                )
                .handler(handler(start)),
        )
}

async fn start(invocation: Invocation) -> Result<Value, anyhow::Error> {
    let mut config = Config::new(invocation.param_str(CONFIG_PARAM).map(PathBuf::from))?;

    if let Some(address) = invocation.param_str("address") {
        let address: SocketAddr = address
            .parse()
            .with_context(|| format!("invalid listen address `{address}`"))?;

        match config.server.as_mut() {
            Some(server) => server.address = address,
            None => config.server = Some(Server::new(address)),
        }
    }

    config.chains.default = invocation.context.platform().to_owned();

    info!(platform = invocation.context.platform(), "starting api server");

    server::serve(config, &commands::tree()).await?;

    Ok(Value::Null)
}

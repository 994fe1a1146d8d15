//! HTTP API for the command tree.
//!
//! Every API-exposed leaf command of the tree is compiled into a route, and
//! requests are executed through the same [`Dispatcher`] the terminal
//! front-end uses.

/// Command route handler.
mod handler;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{
    routing::{on, MethodFilter},
    Extension, Router, Server,
};
use common::config::Config;
use dispatch::{compile, CommandNode, Dispatcher, Environment, HttpMethod, RouteTable};
use tracing::info;

/// Start the HTTP server and serve the provided command trees until shut down.
pub async fn serve(config: Config, roots: &[Arc<CommandNode>]) -> Result<(), anyhow::Error> {
    let Some(server_config) = config.server.as_ref() else {
        return Err(anyhow::Error::msg("unable to load server config"));
    };

    let table = compile(roots)?;
    let dispatcher = Arc::new(Dispatcher::from_config(&config.chains, Environment::Api)?);

    info!(
        address = %server_config.address,
        routes = table.len(),
        platform = dispatcher.default_context().platform(),
        "starting http server"
    );

    Server::bind(&server_config.address)
        .serve(app_router(dispatcher, &table, &server_config.base_path).into_make_service())
        .await?;

    Ok(())
}

/// Build the HTTP router of compiled command routes, mounted under the base path.
pub fn app_router(dispatcher: Arc<Dispatcher>, table: &RouteTable, base_path: &str) -> Router {
    let mut routes = Router::new();

    for route in table.routes() {
        routes = routes.route(
            &route.path,
            on(method_filter(route.method), handler::execute)
                .layer(Extension(Arc::new(route.clone()))),
        );
    }

    let router = match base_path.trim_matches('/') {
        "" => Router::new().merge(routes),
        base => Router::new().nest(&format!("/{base}"), routes),
    };

    router.fallback(handler::not_found).with_state(dispatcher)
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

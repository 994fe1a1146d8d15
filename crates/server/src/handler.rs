use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use derive_more::{Display, Error, From};
use dispatch::{
    adapt, AdaptError, CommandError, ContextError, Dispatcher, Route, Surface,
    UnresolvedCommandError,
};
use serde_json::Value;
use tracing::warn;

/// Errors that may occur during command request handling.
#[derive(ErrorResponse, Display, From, Error)]
pub(crate) enum ApiError {
    /// Request path doesn't match any compiled route.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "route not found")]
    RouteNotFound,

    /// Command tokens don't lead to a leaf command.
    #[status(StatusCode::NOT_FOUND)]
    #[from(ignore)]
    UnresolvedCommand(UnresolvedCommandError),

    /// Requested chain is unknown or unreachable.
    #[status(StatusCode::BAD_REQUEST)]
    #[from(ignore)]
    Context(ContextError),

    /// Required command argument or parameter is missing or malformed.
    #[status(StatusCode::BAD_REQUEST)]
    #[from(ignore)]
    InvalidInput(CommandError),

    /// Request body is not valid JSON.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "malformed request body: {}", _0)]
    MalformedBody(serde_json::Error),

    /// Request body is valid JSON of an unsupported shape.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    UnsupportedBody(AdaptError),

    /// Command can't be executed over HTTP.
    #[status(StatusCode::NOT_IMPLEMENTED)]
    #[from(ignore)]
    NotImplemented(CommandError),

    /// Command handler failed.
    #[status(StatusCode::BAD_GATEWAY)]
    #[from(ignore)]
    HandlerFailed(CommandError),
}

impl From<CommandError> for ApiError {
    fn from(error: CommandError) -> Self {
        match error {
            CommandError::Unresolved(error) => Self::UnresolvedCommand(error),
            CommandError::Context(error) => Self::Context(error),
            error @ (CommandError::MissingArgument { .. }
            | CommandError::MissingParam { .. }
            | CommandError::InvalidParam { .. }) => Self::InvalidInput(error),
            error @ CommandError::NoHandler(_) => Self::NotImplemented(error),
            error @ CommandError::Handler { .. } => {
                warn!(%error, "command failed");
                Self::HandlerFailed(error)
            }
        }
    }
}

/// Execute the command bound to the matched route.
pub(crate) async fn execute(
    State(dispatcher): State<Arc<Dispatcher>>,
    Extension(route): Extension<Arc<Route>>,
    path: Option<Path<HashMap<String, String>>>,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&body)?)
    };

    let path = path.map(|Path(params)| params).unwrap_or_default();

    let frame = adapt(path, query, body, &route.command)?;

    let result = dispatcher
        .execute(&route.command, &route.command_path, frame, Surface::Http)
        .await?;

    Ok(Json(result))
}

/// Fallback for requests that don't match any route.
pub(crate) async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_json::assert_json;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use common::rpc::testing::{MockClient, MockConnections};
    use dispatch::{compile, ContextResolver, Dispatcher, Environment, ExecutionContext};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::testing::{RequestBodyExt, ResponseBodyExt};

    struct TestEnv {
        eth: Arc<MockClient>,
        polygon: Arc<MockClient>,
        dispatcher: Arc<Dispatcher>,
    }

    impl TestEnv {
        fn new(eth: MockClient) -> Self {
            let eth = Arc::new(eth);
            let polygon = Arc::new(
                MockClient::new("polygon")
                    .with_response("eth_getBlockByNumber", json!({ "number": "0x10" })),
            );

            let factory = MockConnections::new()
                .with_client(eth.clone())
                .with_client(polygon.clone());

            let dispatcher = Arc::new(Dispatcher::new(
                ContextResolver::new(Arc::new(factory)),
                Arc::new(ExecutionContext::new(eth.clone(), Environment::Api)),
            ));

            Self {
                eth,
                polygon,
                dispatcher,
            }
        }

        fn router(&self, base_path: &str) -> Router {
            let table = compile(&commands::tree()).unwrap();

            crate::app_router(self.dispatcher.clone(), &table, base_path)
        }
    }

    fn eth_client() -> MockClient {
        MockClient::new("eth")
            .with_response("eth_getBlockByNumber", json!({ "number": "0x10", "hash": "0x01" }))
            .with_response("eth_sendRawTransaction", json!("0xbeef"))
            .with_response("eth_getTransactionReceipt", json!({ "status": "0x1" }))
            .with_block_clock(|number| 1_000_000 + (number - 1000) * 2)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post(uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn executes_command() {
        let env = TestEnv::new(eth_client());

        let response = env.router("/api").oneshot(get("/api/block/get/16")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_json!(response.json().await, {
            "number": "0x10",
            "hash": "0x01",
        });
        assert_eq!(
            env.eth.calls("eth_getBlockByNumber"),
            [vec![json!("0x10"), json!(false)]]
        );
    }

    #[tokio::test]
    async fn aliases_share_handler() {
        let env = TestEnv::new(eth_client());

        let response = env
            .router("/api")
            .oneshot(get("/api/b/get/latest?transactions=true"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            env.eth.calls("eth_getBlockByNumber"),
            [vec![json!("latest"), json!(true)]]
        );
    }

    #[tokio::test]
    async fn unknown_route() {
        let env = TestEnv::new(eth_client());

        let response = env.router("/api").oneshot(get("/api/block/remove/16")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = env.router("/api").oneshot(get("/block/get/16")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_base_path() {
        let env = TestEnv::new(eth_client());

        let response = env.router("/").oneshot(get("/block/get/16")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chain_override_is_isolated() {
        let env = TestEnv::new(eth_client());

        let response = env
            .router("/api")
            .oneshot(get("/api/block/get/16?chain=polygon"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(env.polygon.calls("eth_getBlockByNumber").len(), 1);
        assert!(env.eth.requests().is_empty());
        assert_eq!(env.dispatcher.default_context().platform(), "eth");
    }

    #[tokio::test]
    async fn unknown_chain() {
        let env = TestEnv::new(eth_client());

        let response = env
            .router("/api")
            .oneshot(get("/api/block/get/16?chain=solana"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn repeated_chain_keeps_last_value() {
        let env = TestEnv::new(eth_client());

        let response = env
            .router("/api")
            .oneshot(get("/api/block/get/16?chain=eth&chain=polygon"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(env.polygon.calls("eth_getBlockByNumber").len(), 1);
        assert!(env.eth.requests().is_empty());
    }

    #[tokio::test]
    async fn non_string_chain() {
        let env = TestEnv::new(eth_client());

        let response = env
            .router("/api")
            .oneshot(post(
                "/api/tx/send",
                Body::from_json(json!({ "raw": "0x02f8", "chain": 137 })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(env.eth.requests().is_empty());
        assert!(env.polygon.requests().is_empty());
    }

    #[tokio::test]
    async fn concurrent_chains_are_isolated() {
        let env = TestEnv::new(eth_client());
        let router = env.router("/api");

        let (eth, polygon) = tokio::join!(
            router.clone().oneshot(get("/api/block/get/16")),
            router.clone().oneshot(get("/api/block/get/16?chain=polygon")),
        );

        assert_eq!(eth.unwrap().status(), StatusCode::OK);
        assert_eq!(polygon.unwrap().status(), StatusCode::OK);
        assert_eq!(
            env.eth.calls("eth_getBlockByNumber"),
            [vec![json!("0x10"), json!(false)]]
        );
        assert_eq!(
            env.polygon.calls("eth_getBlockByNumber"),
            [vec![json!("0x10"), json!(false)]]
        );
        assert_eq!(env.dispatcher.default_context().platform(), "eth");
    }

    #[tokio::test]
    async fn send_returns_hash() {
        let env = TestEnv::new(eth_client());

        let response = env
            .router("/api")
            .oneshot(post("/api/tx/send", Body::from_json(json!({ "raw": "0x02f8" }))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_json!(response.json().await, { "hash": "0xbeef" });
        assert_eq!(env.eth.calls("eth_sendRawTransaction"), [vec![json!("0x02f8")]]);
        assert!(env.eth.calls("eth_getTransactionReceipt").is_empty());
    }

    #[tokio::test]
    async fn block_dates_from_query() {
        let env = TestEnv::new(eth_client());

        let response = env
            .router("/api")
            .oneshot(get("/api/b/dates?blocks=1000&blocks=2000"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_json!(response.json().await, {
            "1000": "1970-01-12T13:46:40Z",
            "2000": "1970-01-12T14:20:00Z",
        });
    }

    #[tokio::test]
    async fn missing_param() {
        let env = TestEnv::new(eth_client());

        let response = env.router("/api").oneshot(get("/api/b/dates")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handler_failure() {
        let env = TestEnv::new(MockClient::new("eth"));

        let response = env.router("/api").oneshot(get("/api/block/get/16")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn malformed_bodies() {
        let env = TestEnv::new(eth_client());

        let response = env
            .router("/api")
            .oneshot(post("/api/tx/send", Body::from("raw=0x02f8")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = env
            .router("/api")
            .oneshot(post("/api/tx/send", Body::from_json(json!(["0x02f8"]))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert!(env.eth.requests().is_empty());
    }

    #[tokio::test]
    async fn wrong_method() {
        let env = TestEnv::new(eth_client());

        let response = env.router("/api").oneshot(get("/api/tx/send")).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

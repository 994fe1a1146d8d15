use std::sync::Arc;

use common::rpc::methods::MethodTable;
use dispatch::{handler, ApiMeta, ArgumentSpec, CommandNode, Invocation, ParamSpec};
use serde_json::Value;

use crate::{chain_param, format};

pub fn command(methods: Arc<MethodTable>) -> CommandNode {
    CommandNode::new("rpc")
        .description("Call an arbitrary JSON-RPC method")
        .argument(ArgumentSpec::named("method", "Method name, e.g. eth_chainId"))
        .param(
            ParamSpec::multiple(
                "args",
                "Method arguments; prefix with a type to override detection, e.g. bool:1",
            )
            .short('a'),
        )
        .param(chain_param())
        .api(ApiMeta::post())
        .handler(handler(move |invocation| call(methods.clone(), invocation)))
}

async fn call(methods: Arc<MethodTable>, invocation: Invocation) -> Result<Value, anyhow::Error> {
    let method = invocation.required_arg(0)?;

    let params = invocation
        .param_list("args")
        .iter()
        .map(|arg| format::rpc_argument(arg))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(methods
        .call(invocation.context.client().as_ref(), method, params)
        .await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::rpc::testing::MockClient;
    use dispatch::Environment;
    use serde_json::json;

    use crate::testing::run;

    #[tokio::test]
    async fn calls_with_typed_arguments() {
        let client = Arc::new(MockClient::new("eth").with_response("eth_getBalance", json!("0x0")));

        let value = run(
            client.clone(),
            Environment::Api,
            &["rpc"],
            &["eth_getBalance"],
            json!({ "args": ["0xdead", "1500"] }),
        )
        .await
        .unwrap();

        assert_eq!(value, json!("0x0"));
        assert_eq!(
            client.calls("eth_getBalance"),
            [vec![json!("0xdead"), json!("0x5dc")]]
        );
    }

    #[tokio::test]
    async fn unregistered_methods() {
        let client = Arc::new(
            MockClient::new("eth").with_response("debug_traceBlockByNumber", json!([])),
        );

        let value = run(
            client.clone(),
            Environment::Cli,
            &["rpc"],
            &["debug_traceBlockByNumber"],
            json!({ "args": "latest,bool:true" }),
        )
        .await
        .unwrap();

        assert_eq!(value, json!([]));
        assert_eq!(
            client.calls("debug_traceBlockByNumber"),
            [vec![json!("latest"), json!(true)]]
        );
    }

    #[tokio::test]
    async fn node_errors() {
        let client = Arc::new(MockClient::new("eth"));

        let err = run(client, Environment::Cli, &["rpc"], &["eth_unknown"], json!({}))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("`rpc` failed: rpc error -32601"));
    }
}

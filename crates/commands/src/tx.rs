use std::time::Duration;

use anyhow::{anyhow, bail};
use common::rpc::ChainClient;
use dispatch::{handler, ApiMeta, ArgumentSpec, CommandNode, Environment, Invocation};
use futures_util::try_join;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::chain_param;

/// Delay between transaction receipt requests.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Maximum count of transaction receipt requests.
const RECEIPT_POLL_ATTEMPTS: u32 = 150;

pub fn command() -> CommandNode {
    CommandNode::new("tx")
        .description("Transaction utilities")
        .subcommand(
            CommandNode::new("view")
                .description("Load a transaction and its receipt by hash")
                .argument(ArgumentSpec::named("hash", "Transaction hash"))
                .param(chain_param())
                .api(ApiMeta::get())
                .handler(handler(view)),
        )
        .subcommand(
            CommandNode::new("send")
                .description("Broadcast a signed raw transaction")
                .argument(ArgumentSpec::named("raw", "Signed transaction, hex encoded").query_only())
                .param(chain_param())
                .api(ApiMeta::post())
                .handler(handler(send)),
        )
}

async fn view(invocation: Invocation) -> Result<Value, anyhow::Error> {
    let hash = invocation.required_arg(0)?;
    let client = invocation.context.client();

    let (transaction, receipt) = try_join!(
        client.request("eth_getTransactionByHash", vec![json!(hash)]),
        client.request("eth_getTransactionReceipt", vec![json!(hash)]),
    )?;

    if transaction.is_null() {
        bail!("transaction `{hash}` not found");
    }

    Ok(json!({
        "transaction": transaction,
        "receipt": receipt,
    }))
}

async fn send(invocation: Invocation) -> Result<Value, anyhow::Error> {
    let raw = invocation.required_arg(0)?;
    let client = invocation.context.client();

    let hash = client
        .request("eth_sendRawTransaction", vec![json!(raw)])
        .await?;

    let hash = hash
        .as_str()
        .ok_or_else(|| anyhow!("unexpected transaction hash: {hash}"))?
        .to_owned();

    info!(%hash, platform = invocation.context.platform(), "transaction sent");

    if invocation.environment() == Environment::Api {
        return Ok(json!({ "hash": hash }));
    }

    let receipt = wait_for_receipt(client.as_ref(), &hash).await?;

    Ok(json!({
        "hash": hash,
        "receipt": receipt,
    }))
}

async fn wait_for_receipt(client: &dyn ChainClient, hash: &str) -> Result<Value, anyhow::Error> {
    for attempt in 0..RECEIPT_POLL_ATTEMPTS {
        let receipt = client
            .request("eth_getTransactionReceipt", vec![json!(hash)])
            .await?;

        if !receipt.is_null() {
            return Ok(receipt);
        }

        debug!(hash, attempt, "waiting for transaction receipt");

        tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
    }

    bail!("transaction `{hash}` wasn't mined in time")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::rpc::testing::MockClient;
    use dispatch::{CommandError, Environment};
    use serde_json::json;

    use crate::testing::run;

    fn client() -> Arc<MockClient> {
        Arc::new(
            MockClient::new("eth")
                .with_response("eth_sendRawTransaction", json!("0xbeef"))
                .with_response("eth_getTransactionByHash", json!({ "hash": "0xbeef" }))
                .with_response("eth_getTransactionReceipt", json!({ "status": "0x1" })),
        )
    }

    #[tokio::test]
    async fn views_transaction() {
        let value = run(client(), Environment::Cli, &["tx", "view"], &["0xbeef"], json!({}))
            .await
            .unwrap();

        assert_eq!(
            value,
            json!({
                "transaction": { "hash": "0xbeef" },
                "receipt": { "status": "0x1" },
            })
        );
    }

    #[tokio::test]
    async fn terminal_waits_for_receipt() {
        let client = client();

        let value = run(client.clone(), Environment::Cli, &["tx", "send"], &["0x02f8"], json!({}))
            .await
            .unwrap();

        assert_eq!(value, json!({ "hash": "0xbeef", "receipt": { "status": "0x1" } }));
        assert_eq!(client.calls("eth_getTransactionReceipt").len(), 1);
    }

    #[tokio::test]
    async fn api_returns_hash() {
        let client = client();

        let value = run(client.clone(), Environment::Api, &["tx", "send"], &["0x02f8"], json!({}))
            .await
            .unwrap();

        assert_eq!(value, json!({ "hash": "0xbeef" }));
        assert!(client.calls("eth_getTransactionReceipt").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_timeout() {
        let client = Arc::new(
            MockClient::new("eth")
                .with_response("eth_sendRawTransaction", json!("0xbeef"))
                .with_response("eth_getTransactionReceipt", json!(null)),
        );

        let err = run(client.clone(), Environment::Cli, &["tx", "send"], &["0x02f8"], json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Handler { .. }));
        assert_eq!(
            client.calls("eth_getTransactionReceipt").len(),
            super::RECEIPT_POLL_ATTEMPTS as usize
        );
    }
}

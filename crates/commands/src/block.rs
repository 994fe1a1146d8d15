use anyhow::bail;
use common::rpc::timestamps;
use dispatch::{handler, ApiMeta, ArgumentSpec, CommandNode, Invocation, ParamSpec};
use serde_json::{json, Map, Value};

use crate::{
    chain_param,
    format::{self, parse_number},
};

pub fn command() -> CommandNode {
    CommandNode::new("block")
        .alias("b")
        .description("Block utilities")
        .subcommand(
            CommandNode::new("get")
                .description("Load a block by its number or tag")
                .argument(ArgumentSpec::named("number", "Block number or tag, e.g. latest"))
                .param(ParamSpec::flag("transactions", "Include full transaction objects"))
                .param(chain_param())
                .api(ApiMeta::get())
                .handler(handler(get)),
        )
        .subcommand(
            CommandNode::new("dates")
                .description("Estimate dates of the provided blocks")
                .param(
                    ParamSpec::multiple("blocks", "Block numbers, comma separated")
                        .short('b')
                        .required(),
                )
                .param(chain_param())
                .api(ApiMeta::get())
                .handler(handler(dates)),
        )
}

async fn get(invocation: Invocation) -> Result<Value, anyhow::Error> {
    let number = invocation.required_arg(0)?;
    let block = format::block_param(number)?;

    let value = invocation
        .context
        .client()
        .request(
            "eth_getBlockByNumber",
            vec![json!(block), json!(invocation.flag("transactions"))],
        )
        .await?;

    if value.is_null() {
        bail!("block `{number}` not found");
    }

    Ok(value)
}

async fn dates(invocation: Invocation) -> Result<Value, anyhow::Error> {
    let blocks = invocation
        .param_list("blocks")
        .iter()
        .map(|block| parse_number(block))
        .collect::<Result<Vec<_>, _>>()?;

    let dates = timestamps::estimate(invocation.context.client().as_ref(), blocks).await?;

    let mut result = Map::with_capacity(dates.len());
    for (number, date) in &dates {
        result.insert(number.to_string(), json!(format::date(date)?));
    }

    Ok(Value::Object(result))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::rpc::testing::MockClient;
    use dispatch::{CommandError, Environment};
    use serde_json::json;

    use crate::testing::run;

    #[tokio::test]
    async fn gets_block() {
        let client = Arc::new(
            MockClient::new("eth")
                .with_response("eth_getBlockByNumber", json!({ "number": "0x10" })),
        );

        let value = run(client.clone(), Environment::Cli, &["b", "get"], &["16"], json!({}))
            .await
            .unwrap();

        assert_eq!(value, json!({ "number": "0x10" }));
        assert_eq!(
            client.calls("eth_getBlockByNumber"),
            [vec![json!("0x10"), json!(false)]]
        );
    }

    #[tokio::test]
    async fn missing_block() {
        let client = Arc::new(MockClient::new("eth").with_response("eth_getBlockByNumber", json!(null)));

        let err = run(client, Environment::Api, &["block", "get"], &["latest"], json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "`block get` failed: block `latest` not found");
    }

    #[tokio::test]
    async fn estimates_dates() {
        let client = Arc::new(
            MockClient::new("eth").with_block_clock(|number| 1_000_000 + (number - 1000) * 2),
        );

        let value = run(
            client.clone(),
            Environment::Api,
            &["block", "dates"],
            &[],
            json!({ "blocks": "2000,1000, 1500" }),
        )
        .await
        .unwrap();

        assert_eq!(
            value,
            json!({
                "1000": "1970-01-12T13:46:40Z",
                "1500": "1970-01-12T14:03:20Z",
                "2000": "1970-01-12T14:20:00Z",
            })
        );
        assert_eq!(client.block_lookups().len(), 1);
    }

    #[tokio::test]
    async fn blocks_are_required() {
        let client = Arc::new(MockClient::new("eth"));

        let err = run(client, Environment::Cli, &["b", "dates"], &[], json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::MissingParam { ref name, .. } if name == "blocks"));
    }
}

use std::collections::BTreeSet;

use anyhow::{bail, Context};
use common::rpc::{parse_quantity, timestamps, to_quantity};
use dispatch::{handler, ApiMeta, ArgumentSpec, CommandNode, Invocation, ParamSpec};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    chain_param,
    format::{self, parse_number},
};

/// Maximum count of storage slots read by a single range request.
const MAX_SLOT_RANGE: u64 = 256;

pub fn command() -> CommandNode {
    CommandNode::new("contract")
        .alias("c")
        .description("Contract storage and event utilities")
        .subcommand(
            CommandNode::new("slot")
                .description("Read a storage slot, or an inclusive range of slots (e.g. 0-4)")
                .argument(ArgumentSpec::named("address", "Contract address"))
                .argument(ArgumentSpec::named("slot", "Slot number or range"))
                .param(ParamSpec::value("block", "Block number or tag"))
                .param(chain_param())
                .api(ApiMeta::get())
                .handler(handler(slot)),
        )
        .subcommand(
            CommandNode::new("logs")
                .description("List contract event logs with estimated block dates")
                .argument(ArgumentSpec::named("address", "Contract address"))
                .param(ParamSpec::multiple("topic", "Event topic filter, in topic order").short('t'))
                .param(ParamSpec::value("from-block", "First block to search in"))
                .param(ParamSpec::value("to-block", "Last block to search in"))
                .param(ParamSpec::value("format", "Output format: json or csv").short('f'))
                .param(chain_param())
                .api(ApiMeta::get())
                .handler(handler(logs)),
        )
}

async fn slot(invocation: Invocation) -> Result<Value, anyhow::Error> {
    let address = invocation.required_arg(0)?;
    let slot = invocation.required_arg(1)?;

    let block = match invocation.param_str("block") {
        Some(block) => format::block_param(&block)?,
        None => String::from("latest"),
    };

    let client = invocation.context.client();

    let Some((start, end)) = slot.split_once('-') else {
        let slot = if slot.starts_with("0x") {
            slot.to_owned()
        } else {
            to_quantity(parse_number(slot)?)
        };

        return Ok(client
            .request("eth_getStorageAt", vec![json!(address), json!(slot), json!(block)])
            .await?);
    };

    let (start, end) = (parse_number(start)?, parse_number(end)?);

    if start > end {
        bail!("slot range `{slot}` is empty");
    }
    if end - start >= MAX_SLOT_RANGE {
        bail!("slot range `{slot}` exceeds {MAX_SLOT_RANGE} slots");
    }

    debug!(address, start, end, "reading storage slot range");

    let calls = (start..=end)
        .map(|slot| {
            (
                "eth_getStorageAt",
                vec![json!(address), json!(to_quantity(slot)), json!(block)],
            )
        })
        .collect();

    let values = client.batch(calls).await?;

    Ok((start..=end)
        .zip(values)
        .map(|(slot, value)| json!({ "slot": slot, "value": value }))
        .collect())
}

async fn logs(invocation: Invocation) -> Result<Value, anyhow::Error> {
    let address = invocation.required_arg(0)?;

    let csv = match invocation.param_str("format").as_deref() {
        None | Some("json") => false,
        Some("csv") => true,
        Some(format) => bail!("unsupported format `{format}`, expected json or csv"),
    };

    let from_block = match invocation.param_str("from-block") {
        Some(block) => format::block_param(&block)?,
        None => String::from("earliest"),
    };
    let to_block = match invocation.param_str("to-block") {
        Some(block) => format::block_param(&block)?,
        None => String::from("latest"),
    };

    let mut filter = json!({
        "address": address,
        "fromBlock": from_block,
        "toBlock": to_block,
    });

    let topics = invocation.param_list("topic");
    if !topics.is_empty() {
        filter["topics"] = json!(topics);
    }

    let client = invocation.context.client();

    let logs = match client.request("eth_getLogs", vec![filter]).await? {
        Value::Array(logs) => logs,
        other => bail!("unexpected eth_getLogs response: {other}"),
    };

    let numbers = logs
        .iter()
        .map(|log| {
            let number = log["blockNumber"]
                .as_str()
                .context("log entry has no block number")?;

            Ok(parse_quantity(number)?)
        })
        .collect::<Result<Vec<u64>, anyhow::Error>>()?;

    debug!(
        logs = logs.len(),
        blocks = numbers.iter().collect::<BTreeSet<_>>().len(),
        "loaded contract logs"
    );

    let dates = timestamps::estimate(client.as_ref(), numbers.iter().copied()).await?;

    let mut rows = Vec::with_capacity(logs.len());

    for (log, number) in logs.iter().zip(&numbers) {
        let date = dates.get(number).map(format::date).transpose()?;

        rows.push(json!({
            "block": {
                "number": number,
                "date": date,
            },
            "transactionHash": log["transactionHash"],
            "topics": log["topics"],
            "data": log["data"],
        }));
    }

    if !csv {
        return Ok(Value::Array(rows));
    }

    let records = rows.iter().map(|row| {
        let topics = row["topics"]
            .as_array()
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        vec![
            row["block"]["number"].to_string(),
            row["block"]["date"].as_str().unwrap_or_default().to_owned(),
            row["transactionHash"].as_str().unwrap_or_default().to_owned(),
            topics,
            row["data"].as_str().unwrap_or_default().to_owned(),
        ]
    });

    Ok(Value::String(format::csv_table(
        &["Block", "Date", "Tx", "Topics", "Data"],
        records,
    )?))
}

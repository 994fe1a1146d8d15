use anyhow::{anyhow, bail};
use common::rpc::to_quantity;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Block tags accepted by nodes in place of a block number.
const BLOCK_TAGS: &[&str] = &["earliest", "latest", "pending", "safe", "finalized"];

/// Parse a decimal or `0x`-prefixed hex number.
pub fn parse_number(value: &str) -> Result<u64, anyhow::Error> {
    let value = value.trim();

    let parsed = match value.strip_prefix("0x") {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => value.parse(),
    };

    parsed.map_err(|_| anyhow!("`{value}` is not a valid number"))
}

/// Convert a block number or tag into a JSON-RPC block parameter.
pub fn block_param(value: &str) -> Result<String, anyhow::Error> {
    if BLOCK_TAGS.contains(&value) {
        return Ok(value.to_owned());
    }

    Ok(to_quantity(parse_number(value)?))
}

/// Format a date the way it is displayed to users.
pub fn date(date: &OffsetDateTime) -> Result<String, anyhow::Error> {
    Ok(date.format(&Rfc3339)?)
}

/// Render a CSV document with the provided header.
pub fn csv_table<R>(header: &[&str], rows: R) -> Result<String, anyhow::Error>
where
    R: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(header)?;

    for row in rows {
        writer.write_record(&row)?;
    }

    let output = writer.into_inner().map_err(|err| err.into_error())?;

    let mut output = String::from_utf8(output)?;
    if output.ends_with('\n') {
        output.pop();
    }

    Ok(output)
}

/// Convert an RPC method argument from its textual form.
///
/// Arguments may carry an explicit type prefix, e.g. `bool:true` or `uint256:10`.
/// Without a prefix, decimal numbers are converted into hex quantities, `true`
/// and `false` into booleans, and everything else is passed as a string.
pub fn rpc_argument(value: &str) -> Result<Value, anyhow::Error> {
    let (kind, raw) = match value.split_once(':') {
        Some((kind, raw))
            if !kind.is_empty() && kind.bytes().all(|b| b.is_ascii_alphanumeric()) =>
        {
            (Some(kind), raw)
        }
        _ => (None, value),
    };

    let kind = kind.or_else(|| detect_kind(raw));

    match kind {
        Some("bool" | "boolean") => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => bail!("invalid boolean value `{raw}`"),
        },
        Some(kind) if kind.starts_with("uint") => {
            let number: u128 = match raw.strip_prefix("0x") {
                Some(digits) => u128::from_str_radix(digits, 16),
                None => raw.parse(),
            }
            .map_err(|_| anyhow!("invalid unsigned integer value `{raw}`"))?;

            Ok(Value::String(format!("{number:#x}")))
        }
        _ => Ok(Value::String(raw.to_owned())),
    }
}

fn detect_kind(value: &str) -> Option<&'static str> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        Some("uint256")
    } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        Some("boolean")
    } else {
        None
    }
}

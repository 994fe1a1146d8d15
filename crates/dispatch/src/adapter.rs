use derive_more::{Display, Error};
use serde_json::{Map, Value};

use crate::node::{synthesized_index, CommandNode, ParamKind};

/// Named parameters of a call frame.
pub type Params = Map<String, Value>;

/// Positional arguments and named parameters of a single command invocation.
///
/// Both the terminal front-end and the HTTP API produce the same frame shape,
/// so handlers cannot tell which surface invoked them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallFrame {
    /// Positional arguments, in declaration order. Missing arguments are [`None`].
    pub args: Vec<Option<String>>,

    /// Named parameters.
    pub params: Params,
}

impl CallFrame {
    /// Create new empty frame for the provided command.
    pub fn for_command(command: &CommandNode) -> Self {
        Self {
            args: vec![None; command.arguments.len()],
            params: Params::new(),
        }
    }

    /// Place a positional argument at the provided index.
    ///
    /// Indices past the declared arguments are ignored.
    pub fn set_arg(&mut self, index: usize, value: String) {
        if let Some(slot) = self.args.get_mut(index) {
            *slot = Some(value);
        }
    }
}

/// Errors that may occur during request adaptation.
#[derive(Debug, Display, Error)]
pub enum AdaptError {
    /// Request body is valid JSON, but not an object.
    #[display(fmt = "request body must be a JSON object")]
    BodyIsNotAnObject,
}

/// Rebuild a call frame from HTTP request data.
///
/// Path and query keys that match the `arg{index}` naming scheme of a declared
/// position, or the name of a declared argument, are placed into positional
/// arguments. The remaining query keys become named parameters. Repeated keys
/// of single-value parameters keep the last value, other repeated keys are
/// collected into arrays. Body
/// fields are merged into named parameters last, overriding query values, and
/// also fill query-only arguments that weren't provided otherwise.
pub fn adapt<P, Q>(
    path_params: P,
    query: Q,
    body: Option<Value>,
    command: &CommandNode,
) -> Result<CallFrame, AdaptError>
where
    P: IntoIterator<Item = (String, String)>,
    Q: IntoIterator<Item = (String, String)>,
{
    let mut frame = CallFrame::for_command(command);

    for (key, value) in path_params {
        if let Some(index) = positional_index(command, &key) {
            frame.set_arg(index, value);
        }
    }

    for (key, value) in query {
        if let Some(index) = positional_index(command, &key) {
            frame.set_arg(index, value);
            continue;
        }

        append_query_param(&mut frame.params, command, key, value);
    }

    let body = match body {
        None | Some(Value::Null) => Params::new(),
        Some(Value::Object(body)) => body,
        Some(_) => return Err(AdaptError::BodyIsNotAnObject),
    };

    for (key, value) in body {
        if let Some(index) = command.argument_index(&key) {
            if command.arguments[index].query_only && frame.args[index].is_none() {
                if let Some(value) = scalar_string(&value) {
                    frame.set_arg(index, value);
                }
            }
        }

        frame.params.insert(key, value);
    }

    Ok(frame)
}

fn positional_index(command: &CommandNode, key: &str) -> Option<usize> {
    synthesized_index(key)
        .or_else(|| command.argument_index(key))
        .filter(|index| *index < command.arguments.len())
}

fn append_query_param(params: &mut Params, command: &CommandNode, key: String, value: String) {
    let kind = command.param_spec(&key).map(|spec| spec.kind);

    if matches!(kind, Some(ParamKind::Value | ParamKind::Flag)) {
        params.insert(key, Value::String(value));
        return;
    }

    match params.get_mut(&key) {
        Some(Value::Array(values)) => values.push(Value::String(value)),
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, Value::String(value)]);
        }
        None if kind == Some(ParamKind::Multiple) => {
            params.insert(key, Value::Array(vec![Value::String(value)]));
        }
        None => {
            params.insert(key, Value::String(value));
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

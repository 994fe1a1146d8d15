use std::sync::Arc;

use common::{
    config::Chains,
    rpc::{ConfiguredConnections, ConnectionFactory},
};
use derive_more::{Display, Error, From};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    adapter::{CallFrame, Params},
    alias::UnresolvedCommandError,
    context::{ContextError, ContextResolver, Environment, ExecutionContext},
    node::CommandNode,
};

/// Named parameter that selects the chain a command is executed against.
pub const CHAIN_PARAM: &str = "chain";

/// Surface a command was invoked through.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Surface {
    /// Terminal front-end.
    #[display(fmt = "terminal")]
    Terminal,

    /// HTTP API.
    #[display(fmt = "http")]
    Http,
}

/// Errors that may occur during command execution.
#[derive(Debug, Display, Error, From)]
pub enum CommandError {
    /// Token sequence doesn't lead to a leaf command.
    Unresolved(UnresolvedCommandError),

    /// Unable to resolve the execution context.
    Context(ContextError),

    /// Required positional argument wasn't provided.
    #[display(fmt = "`{}` requires the `{}` argument", path, name)]
    #[from(ignore)]
    MissingArgument {
        /// Command path.
        path: String,

        /// Argument name.
        name: String,
    },

    /// Required named parameter wasn't provided.
    #[display(fmt = "`{}` requires the `--{}` parameter", path, name)]
    #[from(ignore)]
    MissingParam {
        /// Command path.
        path: String,

        /// Parameter name.
        name: String,
    },

    /// Named parameter has a value of an unexpected shape.
    #[display(fmt = "`{}` expects a single string `--{}` parameter", path, name)]
    #[from(ignore)]
    InvalidParam {
        /// Command path.
        path: String,

        /// Parameter name.
        name: String,
    },

    /// Command has no handler for the surface it was invoked through.
    #[display(fmt = "`{}` can't be executed from this surface", _0)]
    #[from(ignore)]
    NoHandler(#[error(not(source))] String),

    /// Command handler failed.
    #[display(fmt = "`{}` failed: {:#}", path, error)]
    #[from(ignore)]
    Handler {
        /// Command path.
        path: String,

        /// Original handler error.
        error: anyhow::Error,
    },
}

/// Everything a handler receives for a single command invocation.
#[derive(Clone)]
pub struct Invocation {
    /// Positional arguments, in declaration order.
    pub args: Vec<Option<String>>,

    /// Named parameters.
    pub params: Params,

    /// Execution context of the invocation.
    pub context: Arc<ExecutionContext>,

    /// Invoked command.
    pub command: Arc<CommandNode>,

    /// Space-separated primary names of commands on the way to the invoked one.
    pub path: String,
}

impl Invocation {
    /// Get a positional argument, if provided.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args
            .get(index)
            .and_then(Option::as_deref)
            .filter(|value| !value.is_empty())
    }

    /// Get a positional argument, failing if it wasn't provided.
    pub fn required_arg(&self, index: usize) -> Result<&str, anyhow::Error> {
        self.arg(index).ok_or_else(|| {
            let name = self
                .command
                .arguments
                .get(index)
                .map(|argument| argument.key(index))
                .unwrap_or_else(|| crate::node::synthesized_name(index));

            anyhow::anyhow!("missing `{name}` argument")
        })
    }

    /// Get a named parameter, if provided.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|value| !value.is_null())
    }

    /// Get a scalar named parameter as a string.
    pub fn param_str(&self, name: &str) -> Option<String> {
        self.param(name).and_then(scalar_string)
    }

    /// Check if a boolean switch is set.
    ///
    /// Switches are booleans when set by the terminal or a JSON body, and strings
    /// when set by a query.
    pub fn flag(&self, name: &str) -> bool {
        match self.param(name) {
            Some(Value::Bool(value)) => *value,
            Some(Value::String(value)) => !matches!(value.as_str(), "false" | "0"),
            Some(_) => true,
            None => false,
        }
    }

    /// Get a list parameter.
    ///
    /// Accepts both arrays and comma-separated strings.
    pub fn param_list(&self, name: &str) -> Vec<String> {
        match self.param(name) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(scalar_string)
                .flat_map(|value| split_list(&value))
                .collect(),
            Some(value) => scalar_string(value)
                .map(|value| split_list(&value))
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Environment the invocation is executed in.
    pub fn environment(&self) -> Environment {
        self.context.environment()
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

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Invoke a command with an already resolved execution context.
///
/// Required arguments and parameters are validated before the handler runs. On the
/// HTTP surface, the custom API handler takes precedence over the default one.
#[instrument(skip_all, fields(command = path, %surface))]
pub async fn invoke(
    node: &Arc<CommandNode>,
    frame: CallFrame,
    context: Arc<ExecutionContext>,
    surface: Surface,
    path: &str,
) -> Result<Value, CommandError> {
    if node.is_router() {
        return Err(UnresolvedCommandError {
            resolved: path.split(' ').map(str::to_owned).collect(),
            token: None,
        }
        .into());
    }

    validate(node, &frame, path)?;

    let custom = match surface {
        Surface::Http => node.api.as_ref().and_then(|api| api.handler.clone()),
        Surface::Terminal => None,
    };

    let handler = custom
        .or_else(|| node.handler.clone())
        .ok_or_else(|| CommandError::NoHandler(path.to_owned()))?;

    debug!(platform = context.platform(), "executing command");

    let invocation = Invocation {
        args: frame.args,
        params: frame.params,
        context,
        command: node.clone(),
        path: path.to_owned(),
    };

    handler(invocation)
        .await
        .map_err(|error| CommandError::Handler {
            path: path.to_owned(),
            error,
        })
}

fn validate(node: &CommandNode, frame: &CallFrame, path: &str) -> Result<(), CommandError> {
    for (index, argument) in node.arguments.iter().enumerate() {
        let provided = frame
            .args
            .get(index)
            .and_then(Option::as_deref)
            .map_or(false, |value| !value.is_empty());

        if argument.required && !provided {
            return Err(CommandError::MissingArgument {
                path: path.to_owned(),
                name: argument.key(index),
            });
        }
    }

    for param in node.params.iter().filter(|param| param.required) {
        let provided = frame
            .params
            .get(&param.name)
            .map_or(false, |value| !value.is_null());

        if !provided {
            return Err(CommandError::MissingParam {
                path: path.to_owned(),
                name: param.name.clone(),
            });
        }
    }

    Ok(())
}

/// Single execution entrypoint shared by the terminal front-end and the HTTP API.
pub struct Dispatcher {
    resolver: ContextResolver,
    default: Arc<ExecutionContext>,
}

impl Dispatcher {
    /// Create new dispatcher with the process-wide default context.
    pub fn new(resolver: ContextResolver, default: Arc<ExecutionContext>) -> Self {
        Self { resolver, default }
    }

    /// Create new dispatcher connected to the configured chains.
    ///
    /// The default context is bound to the default platform and tagged with the
    /// provided environment.
    pub fn from_config(chains: &Chains, environment: Environment) -> Result<Self, ContextError> {
        let factory = Arc::new(ConfiguredConnections::from_config(chains));
        let client = factory.connect(&chains.default)?;

        Ok(Self::new(
            ContextResolver::new(factory),
            Arc::new(ExecutionContext::new(client, environment)),
        ))
    }

    /// Process-wide default execution context.
    pub fn default_context(&self) -> &Arc<ExecutionContext> {
        &self.default
    }

    /// Execute a leaf command.
    ///
    /// The execution context is resolved from the `chain` parameter, which must be
    /// a single string when provided. Commands
    /// invoked over HTTP always run in the [`Environment::Api`] environment.
    pub async fn execute(
        &self,
        node: &Arc<CommandNode>,
        path: &str,
        frame: CallFrame,
        surface: Surface,
    ) -> Result<Value, CommandError> {
        let requested = match frame.params.get(CHAIN_PARAM) {
            None | Some(Value::Null) => None,
            Some(Value::String(chain)) => Some(chain.as_str()),
            Some(_) => {
                return Err(CommandError::InvalidParam {
                    path: path.to_owned(),
                    name: CHAIN_PARAM.to_owned(),
                })
            }
        };

        let mut context = self.resolver.resolve(requested, &self.default)?;

        if surface == Surface::Http && context.environment() != Environment::Api {
            context = Arc::new(context.with_environment(Environment::Api));
        }

        invoke(node, frame, context, surface, path).await
    }
}

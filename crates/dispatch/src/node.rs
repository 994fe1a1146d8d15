use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    sync::Arc,
};

use derive_more::Display;
use futures_util::{future::BoxFuture, FutureExt};
use serde_json::Value;

use crate::dispatcher::Invocation;

/// Command handler.
///
/// Handlers receive the complete [`Invocation`] (call frame, execution context and
/// the invoked command) and produce a JSON result.
pub type Handler =
    Arc<dyn Fn(Invocation) -> BoxFuture<'static, Result<Value, anyhow::Error>> + Send + Sync>;

/// Wrap an async function into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, anyhow::Error>> + Send + 'static,
{
    Arc::new(move |invocation| f(invocation).boxed())
}

/// HTTP method a command is exposed with.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET` request.
    #[default]
    #[display(fmt = "GET")]
    Get,

    /// `POST` request.
    #[display(fmt = "POST")]
    Post,

    /// `PUT` request.
    #[display(fmt = "PUT")]
    Put,

    /// `DELETE` request.
    #[display(fmt = "DELETE")]
    Delete,
}

/// HTTP API exposure of a command.
#[derive(Clone, Default)]
pub struct ApiMeta {
    /// HTTP method the command routes respond to.
    pub method: HttpMethod,

    /// Handler used instead of the command's own handler for HTTP requests.
    pub handler: Option<Handler>,
}

impl ApiMeta {
    /// Expose the command with the `GET` method.
    pub fn get() -> Self {
        Self::with_method(HttpMethod::Get)
    }

    /// Expose the command with the `POST` method.
    pub fn post() -> Self {
        Self::with_method(HttpMethod::Post)
    }

    /// Expose the command with the provided method.
    pub fn with_method(method: HttpMethod) -> Self {
        Self {
            method,
            handler: None,
        }
    }

    /// Use a custom handler for HTTP requests.
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl Debug for ApiMeta {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiMeta")
            .field("method", &self.method)
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

/// Positional argument declaration.
#[derive(Clone, Debug, Default)]
pub struct ArgumentSpec {
    /// Argument name. Unnamed arguments are addressed as `arg{index}`.
    pub name: Option<String>,

    /// Argument description.
    pub description: String,

    /// Whether the argument must be provided.
    pub required: bool,

    /// Query-only arguments are not a part of the route path.
    pub query_only: bool,
}

impl ArgumentSpec {
    /// Create new required unnamed argument.
    pub fn unnamed(description: &str) -> Self {
        Self {
            name: None,
            description: description.to_owned(),
            required: true,
            query_only: false,
        }
    }

    /// Create new required named argument.
    pub fn named(name: &str, description: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            ..Self::unnamed(description)
        }
    }

    /// Mark the argument as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Exclude the argument from route paths.
    pub fn query_only(mut self) -> Self {
        self.query_only = true;
        self
    }

    /// Name used to address the argument at the provided index.
    pub fn key(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| synthesized_name(index))
    }
}

/// Name of an unnamed positional argument at the provided index.
pub fn synthesized_name(index: usize) -> String {
    format!("arg{index}")
}

/// Parse an index out of a synthesized argument name.
pub fn synthesized_index(name: &str) -> Option<usize> {
    name.strip_prefix("arg")
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

/// Value kind of a named parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParamKind {
    /// Boolean switch without a value.
    Flag,

    /// Single value.
    #[default]
    Value,

    /// List of values.
    Multiple,
}

/// Named parameter declaration.
#[derive(Clone, Debug, Default)]
pub struct ParamSpec {
    /// Long flag name, without leading dashes.
    pub name: String,

    /// Optional short flag.
    pub short: Option<char>,

    /// Parameter description.
    pub description: String,

    /// Whether the parameter must be provided.
    pub required: bool,

    /// Value kind.
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Create new optional single-value parameter.
    pub fn value(name: &str, description: &str) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            ..Default::default()
        }
    }

    /// Create new boolean switch.
    pub fn flag(name: &str, description: &str) -> Self {
        Self {
            kind: ParamKind::Flag,
            ..Self::value(name, description)
        }
    }

    /// Create new list parameter.
    pub fn multiple(name: &str, description: &str) -> Self {
        Self {
            kind: ParamKind::Multiple,
            ..Self::value(name, description)
        }
    }

    /// Set a short flag.
    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Mark the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Declarative command description.
///
/// A node with subcommands is a router: it never executes a handler by itself,
/// and dispatch always continues into exactly one of its subcommands.
#[derive(Clone, Default)]
pub struct CommandNode {
    /// Primary command token.
    pub name: String,

    /// Alternative command tokens.
    pub aliases: Vec<String>,

    /// Command description.
    pub description: String,

    /// Positional arguments, in invocation order.
    pub arguments: Vec<ArgumentSpec>,

    /// Named parameters.
    pub params: Vec<ParamSpec>,

    /// Nested commands.
    pub subcommands: Vec<Arc<CommandNode>>,

    /// HTTP API exposure. Commands without it are available from the terminal only.
    pub api: Option<ApiMeta>,

    /// Default command handler.
    pub handler: Option<Handler>,
}

impl CommandNode {
    /// Create new command with the provided primary token.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Add an alternative token.
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_owned());
        self
    }

    /// Set the command description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    /// Append a positional argument.
    pub fn argument(mut self, argument: ArgumentSpec) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Add a named parameter.
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Append a nested command.
    pub fn subcommand(mut self, command: CommandNode) -> Self {
        self.subcommands.push(Arc::new(command));
        self
    }

    /// Expose the command over the HTTP API.
    pub fn api(mut self, api: ApiMeta) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the default handler.
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Check if the command routes to subcommands instead of executing a handler.
    pub fn is_router(&self) -> bool {
        !self.subcommands.is_empty()
    }

    /// Find the declaration of a named parameter.
    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Find the index of a positional argument by its name.
    pub fn argument_index(&self, name: &str) -> Option<usize> {
        self.arguments
            .iter()
            .position(|argument| argument.name.as_deref() == Some(name))
    }
}

impl Debug for CommandNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("arguments", &self.arguments)
            .field("params", &self.params)
            .field("subcommands", &self.subcommands)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

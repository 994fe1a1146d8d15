//! # Command dispatch
//!
//! Commands are described once, as a tree of [`CommandNode`] values, and executed
//! through two surfaces: the terminal front-end and the HTTP API. This crate contains
//! everything both surfaces share, so that a handler cannot tell which one invoked it.
//!
//! # Routes
//!
//! The [`routes`] module compiles a command tree into a flat [`RouteTable`]. Every
//! alias of every command becomes a path segment, and every positional argument that
//! isn't query-only becomes a `:name` placeholder. Path collisions are detected at
//! compilation time.
//!
//! # Call frames
//!
//! Both surfaces produce a [`CallFrame`] (ordered positional arguments and named
//! parameters). The terminal front-end builds it from parsed argv, while the
//! [`adapter`] module rebuilds it from path parameters, query and body of an HTTP
//! request.
//!
//! # Execution contexts
//!
//! Commands are executed against an immutable [`ExecutionContext`], bound to a single
//! chain. A request that names a different chain receives its own context from the
//! [`ContextResolver`], leaving the process default and other requests untouched.

#![deny(missing_docs)]

/// HTTP request to call frame adaptation.
pub mod adapter;

/// Command name and alias expansion.
pub mod alias;

/// Per-request execution contexts.
pub mod context;

/// Single execution entrypoint for both surfaces.
pub mod dispatcher;

/// Declarative command tree model.
pub mod node;

/// Command tree to HTTP route compilation.
pub mod routes;

pub use adapter::{adapt, AdaptError, CallFrame, Params};
pub use alias::{find_command, UnresolvedCommandError};
pub use context::{ContextError, ContextResolver, Environment, ExecutionContext};
pub use dispatcher::{invoke, CommandError, Dispatcher, Invocation, Surface, CHAIN_PARAM};
pub use node::{
    handler, ApiMeta, ArgumentSpec, CommandNode, Handler, HttpMethod, ParamKind, ParamSpec,
};
pub use routes::{compile, Route, RouteCompilationError, RouteTable};

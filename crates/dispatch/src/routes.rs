use std::{collections::HashMap, sync::Arc};

use derive_more::{Display, Error};
use tracing::debug;

use crate::{
    alias,
    node::{CommandNode, HttpMethod},
};

/// Two commands compile to the same route path.
#[derive(Debug, Display, Error)]
#[display(fmt = "route `{}` of `{}` collides with `{}`", path, command, existing)]
pub struct RouteCompilationError {
    /// Colliding route path.
    pub path: String,

    /// Command that produced the colliding route.
    pub command: String,

    /// Command that registered the path first.
    pub existing: String,
}

/// A single compiled HTTP route.
#[derive(Clone, Debug)]
pub struct Route {
    /// Route path pattern, made of literal and `:name` segments.
    pub path: String,

    /// HTTP method the route responds to.
    pub method: HttpMethod,

    /// Leaf command the route is bound to.
    pub command: Arc<CommandNode>,

    /// Space-separated primary names of commands on the way to the leaf.
    pub command_path: String,
}

/// Immutable table of compiled routes.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compiled routes, in compilation order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Total count of compiled routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find a route by its exact path pattern.
    pub fn get(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.path == path)
    }
}

/// Compile command trees into a route table.
///
/// Every alias of a command produces a separate path segment, and every
/// non-query argument appends a `:name` placeholder. Router commands don't
/// produce routes themselves, while leaf commands produce one route per alias
/// if they are exposed over the HTTP API.
///
/// Placeholder names are not significant when detecting collisions, as the HTTP
/// router cannot tell `/a/:x` and `/a/:y` apart.
pub fn compile(roots: &[Arc<CommandNode>]) -> Result<RouteTable, RouteCompilationError> {
    let mut compiler = Compiler::default();

    for root in roots {
        compiler.visit(root, "", &[])?;
    }

    debug!(routes = compiler.routes.len(), "compiled command routes");

    Ok(RouteTable {
        routes: compiler.routes,
    })
}

#[derive(Default)]
struct Compiler {
    routes: Vec<Route>,

    /// Registered paths with placeholder names erased, mapped onto command paths.
    seen: HashMap<String, String>,
}

impl Compiler {
    fn visit(
        &mut self,
        command: &Arc<CommandNode>,
        base: &str,
        names: &[&str],
    ) -> Result<(), RouteCompilationError> {
        let mut names = names.to_vec();
        names.push(&command.name);

        for token in alias::tokens(command) {
            let mut path = format!("{base}/{token}");

            for (index, argument) in command.arguments.iter().enumerate() {
                if !argument.query_only {
                    path.push_str("/:");
                    path.push_str(&argument.key(index));
                }
            }

            if command.is_router() {
                for subcommand in &command.subcommands {
                    self.visit(subcommand, &path, &names)?;
                }
            } else if let Some(api) = &command.api {
                self.insert(Route {
                    path,
                    method: api.method,
                    command: command.clone(),
                    command_path: names.join(" "),
                })?;
            }
        }

        Ok(())
    }

    fn insert(&mut self, route: Route) -> Result<(), RouteCompilationError> {
        let shape = erase_placeholders(&route.path);

        if let Some(existing) = self.seen.get(&shape) {
            return Err(RouteCompilationError {
                path: route.path,
                command: route.command_path,
                existing: existing.clone(),
            });
        }

        self.seen.insert(shape, route.command_path.clone());
        self.routes.push(route);

        Ok(())
    }
}

fn erase_placeholders(path: &str) -> String {
    path.split('/')
        .map(|segment| if segment.starts_with(':') { ":" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

use std::sync::Arc;

use common::rpc::{ChainClient, ConnectError, ConnectionFactory};
use derive_more::{Display, Error, From};
use tracing::debug;

/// Environment a command is executed in.
///
/// Handlers use it to pick between interactive and server behaviour, e.g.
/// the terminal waits for a transaction receipt, while the API returns the
/// transaction hash right after the broadcast.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Environment {
    /// Interactive terminal invocation.
    #[display(fmt = "cli")]
    Cli,

    /// HTTP API request.
    #[display(fmt = "api")]
    Api,
}

/// Immutable binding of command execution to a single chain.
pub struct ExecutionContext {
    client: Arc<dyn ChainClient>,
    environment: Environment,
}

impl ExecutionContext {
    /// Create new context bound to the client's platform.
    pub fn new(client: Arc<dyn ChainClient>, environment: Environment) -> Self {
        Self {
            client,
            environment,
        }
    }

    /// Name of the platform this context is bound to.
    pub fn platform(&self) -> &str {
        self.client.platform()
    }

    /// Chain client of the bound platform.
    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// Execution environment.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Create a copy of this context with a different environment.
    ///
    /// The chain connection is shared between both contexts.
    pub fn with_environment(&self, environment: Environment) -> Self {
        Self {
            client: self.client.clone(),
            environment,
        }
    }
}

/// Errors that may occur during context resolution.
#[derive(Debug, Display, Error, From)]
pub enum ContextError {
    /// Unable to connect to the requested platform.
    Connect(ConnectError),
}

/// Resolver of per-request execution contexts.
pub struct ContextResolver {
    factory: Arc<dyn ConnectionFactory>,
}

impl ContextResolver {
    /// Create new resolver that uses the provided factory for new connections.
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }

    /// Get an execution context for the requested platform.
    ///
    /// If no platform was requested, or the default context is already bound to
    /// it, the default context itself is returned. Otherwise a new context is
    /// created, sharing the default context's environment.
    pub fn resolve(
        &self,
        requested: Option<&str>,
        default: &Arc<ExecutionContext>,
    ) -> Result<Arc<ExecutionContext>, ContextError> {
        match requested {
            Some(platform) if platform != default.platform() => {
                debug!(platform, "creating request execution context");

                let client = self.factory.connect(platform)?;

                Ok(Arc::new(ExecutionContext::new(
                    client,
                    default.environment(),
                )))
            }
            _ => Ok(default.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::rpc::{
        testing::{MockClient, MockConnections},
        ConnectError,
    };

    use super::{ContextError, ContextResolver, Environment, ExecutionContext};

    fn setup() -> (ContextResolver, Arc<ExecutionContext>) {
        let eth = Arc::new(MockClient::new("eth"));
        let polygon = Arc::new(MockClient::new("polygon"));

        let factory = MockConnections::new()
            .with_client(eth.clone())
            .with_client(polygon);

        let default = Arc::new(ExecutionContext::new(eth, Environment::Cli));

        (ContextResolver::new(Arc::new(factory)), default)
    }

    #[test]
    fn default_is_reused() {
        let (resolver, default) = setup();

        let context = resolver.resolve(None, &default).unwrap();
        assert!(Arc::ptr_eq(&context, &default));

        let context = resolver.resolve(Some("eth"), &default).unwrap();
        assert!(Arc::ptr_eq(&context, &default));
    }

    #[test]
    fn other_platform_is_isolated() {
        let (resolver, default) = setup();

        let context = resolver.resolve(Some("polygon"), &default).unwrap();

        assert_eq!(context.platform(), "polygon");
        assert_eq!(context.environment(), Environment::Cli);
        assert_eq!(default.platform(), "eth");
        assert!(!Arc::ptr_eq(&context, &default));
    }

    #[test]
    fn unknown_platform() {
        let (resolver, default) = setup();

        assert!(matches!(
            resolver.resolve(Some("solana"), &default),
            Err(ContextError::Connect(ConnectError::UnknownPlatform(_)))
        ));
    }

    #[test]
    fn environment_copy_shares_client() {
        let (_, default) = setup();

        let api = default.with_environment(Environment::Api);

        assert_eq!(api.environment(), Environment::Api);
        assert_eq!(default.environment(), Environment::Cli);
        assert!(Arc::ptr_eq(api.client(), default.client()));
    }
}

//! Chain commands available from both the terminal and the HTTP API.
//!
//! Every command defaults to the configured chain, which can be overridden
//! with the `chain` parameter.

mod block;
mod contract;
mod rpc;
mod tx;

/// Shared input parsing and output formatting helpers.
pub mod format;

use std::sync::Arc;

use common::rpc::methods::MethodTable;
use dispatch::{CommandNode, ParamSpec, CHAIN_PARAM};

/// Build the command tree.
pub fn tree() -> Vec<Arc<CommandNode>> {
    let methods = Arc::new(MethodTable::with_defaults());

    vec![
        Arc::new(contract::command()),
        Arc::new(block::command()),
        Arc::new(tx::command()),
        Arc::new(rpc::command(methods)),
    ]
}

/// Parameter that selects the chain a command is executed against.
pub fn chain_param() -> ParamSpec {
    ParamSpec::value(CHAIN_PARAM, "Platform name from the [chains] configuration")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use common::rpc::testing::MockClient;
    use dispatch::{
        find_command, invoke, CallFrame, CommandError, Environment, ExecutionContext, Surface,
    };
    use serde_json::{Map, Value};

    /// Run a command from the full tree against a mock client.
    pub async fn run(
        client: Arc<MockClient>,
        environment: Environment,
        tokens: &[&str],
        args: &[&str],
        params: Value,
    ) -> Result<Value, CommandError> {
        let (command, path) = find_command(&super::tree(), tokens)?;

        let mut frame = CallFrame::for_command(&command);
        for (index, arg) in args.iter().enumerate() {
            frame.set_arg(index, arg.to_string());
        }
        if let Value::Object(params) = params {
            frame.params = params;
        } else {
            frame.params = Map::new();
        }

        let surface = match environment {
            Environment::Cli => Surface::Terminal,
            Environment::Api => Surface::Http,
        };

        let context = Arc::new(ExecutionContext::new(client, environment));

        invoke(&command, frame, context, surface, &path.join(" ")).await
    }
}

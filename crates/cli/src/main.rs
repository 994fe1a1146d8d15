mod app;
mod output;
mod start;

use std::{io, sync::Arc};

use common::{config::Config, logging};
use dispatch::{CommandNode, Dispatcher, Environment, Surface};

/// Every command available from the terminal.
pub(crate) fn roots() -> Vec<Arc<CommandNode>> {
    let mut roots = commands::tree();
    roots.push(Arc::new(start::command()));
    roots
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    let roots = roots();
    let matches = app::build(&roots).get_matches();
    let selection = app::select(&roots, &matches)?;

    let config = Config::new(selection.globals.config.clone())?;

    logging::init(&config);

    let dispatcher = Dispatcher::from_config(&config.chains, Environment::Cli)?;

    let result = dispatcher
        .execute(
            &selection.command,
            &selection.path,
            selection.frame,
            Surface::Terminal,
        )
        .await?;

    output::write(&mut io::stdout().lock(), &result)?;

    Ok(())
}

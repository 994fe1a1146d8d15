use common::{config::Config, logging};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::new(None)?;

    logging::init(&config);

    server::serve(config, &commands::tree()).await
}

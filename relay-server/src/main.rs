use anyhow::Result;
use tracing::info;

use relay_server::{build, config, connect_store, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load()?;
    logging::init(config.log_format);

    let store = connect_store(&config).await?;
    info!(store = store.name(), "job store ready");

    let addr = config.addr();
    build(&config, store).listen(addr).await?;

    Ok(())
}

use std::sync::Arc;

use tfb_core::{api::MembershipClient, config::Config};

mod console;

#[tokio::main]
async fn main() -> Result<(), tfb_core::Error> {
    tfb_core::logging::init("tfb")?;

    let cfg = Arc::new(Config::load()?);
    let client = Arc::new(MembershipClient::from_config(&cfg.api)?);

    console::run(cfg, client)
        .await
        .map_err(|e| tfb_core::Error::External(format!("console adapter failed: {e}")))?;

    Ok(())
}

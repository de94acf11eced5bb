//! webca - certificate authority service and tools

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    webca_cli::run().await
}

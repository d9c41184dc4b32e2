//! Controller mirror daemon
//!
//! Runs the mirroring engine until a termination signal arrives.
//! No command-line flags; `RUST_LOG` controls diagnostic verbosity.

use anyhow::{Context, Result};
use tracing::info;

use padmirror::Engine;

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut engine = Engine::new().context("failed to start the mirroring engine")?;
    info!("mirroring engine up, waiting for controllers");
    engine.run().context("mirroring engine failed")?;

    Ok(())
}

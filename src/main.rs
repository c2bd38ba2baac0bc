//! Pharos Agent - Automated testnet activity driver
//!
//! Loads one or more wallets, connects to the Pharos testnet and runs the
//! configured action flow (faucet claim, staking, swaps, liquidity, mint,
//! transfer) for every account, each on its own task.

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

mod actions;
mod api;
mod chain;
mod config;
mod error;
mod tx;
mod wallet;

use actions::Orchestrator;
use chain::{ChainProvider, ChainRpc};
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Pharos Agent v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    info!(
        "Network: {} (chain {}), flow: {:?}",
        settings.network.name, settings.network.chain_id, settings.flow.actions
    );

    let signers = wallet::load_wallets(&settings.wallet, settings.network.chain_id)?;
    info!("Loaded {} wallet(s)", signers.len());

    let rpc: Arc<dyn ChainRpc> = Arc::new(ChainProvider::new(
        &settings.network.rpc_url,
        settings.network.chain_id,
    )?);

    let mut handles = Vec::with_capacity(signers.len());
    for signer in signers {
        let settings = settings.clone();
        let rpc = rpc.clone();
        handles.push(tokio::spawn(async move {
            let address = ethers::signers::Signer::address(&signer);
            match Orchestrator::new(settings, signer, rpc).await {
                Ok(mut session) => session.run().await,
                Err(e) => {
                    error!("[{:?}] Session setup failed: {}", address, e);
                    false
                }
            }
        }));
    }

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for outcome in join_all(handles).await {
        match outcome {
            Ok(true) => succeeded += 1,
            Ok(false) => failed += 1,
            Err(e) => {
                error!("Account task panicked: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        warn!("Finished: {} account(s) ok, {} with failures", succeeded, failed);
    } else {
        info!("Finished: all {} account(s) ok", succeeded);
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pharos_agent=debug,hyper=warn,reqwest=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

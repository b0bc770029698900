//! Supervisor: one engine task per instrument, cooperative shutdown.

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::watch;
use tracing::{error, info};

use crate::analyzer;
use crate::api::FuturesClient;
use crate::engine::{KnifeEngine, SwingEngine};
use crate::models::StrategyMode;
use crate::retry::RetryPolicy;
use crate::trading::{OrderController, TradeConfig};

pub struct Supervisor {
    client: Arc<FuturesClient>,
    config: TradeConfig,
    retry: RetryPolicy,
}

impl Supervisor {
    pub fn new(client: FuturesClient, config: TradeConfig, retry: RetryPolicy) -> Self {
        Self {
            client: Arc::new(client),
            config,
            retry,
        }
    }

    /// Spawn an engine per USDT instrument and run until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let symbols = analyzer::instrument_universe(&self.client).await?;
        if symbols.is_empty() {
            bail!("no instruments found in the exchange universe");
        }
        info!(
            instruments = symbols.len(),
            mode = %self.config.mode,
            "starting engines"
        );

        let controller = Arc::new(OrderController::new(
            Arc::clone(&self.client),
            self.config.clone(),
            self.retry.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });

        let mut handles = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let handle = match self.config.mode {
                StrategyMode::Swing => tokio::spawn(
                    SwingEngine::new(
                        symbol.clone(),
                        self.config.clone(),
                        Arc::clone(&self.client),
                        Arc::clone(&controller),
                        self.retry.clone(),
                        shutdown_rx.clone(),
                    )
                    .run(),
                ),
                StrategyMode::KnifeCatch => tokio::spawn(
                    KnifeEngine::new(
                        symbol.clone(),
                        self.config.clone(),
                        Arc::clone(&self.client),
                        Arc::clone(&controller),
                        self.retry.clone(),
                        shutdown_rx.clone(),
                    )
                    .run(),
                ),
            };
            handles.push((symbol, handle));
        }

        for (symbol, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(symbol = %symbol, error = %err, "engine exited with error"),
                Err(err) => error!(symbol = %symbol, error = %err, "engine task panicked"),
            }
        }
        info!("all engines stopped");
        Ok(())
    }
}

//! Pump-fade trading bot for Binance USDT-M futures.
//!
//! Watches every USDT instrument for pump patterns and opens confirmed
//! short positions, in one of two modes: swing (enter on rollback) or
//! knife-catch (enter on stabilization inside a stop diapason).

mod analyzer;
mod api;
mod engine;
mod models;
mod retry;
mod supervisor;
mod trading;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::FuturesClient;
use crate::models::{StrategyMode, Timeframe};
use crate::retry::RetryPolicy;
use crate::supervisor::Supervisor;
use crate::trading::TradeConfig;

#[derive(Parser)]
#[command(name = "pumpfade", about = "Pump-fade short bot for USDT-M futures", version)]
struct Cli {
    /// Log level filter when RUST_LOG is unset
    #[arg(long, default_value = "info", env = "PUMPFADE_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot across the full instrument universe
    Run {
        /// Strategy mode: swing or knife
        #[arg(long, default_value = "swing", env = "PUMPFADE_MODE")]
        mode: StrategyMode,

        /// Signal timeframe: 1m, 5m, or 15m
        #[arg(long, default_value = "1m", env = "PUMPFADE_TIMEFRAME")]
        timeframe: Timeframe,

        /// Pump height above the reference level, percent
        #[arg(long, default_value_t = 1.0, env = "PUMPFADE_PUMP_HEIGHT")]
        pump_height: f64,

        /// Risk budget per trade, USDT
        #[arg(long, default_value_t = dec!(1), env = "PUMPFADE_RISK_USDT")]
        risk_usdt: Decimal,

        /// Assumed account leverage
        #[arg(long, default_value_t = 20, env = "PUMPFADE_LEVERAGE")]
        leverage: u32,

        /// Maximum deposit load, percent
        #[arg(long, default_value_t = dec!(70), env = "PUMPFADE_DEPO_LOAD")]
        depo_load: Decimal,

        /// Minimum reference-to-current volume ratio
        #[arg(long, default_value_t = 3.0, env = "PUMPFADE_VOLUME_RATIO")]
        volume_ratio: f64,

        /// Stop loss distance, percent
        #[arg(long, default_value_t = 1.0, env = "PUMPFADE_STOP_LOSS")]
        stop_loss: f64,

        /// Take profit distance, percent
        #[arg(long, default_value_t = 1.0, env = "PUMPFADE_TAKE_PROFIT")]
        take_profit: f64,

        /// Swing: rollback share of the pump rise, percent
        #[arg(long, default_value_t = 10.0, env = "PUMPFADE_ROLLBACK")]
        rollback: f64,

        /// Knife: stop diapason width, percent of price
        #[arg(long, default_value_t = 0.2, env = "PUMPFADE_STOP_DIAP")]
        stop_diap: f64,

        /// Knife: dwell time inside the diapason, seconds
        #[arg(long, default_value_t = 2, env = "PUMPFADE_STOP_DIAP_SECS")]
        stop_diap_secs: u64,
    },
    /// Print the USDT instrument universe
    Symbols,
    /// Print the account gates view: balance, margin, load
    Account,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            mode,
            timeframe,
            pump_height,
            risk_usdt,
            leverage,
            depo_load,
            volume_ratio,
            stop_loss,
            take_profit,
            rollback,
            stop_diap,
            stop_diap_secs,
        } => {
            let config = TradeConfig {
                timeframe,
                pump_height_pct: pump_height,
                stop_loss_pct: stop_loss,
                take_profit_pct: take_profit,
                risk_usdt,
                leverage,
                depo_load_pct: depo_load,
                volume_ratio,
                mode,
                rollback_pct: rollback,
                stop_diap_pct: stop_diap,
                stop_diap_secs,
            };
            info!(mode = %config.mode, timeframe = %config.timeframe, "starting pumpfade");
            let client = FuturesClient::from_env()?;
            Supervisor::new(client, config, RetryPolicy::default()).run().await
        }
        Commands::Symbols => {
            let client = FuturesClient::from_env()?;
            let symbols = analyzer::instrument_universe(&client).await?;
            for symbol in &symbols {
                println!("{symbol}");
            }
            println!("{} instruments", symbols.len());
            Ok(())
        }
        Commands::Account => {
            let client = FuturesClient::from_env()?;
            let account = client.account().await?;
            let load = if account.total_margin_balance > Decimal::ZERO {
                (account.total_maint_margin / (account.total_margin_balance * dec!(0.01)))
                    .round_dp(2)
            } else {
                Decimal::ZERO
            };
            println!("can trade:      {}", account.can_trade);
            println!("margin balance: {} USDT", account.total_margin_balance);
            println!("maint margin:   {} USDT", account.total_maint_margin);
            println!("deposit load:   {load}%");
            Ok(())
        }
    }
}

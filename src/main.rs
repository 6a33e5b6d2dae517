// src/main.rs
use std::sync::Arc;
use tokio::signal::ctrl_c;

use trade_terminal::config::Config;
use trade_terminal::domain::errors::{AppError, AppResult};
use trade_terminal::domain::point::Point;
use trade_terminal::exchange::client::Connector;
use trade_terminal::exchange::paper::PaperConnector;
use trade_terminal::market_data::indicators::MovingAverage;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration: a JSON file when given, the environment otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting trade_terminal v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Using {} connector in {:?} mode",
        config.connector.name,
        config.connector.mode
    );

    if config.connector.name != "paper" {
        return Err(AppError::Config(format!(
            "Unsupported connector: {}",
            config.connector.name
        )));
    }

    let account = Arc::new(config.account.build());
    let connector = PaperConnector::new(account.clone()).with_mode(config.connector.mode);

    for instrument in &config.account.instruments {
        connector.processor().add_indicator(
            &instrument.name,
            Box::new(MovingAverage::simple("sma20", 20)?),
        );
    }

    // Report every position change
    account.active_positions.item_stream().subscribe(|change| {
        if let Some(position) = &change.next {
            let gain_loss = position.gain_loss();
            log::info!(
                "{:?} {} {:?} @ {:?}: gain-loss {:?} (min {:?}, max {:?})",
                change.action,
                position.instrument().unwrap_or("?"),
                position.volume(),
                position.open_price,
                gain_loss.gain_loss,
                gain_loss.gain_loss_min,
                gain_loss.gain_loss_max
            );
        }
    });

    // Order updates are logged off the emitting thread
    let (_, mut orders) = connector.order_stream().subscribe_channel();
    tokio::spawn(async move {
        while let Some(change) = orders.recv().await {
            if let Some(order) = change.next {
                log::info!("Order {} is {:?}", order.id, order.status());
            }
        }
    });

    log::info!("Connecting...");
    connector.connect().await?;
    connector.subscribe().await?;
    log::info!("Connected!");

    if let Some(path) = &config.connector.replay_file {
        let applied = replay(&connector, path)?;
        log::info!("Replayed {} points from {}", applied, path);
    }

    log::info!(
        "Balance {:?}, equity estimate {:?}",
        account.balance(),
        account.equity_estimate()
    );

    log::info!("Press Ctrl-C to stop");
    ctrl_c().await?;

    log::info!("Shutting down...");
    connector.unsubscribe().await?;
    connector.disconnect().await?;

    Ok(())
}

/// Push every point of a JSON array file through the connector
fn replay(connector: &PaperConnector, path: &str) -> AppResult<usize> {
    let contents = std::fs::read_to_string(path)?;
    let points: Vec<Point> = serde_json::from_str(&contents)?;

    let mut applied = 0;
    for point in points {
        match connector.push_point(point) {
            Ok(_) => applied += 1,
            Err(e) => log::warn!("Dropped point: {}", e),
        }
    }

    Ok(applied)
}

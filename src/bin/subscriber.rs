//! Stockscan Subscriber
//!
//! Listens for batch completion events, drops redelivered ones and optionally keeps a local copy
//! of every summary in PostgreSQL.

use dotenvy::dotenv;
use std::sync::Arc;
use stockscan::batch::analyze;
use stockscan::config::{self, Settings};
use stockscan::db::{BatchStore, PostgresBatchStore};
use stockscan::logging;
use stockscan::models::batch::BatchEvent;
use stockscan::notify::BatchSubscriber;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let settings = Settings::from_env()?;
    info!(channel = %settings.pubsub_channel, "Starting Stockscan Subscriber");

    let store: Option<Arc<dyn BatchStore>> = match config::get_database_url() {
        Some(url) => Some(Arc::new(PostgresBatchStore::connect(&url).await?)),
        None => None,
    };

    let mut subscriber = BatchSubscriber::new(&config::get_pubsub_url(), &settings.pubsub_channel)?;
    subscriber
        .run(|event: BatchEvent| {
            let store = store.clone();
            async move {
                let summary = event.summary();
                let analysis = analyze(summary);
                info!(
                    batch_id = %summary.batch_id,
                    status = summary.status.as_str(),
                    results = summary.total_results,
                    failed = summary.summary.failed_tasks,
                    best_strategy = analysis.best_strategy.as_ref().map(|s| s.strategy_id.as_str()),
                    grade = analysis.best_strategy.as_ref().map(|s| s.performance_grade.as_str()),
                    "Batch completed"
                );

                if let Some(store) = store {
                    match store.save(summary).await {
                        Ok(true) => info!(batch_id = %summary.batch_id, "Stored local copy"),
                        Ok(false) => {}
                        Err(e) => warn!(batch_id = %summary.batch_id, error = %e, "Failed to store local copy"),
                    }
                }
            }
        })
        .await?;

    warn!("Subscription closed");
    Ok(())
}

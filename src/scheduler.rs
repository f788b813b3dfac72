use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::config::CategoryConfig;
use crate::runner::CategoryRunner;

/// Spawn one periodic task per category. The first run starts immediately;
/// a run that overruns its interval delays the next tick instead of stacking.
pub fn spawn(runner: Arc<CategoryRunner>, categories: Vec<CategoryConfig>) -> Vec<JoinHandle<()>> {
    categories
        .into_iter()
        .map(|category| {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move {
                let mut ticker = interval(category.interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    runner.run(&category).await;
                }
            })
        })
        .collect()
}

/// Run the schedule until `shutdown` resolves, then stop every category task.
pub async fn run_until<F>(runner: Arc<CategoryRunner>, categories: Vec<CategoryConfig>, shutdown: F)
where
    F: Future<Output = ()>,
{
    for category in &categories {
        info!(
            category = %category.name,
            every_minutes = category.interval_minutes,
            "scheduled category"
        );
    }
    let handles = spawn(runner, categories);
    shutdown.await;
    info!("shutting down scheduler");
    for handle in handles {
        handle.abort();
    }
}

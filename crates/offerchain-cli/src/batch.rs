//! Directory batch: every packet reconciled on the blocking pool, concurrently.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use offerchain_engine::{ReconciledTransaction, Reconciler};

use crate::load::load_packet;

pub struct BatchOutcome {
    pub path: PathBuf,
    pub result: anyhow::Result<ReconciledTransaction>,
}

pub struct BatchStats {
    pub total: usize,
    pub failed: usize,
    pub needs_review: usize,
    pub elapsed_secs: f64,
}

/// Reconcile `files` independently. Results come back in input order; one
/// packet failing does not affect the others.
pub async fn run_batch(reconciler: Arc<Reconciler>, files: Vec<PathBuf>) -> Vec<BatchOutcome> {
    let tasks = files.into_iter().map(|path| {
        let reconciler = Arc::clone(&reconciler);
        async move {
            let task_path = path.clone();
            let joined = tokio::task::spawn_blocking(move || -> anyhow::Result<ReconciledTransaction> {
                let packet = load_packet(&task_path)?;
                Ok(reconciler.reconcile(&packet)?)
            })
            .await;
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("worker failed: {e}")),
            };
            BatchOutcome { path, result }
        }
    });
    join_all(tasks).await
}

pub fn stats(outcomes: &[BatchOutcome], started: Instant) -> BatchStats {
    BatchStats {
        total: outcomes.len(),
        failed: outcomes.iter().filter(|o| o.result.is_err()).count(),
        needs_review: outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .filter(|t| t.status == offerchain_engine::ReviewStatus::NeedsReview)
            .count(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    }
}

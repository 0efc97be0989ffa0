//! Runs the synchronous pipeline off the async executor.
//!
//! Insertion is CPU-bound (archive parsing, image decoding), so it goes to
//! tokio's blocking pool. When the deadline passes the blocking task is
//! abandoned: its result is dropped whenever it finishes, and since nothing
//! outside the request was mutated there is nothing to roll back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::document::{SourceDocument, TransformedDocument};
use crate::error::{CoverError, Result};
use crate::pipeline::Pipeline;

/// Run `pipeline` on `source` in a blocking worker, failing with
/// [`CoverError::TransformTimeout`] once `timeout` elapses.
pub async fn transform_with_timeout(
    pipeline: Arc<Pipeline>,
    source: SourceDocument,
    timeout: Duration,
) -> Result<TransformedDocument> {
    let started = Instant::now();
    let format = source.format();
    let worker = tokio::task::spawn_blocking(move || pipeline.run(&source));

    match tokio::time::timeout(timeout, worker).await {
        Ok(Ok(result)) => {
            log::debug!("{} transformation finished in {:?}", format, started.elapsed());
            result
        }
        Ok(Err(join_err)) => {
            log::error!("{} transformation worker failed: {}", format, join_err);
            Err(CoverError::Internal(format!("worker failed: {}", join_err)))
        }
        Err(_) => {
            log::warn!("{} transformation exceeded {:?}; abandoning", format, timeout);
            Err(CoverError::TransformTimeout(timeout.as_millis()))
        }
    }
}

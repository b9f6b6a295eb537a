// SPDX-License-Identifier: MIT

//! Polling worker pool
//!
//! Each loop fetches a ready task, waits out its simulated cost, computes it
//! and submits the result. A task with no finite result is reported as failed.

pub mod source;

pub use source::{HttpTaskSource, TaskSource};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::common::Result;
use crate::engine::config::WorkerConfig;
use crate::engine::model::Operator;

/// What one polling step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Computed,
    /// The task had no finite result and was reported as failed
    Failed,
    Idle,
}

/// Fetch, compute and submit at most one task
pub async fn process_next(source: &dyn TaskSource) -> Result<Step> {
    let Some(task) = source.next_task().await? else {
        return Ok(Step::Idle);
    };

    log::debug!(
        "Computing task {}: {} {} {}",
        task.id,
        task.arg1,
        task.operation,
        task.arg2
    );
    if task.operation_time_ms > 0 {
        tokio::time::sleep(Duration::from_millis(task.operation_time_ms)).await;
    }

    let result = task.operation.apply(task.arg1, task.arg2);
    if !result.is_finite() {
        let reason = if task.operation == Operator::Divide && task.arg2 == 0.0 {
            "division by zero"
        } else {
            "result out of range"
        };
        log::warn!(
            "Task {} ({} {} {}) failed: {}",
            task.id,
            task.arg1,
            task.operation,
            task.arg2,
            reason
        );
        source.fail(&task.id, reason).await?;
        return Ok(Step::Failed);
    }

    source.submit(&task.id, result).await?;
    log::debug!("Submitted {} for task {}", result, task.id);
    Ok(Step::Computed)
}

pub struct Worker {
    source: Arc<dyn TaskSource>,
    computing_power: usize,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(source: Arc<dyn TaskSource>, computing_power: usize, poll_interval: Duration) -> Self {
        Self {
            source,
            computing_power: computing_power.max(1),
            poll_interval,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let source = HttpTaskSource::new(&config.orchestrator_url)?;
        log::info!("Polling {}", source.endpoint());
        Ok(Self::new(
            Arc::new(source),
            config.computing_power,
            Duration::from_millis(config.poll_interval_ms),
        ))
    }

    /// Run every loop until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);

        let handles: Vec<_> = (0..self.computing_power)
            .map(|slot| {
                let source = self.source.clone();
                let poll_interval = self.poll_interval;
                let stop = stop_rx.clone();
                tokio::spawn(poll_loop(slot, source, poll_interval, stop))
            })
            .collect();
        log::info!("Started {} worker loop(s)", handles.len());

        shutdown.await;
        log::info!("Stopping worker loops");
        let _ = stop_tx.send(true);

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                log::error!("Worker loop panicked: {}", e);
            }
        }
        Ok(())
    }
}

async fn poll_loop(
    slot: usize,
    source: Arc<dyn TaskSource>,
    poll_interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let step = tokio::select! {
            _ = stop.changed() => break,
            step = process_next(source.as_ref()) => step,
        };

        let idle = match step {
            Ok(Step::Computed) | Ok(Step::Failed) => false,
            Ok(Step::Idle) => true,
            Err(e) => {
                log::warn!("Worker {}: {}", slot, e);
                true
            }
        };

        if idle {
            tokio::select! {
                _ = stop.changed() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
    log::debug!("Worker {} stopped", slot);
}

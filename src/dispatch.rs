//! Bounded-concurrency batch dispatcher.
//!
//! Every task gets exactly one [`TaskOutcome`], in input order. A failing or
//! panicking worker only affects its own outcome. At most `concurrency`
//! workers run at once; a finished worker's permit is handed straight to the
//! next queued task.
//!
//! All tasks are driven from the caller's task, so workers do not need to be
//! `Send` or `'static` and can borrow shared state such as the router.

use crate::error::{Failure, FailureKind};
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::Semaphore;
use tracing::{debug, error};

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 20;

/// Clamps a caller-supplied concurrency into `MIN_CONCURRENCY..=MAX_CONCURRENCY`.
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Terminal result of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome<T> {
    Success { value: T },
    Failure { reason: Failure },
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            TaskOutcome::Failure { reason } => Some(reason),
            TaskOutcome::Success { .. } => None,
        }
    }
}

/// Runs `worker` over every task with at most `concurrency` in flight.
///
/// Resolves once every task has settled. The returned vector has one entry
/// per task, at the task's input index.
pub async fn run<T, R, E, F, Fut>(tasks: Vec<T>, concurrency: usize, worker: F) -> Vec<TaskOutcome<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Into<Failure>,
{
    if tasks.is_empty() {
        return Vec::new();
    }

    let limit = clamp_concurrency(concurrency);
    let total = tasks.len();
    debug!("Dispatching {} tasks with concurrency {}", total, limit);

    let permits = Semaphore::new(limit);
    let permits = &permits;
    let worker = &worker;

    let pending = tasks.into_iter().enumerate().map(|(index, task)| async move {
        // Never closed, so acquire cannot fail
        let _permit = permits.acquire().await.ok();

        // The worker is only invoked once a permit is held
        let settled = AssertUnwindSafe(async move { worker(task).await }).catch_unwind().await;

        match settled {
            Ok(Ok(value)) => TaskOutcome::Success { value },
            Ok(Err(err)) => TaskOutcome::Failure { reason: err.into() },
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Task {} panicked: {}", index, message);
                TaskOutcome::Failure {
                    reason: Failure::new(FailureKind::WorkerPanic, format!("worker panicked: {}", message)),
                }
            }
        }
    });

    let outcomes = join_all(pending).await;
    debug!(
        "Dispatch finished: {} of {} tasks succeeded",
        outcomes.iter().filter(|o| o.is_success()).count(),
        total
    );
    outcomes
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

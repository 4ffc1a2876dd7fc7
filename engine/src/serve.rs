// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Serve/stop coordination shared by every transport.

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::error::ServeError;

/// Runs `serve` in the background and races it against `ctx`.
///
/// If `serve` finishes first its result is returned as is and `stop` is never
/// called. If `ctx` is cancelled first, `stop` receives the running task and
/// its result becomes the outcome; it is expected to signal the transport and
/// wait for the task to wind down.
///
/// Dropping the returned future aborts the serve task.
pub async fn serve_with_context<S, Stop, StopFut>(
    ctx: &CancellationToken,
    serve: S,
    stop: Stop,
) -> Result<(), ServeError>
where
    S: Future<Output = Result<(), ServeError>> + Send + 'static,
    Stop: FnOnce(AbortOnDropHandle<Result<(), ServeError>>) -> StopFut,
    StopFut: Future<Output = Result<(), ServeError>>,
{
    let mut task = AbortOnDropHandle::new(tokio::spawn(serve));

    tokio::select! {
        result = &mut task => return result?,
        _ = ctx.cancelled() => {}
    }

    stop(task).await
}

/// A set of serve loops sharing one cancellation scope.
///
/// The first task to finish, whatever its outcome, cancels the scope so that
/// its siblings shut down too. [`TaskGroup::wait`] returns the first error.
#[derive(Debug)]
pub struct TaskGroup {
    token: CancellationToken,
    tasks: JoinSet<Result<(), ServeError>>,
}

impl TaskGroup {
    /// Creates a group whose scope is cancelled along with `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tasks: JoinSet::new(),
        }
    }

    /// The group scope, to be handed to each task.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), ServeError>> + Send + 'static,
    {
        let token = self.token.clone();
        self.tasks.spawn(async move {
            let result = task.await;
            token.cancel();
            result
        });
    }

    /// Waits for every task and returns the first error, if any.
    pub async fn wait(mut self) -> Result<(), ServeError> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            // A panicking task never reached its own cancel call.
            self.token.cancel();
            let result = joined.map_err(ServeError::from).and_then(|result| result);
            if let Err(e) = result
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

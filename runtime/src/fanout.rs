//! Parallel fan-out over registry snapshots.
//!
//! Participants are split into at most `width` chunks; each chunk runs on
//! Tokio's blocking pool and the caller awaits all of them before returning.
//! Every participant call is wrapped in `catch_unwind`, so one panicking
//! participant never prevents its siblings from running.

use futures::future::join_all;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Result of one participant call; `Err` carries the panic message
pub(crate) type Outcome<R> = Result<R, String>;

/// Invoke `call` on every participant in parallel and wait for all of them.
///
/// Outcomes are returned in participant order, paired with the participant.
pub(crate) async fn fan_out<T, R, F>(
    participants: Vec<Arc<T>>,
    width: usize,
    call: F,
) -> Vec<(Arc<T>, Outcome<R>)>
where
    T: ?Sized + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    if participants.is_empty() {
        return Vec::new();
    }

    let total = participants.len();
    let chunk_len = total.div_ceil(width.max(1));
    let call = Arc::new(call);

    let tasks = participants.chunks(chunk_len).map(|chunk| {
        let chunk = chunk.to_vec();
        let call = Arc::clone(&call);
        tokio::task::spawn_blocking(move || {
            chunk
                .into_iter()
                .map(|participant| {
                    let outcome = catch_unwind(AssertUnwindSafe(|| (*call)(&*participant)))
                        .map_err(|payload| panic_message(payload.as_ref()));
                    (participant, outcome)
                })
                .collect::<Vec<_>>()
        })
    });

    let mut outcomes = Vec::with_capacity(total);
    for joined in join_all(tasks).await {
        match joined {
            Ok(batch) => outcomes.extend(batch),
            // Only reachable when the runtime is shutting down
            Err(error) => tracing::error!(error = %error, "Fan-out task did not complete"),
        }
    }
    outcomes
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

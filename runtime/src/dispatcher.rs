//! FIFO action queue with a single background worker.
//!
//! The [`Dispatcher`] serializes queued actions: one worker task pulls them
//! off the queue and awaits the handler for each before pulling the next,
//! so handlers observe actions in exact submission order.
//!
//! # Stop semantics
//!
//! [`Dispatcher::stop`] lets the in-flight handler finish, then the worker
//! stops pulling. Actions still queued stay in the queue; once the worker
//! has exited ([`Dispatcher::stopped`]) they can be taken out with
//! [`Dispatcher::drain_pending`]. A stopped dispatcher can be started again
//! and resumes with whatever is still queued.

use crate::StoreError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;

/// Callback invoked by the worker once per queued item
pub type Handler<A> = Arc<dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync>;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle of the dispatcher's worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Never started
    Idle,
    /// Accepting and processing actions
    Running,
    /// Stopped; rejects new actions
    Stopped,
}

enum QueueSender<A> {
    Unbounded(mpsc::UnboundedSender<A>),
    Bounded(mpsc::Sender<A>, usize),
}

enum QueueReceiver<A> {
    Unbounded(mpsc::UnboundedReceiver<A>),
    Bounded(mpsc::Receiver<A>),
}

impl<A> QueueReceiver<A> {
    async fn recv(&mut self) -> Option<A> {
        match self {
            Self::Unbounded(rx) => rx.recv().await,
            Self::Bounded(rx) => rx.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<A> {
        match self {
            Self::Unbounded(rx) => rx.try_recv().ok(),
            Self::Bounded(rx) => rx.try_recv().ok(),
        }
    }
}

/// FIFO queue plus a single worker that drains it
pub struct Dispatcher<A> {
    sender: QueueSender<A>,
    receiver: Arc<AsyncMutex<QueueReceiver<A>>>,
    handler: Handler<A>,
    state: AtomicU8,
    stop_signal: watch::Sender<bool>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<A> Dispatcher<A> {
    /// Current worker lifecycle state
    #[must_use]
    pub fn state(&self) -> WorkerState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => WorkerState::Running,
            STOPPED => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }

    /// Number of actions queued or in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

impl<A: Send + 'static> Dispatcher<A> {
    /// Create an idle dispatcher
    ///
    /// The worker does not run until [`start`](Self::start) is called.
    ///
    /// # Arguments
    ///
    /// - `capacity`: Bound on queued actions; `None` leaves the queue unbounded
    /// - `handler`: Awaited by the worker once per action, in submission order
    ///
    /// # Returns
    ///
    /// A dispatcher in [`WorkerState::Idle`]
    #[must_use]
    pub fn new(capacity: Option<usize>, handler: Handler<A>) -> Self {
        let (sender, receiver) = match capacity {
            Some(capacity) => {
                let capacity = capacity.max(1);
                let (tx, rx) = mpsc::channel(capacity);
                (QueueSender::Bounded(tx, capacity), QueueReceiver::Bounded(rx))
            },
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
            },
        };
        let (stop_signal, _) = watch::channel(false);

        Self {
            sender,
            receiver: Arc::new(AsyncMutex::new(receiver)),
            handler,
            state: AtomicU8::new(IDLE),
            stop_signal,
            pending: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            worker: Mutex::new(None),
        }
    }

    /// Start the worker on the current Tokio runtime
    ///
    /// Starting a running dispatcher is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRuntime`] when called outside a Tokio runtime.
    pub fn start(&self) -> Result<(), StoreError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state.load(Ordering::Acquire) == RUNNING {
            return Ok(());
        }

        self.stop_signal.send_replace(false);
        let task = run_worker(
            Arc::clone(&self.receiver),
            Arc::clone(&self.handler),
            self.stop_signal.subscribe(),
            Arc::clone(&self.pending),
            Arc::clone(&self.idle),
        );
        *worker = Some(runtime.spawn(task));
        self.state.store(RUNNING, Ordering::Release);

        tracing::info!("Dispatcher worker started");
        Ok(())
    }

    /// Ask the worker to stop after the in-flight action
    ///
    /// Returns `false` if the worker was not running.
    pub fn stop(&self) -> bool {
        let stopped = self
            .state
            .compare_exchange(RUNNING, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if stopped {
            self.stop_signal.send_replace(true);
            self.idle.notify_waiters();
            tracing::info!(
                pending = self.pending.load(Ordering::Acquire),
                "Dispatcher worker stopping"
            );
        }
        stopped
    }

    /// Wait until the worker task has exited
    ///
    /// Returns immediately if no worker was ever started. Must not be awaited
    /// from inside the handler.
    pub async fn stopped(&self) {
        let task = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            if let Err(error) = task.await {
                tracing::error!(error = %error, "Dispatcher worker ended abnormally");
            }
        }
    }

    /// Append an action to the queue; never blocks
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotStarted`] before the first [`start`](Self::start)
    /// - [`StoreError::Stopped`] after [`stop`](Self::stop)
    /// - [`StoreError::QueueFull`] when a bounded queue has no room
    pub fn enqueue(&self, action: A) -> Result<(), StoreError> {
        match self.state.load(Ordering::Acquire) {
            IDLE => return Err(StoreError::NotStarted),
            STOPPED => return Err(StoreError::Stopped),
            _ => {},
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        let sent = match &self.sender {
            QueueSender::Unbounded(tx) => tx.send(action).map_err(|_| StoreError::Stopped),
            QueueSender::Bounded(tx, capacity) => tx.try_send(action).map_err(|error| match error {
                mpsc::error::TrySendError::Full(_) => StoreError::QueueFull {
                    capacity: *capacity,
                },
                mpsc::error::TrySendError::Closed(_) => StoreError::Stopped,
            }),
        };

        if sent.is_err() {
            self.release_one();
        }
        sent
    }

    /// Wait until every queued action has been handled, or the worker stops
    ///
    /// Must not be awaited from inside the handler.
    pub async fn flush(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 || self.state() != WorkerState::Running {
                return;
            }
            notified.await;
        }
    }

    /// Remove and return still-queued actions without blocking
    ///
    /// Returns an empty list while a worker holds the queue; call it after
    /// [`stopped`](Self::stopped).
    pub fn drain_pending(&self) -> Vec<A> {
        let Ok(mut receiver) = self.receiver.try_lock() else {
            tracing::debug!("Queue is held by a running worker, nothing drained");
            return Vec::new();
        };

        let mut drained = Vec::new();
        while let Some(action) = receiver.try_recv() {
            drained.push(action);
            self.release_one();
        }

        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Drained undelivered actions");
        }
        drained
    }

    fn release_one(&self) {
        release(&self.pending, &self.idle);
    }
}

fn release(pending: &AtomicUsize, idle: &Notify) {
    let left = pending.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
    // Queue depths stay far below 2^52
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!("statecraft_queue_depth").set(left as f64);
    if left == 0 {
        idle.notify_waiters();
    }
}

async fn run_worker<A>(
    receiver: Arc<AsyncMutex<QueueReceiver<A>>>,
    handler: Handler<A>,
    mut stop: watch::Receiver<bool>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
) where
    A: Send + 'static,
{
    // A previous worker may still be finishing its in-flight action
    let mut receiver = receiver.lock().await;
    tracing::debug!("Dispatcher worker acquired the queue");

    loop {
        if *stop.borrow_and_update() {
            break;
        }

        let action = tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            action = receiver.recv() => match action {
                Some(action) => action,
                None => break,
            },
        };

        if AssertUnwindSafe(handler(action)).catch_unwind().await.is_err() {
            tracing::error!("Dispatcher handler panicked; continuing with next action");
        }
        release(&pending, &idle);
    }

    idle.notify_waiters();
    tracing::info!("Dispatcher worker exited");
}

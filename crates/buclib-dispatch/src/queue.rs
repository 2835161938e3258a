//! Single-worker FIFO dispatch queue.
//!
//! The queue is either idle or busy. Submitting to an idle queue spawns a
//! worker task on the current tokio runtime; submitting to a busy queue
//! appends to the backlog. The worker runs one write/read exchange at a time,
//! delivers the parsed result, and then pulls the next record from the
//! backlog itself. It exits, returning the queue to idle, once the backlog
//! is empty.
//!
//! The busy flag, backlog and in-flight marker live behind one mutex, and the
//! busy-to-idle transition happens under that same lock, so a record is
//! either picked up by the running worker or starts a new one. Never both,
//! never neither.
//!
//! Each exchange runs on its own task. A panic inside an adapter or the
//! parser becomes an `Error: ...` result for that record and the worker
//! carries on with the backlog.

use std::any::Any;
use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, broadcast};
use tracing::debug;

use buclib_core::error::Result;
use buclib_core::transport::Transport;
use buclib_core::types::{CommandKind, CommandResult};

use crate::record::CommandRecord;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Delivered when a command is submitted with no transport selected.
pub const NO_CONNECTION: &str = "Error: No connection";

/// Delivered when the worker task cannot be started.
pub const INTERNAL_ERROR: &str = "Error: Internal";

/// Delivered for a record whose request text is empty.
pub const EMPTY_REQUEST: &str = "Error: command string is null or empty!";

/// Default capacity of the result broadcast channel.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Receives every result as `(text, kind)`.
pub type ResultCallback = Arc<dyn Fn(String, CommandKind) + Send + Sync>;

/// Turns a raw device response into the result string for its command.
///
/// The device codec implements this; the queue never interprets responses
/// itself.
pub trait ResponseParser: Send + Sync + 'static {
    fn parse(&self, kind: CommandKind, raw: &str) -> String;
}

/// Parser that returns the response trimmed, for testing.
pub struct PassthroughParser;

impl ResponseParser for PassthroughParser {
    fn parse(&self, _kind: CommandKind, raw: &str) -> String {
        raw.trim().to_string()
    }
}

struct State {
    busy: bool,
    backlog: VecDeque<CommandRecord>,
    in_flight: Option<CommandKind>,
}

struct Inner {
    state: Mutex<State>,
    parser: Box<dyn ResponseParser>,
    callback: ResultCallback,
    result_tx: broadcast::Sender<CommandResult>,
    idle: Notify,
    /// Serializes callback invocations across threads.
    delivery: Mutex<()>,
}

thread_local! {
    /// Set while this thread is inside the result callback.
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Clears [`DELIVERING`] when the callback returns or unwinds.
struct DeliveringGuard;

impl DeliveringGuard {
    fn enter() -> Self {
        DELIVERING.with(|flag| flag.set(true));
        DeliveringGuard
    }
}

impl Drop for DeliveringGuard {
    fn drop(&mut self) {
        DELIVERING.with(|flag| flag.set(false));
    }
}

/// Handle to the dispatch queue. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<Inner>,
}

// ---------------------------------------------------------------------------
// Queue operations
// ---------------------------------------------------------------------------

impl DispatchQueue {
    /// Create an idle queue.
    pub fn new<P, F>(parser: P, callback: F) -> Self
    where
        P: ResponseParser,
        F: Fn(String, CommandKind) + Send + Sync + 'static,
    {
        Self::with_broadcast_capacity(parser, callback, DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create an idle queue whose result broadcast keeps up to `capacity`
    /// undelivered results per subscriber.
    pub fn with_broadcast_capacity<P, F>(parser: P, callback: F, capacity: usize) -> Self
    where
        P: ResponseParser,
        F: Fn(String, CommandKind) + Send + Sync + 'static,
    {
        let (result_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    busy: false,
                    backlog: VecDeque::new(),
                    in_flight: None,
                }),
                parser: Box::new(parser),
                callback: Arc::new(callback),
                result_tx,
                idle: Notify::new(),
                delivery: Mutex::new(()),
            }),
        }
    }

    /// Run `record` now if the queue is idle, otherwise append it to the
    /// backlog. Never waits for device I/O.
    ///
    /// Must be called from within a tokio runtime. Without one the worker
    /// cannot start; the record is dropped and the callback receives
    /// [`INTERNAL_ERROR`].
    pub fn submit(&self, record: CommandRecord) {
        let kind = record.kind();
        let mut state = self.inner.lock_state();

        if state.busy {
            state.backlog.push_back(record);
            debug!(kind = %kind, backlog = state.backlog.len(), "queue busy, command enqueued");
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                drop(state);
                tracing::error!(kind = %kind, error = %e, "failed to start dispatch worker");
                self.inner.deliver(kind, INTERNAL_ERROR.to_string());
                return;
            }
        };

        state.busy = true;
        state.in_flight = Some(kind);
        drop(state);

        debug!(kind = %kind, "queue idle, starting worker");
        handle.spawn(run_worker(Arc::clone(&self.inner), record));
    }

    /// Deliver `text` for a command that never reaches the queue.
    ///
    /// The callback runs synchronously on the caller's thread.
    pub fn reject(&self, kind: CommandKind, text: impl Into<String>) {
        let text = text.into();
        debug!(kind = %kind, result = %text, "command rejected");
        self.inner.deliver(kind, text);
    }

    pub fn is_idle(&self) -> bool {
        !self.inner.lock_state().busy
    }

    /// Number of records waiting behind the in-flight one.
    pub fn backlog_len(&self) -> usize {
        self.inner.lock_state().backlog.len()
    }

    /// Kind of the record currently executing, if any.
    pub fn in_flight(&self) -> Option<CommandKind> {
        self.inner.lock_state().in_flight
    }

    /// Resolve once the queue is idle.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = std::pin::pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Subscribe to every result delivered from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandResult> {
        self.inner.result_tx.subscribe()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand one result to the callback and the broadcast channel.
    fn deliver(&self, kind: CommandKind, text: String) {
        let _ = self.result_tx.send(CommandResult {
            kind,
            text: text.clone(),
        });

        // A callback that calls back into the queue (e.g. `reject`) already
        // holds the delivery lock on this thread.
        if DELIVERING.with(Cell::get) {
            self.invoke_callback(kind, text);
            return;
        }

        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = DeliveringGuard::enter();
        self.invoke_callback(kind, text);
    }

    fn invoke_callback(&self, kind: CommandKind, text: String) {
        let callback = self.callback.as_ref();
        if catch_unwind(AssertUnwindSafe(|| callback(text, kind))).is_err() {
            tracing::error!(kind = %kind, "result callback panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Execute `first`, then drain the backlog. Exits with the queue idle.
async fn run_worker(inner: Arc<Inner>, first: CommandRecord) {
    let mut record = first;

    loop {
        let kind = record.kind();
        let text = execute_contained(&inner, record).await;
        debug!(kind = %kind, result = %text, "command complete");
        inner.deliver(kind, text);

        let next = {
            let mut state = inner.lock_state();
            let next = state.backlog.pop_front();
            state.in_flight = next.as_ref().map(CommandRecord::kind);
            state.busy = next.is_some();
            next
        };

        match next {
            Some(next) => {
                debug!(kind = %next.kind(), "draining backlog");
                record = next;
            }
            None => {
                debug!("backlog empty, queue idle");
                inner.idle.notify_waiters();
                return;
            }
        }
    }
}

/// Run `record` on its own task so a panicking adapter or parser yields an
/// error result instead of killing the worker.
async fn execute_contained(inner: &Arc<Inner>, record: CommandRecord) -> String {
    let kind = record.kind();
    let task_inner = Arc::clone(inner);
    let task = tokio::spawn(async move { execute(&task_inner, &record).await });
    match task.await {
        Ok(text) => text,
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            tracing::error!(kind = %kind, panic = %message, "command execution panicked");
            format!("Error: {message}")
        }
        Err(e) => {
            tracing::error!(kind = %kind, error = %e, "command execution aborted");
            format!("Error: {e}")
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "internal fault".to_string(),
        },
    }
}

/// Run one record against its transport and produce the result string.
async fn execute(inner: &Inner, record: &CommandRecord) -> String {
    if record.request().is_empty() {
        tracing::warn!(kind = %record.kind(), "empty request, not sent");
        return EMPTY_REQUEST.to_string();
    }

    let mut transport = record.transport().lock().await;
    match exchange(&mut **transport, record).await {
        Ok(raw) => inner.parser.parse(record.kind(), &raw),
        Err(e) => {
            tracing::warn!(kind = %record.kind(), error = %e, "command failed");
            format!("Error: {e}")
        }
    }
}

async fn exchange(transport: &mut dyn Transport, record: &CommandRecord) -> Result<String> {
    transport.write(record.request(), record.kind()).await?;
    transport.read().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

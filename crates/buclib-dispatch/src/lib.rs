//! Command dispatch for buclib.
//!
//! Commands are executed one at a time, in submission order, on a single
//! worker task. Callers never wait for the device: [`DispatchQueue::submit`]
//! returns at once and every result arrives through the result callback
//! (and the broadcast channel from [`DispatchQueue::subscribe`]).
//!
//! # Architecture
//!
//! - [`record`]: [`CommandRecord`], a request bound to its transport
//! - [`queue`]: the idle/busy state machine, backlog, and worker task

pub mod queue;
pub mod record;

pub use queue::{
    DEFAULT_BROADCAST_CAPACITY, DispatchQueue, EMPTY_REQUEST, INTERNAL_ERROR, NO_CONNECTION,
    PassthroughParser, ResponseParser, ResultCallback,
};
pub use record::CommandRecord;

//! The unit of work handed to the dispatch queue.

use std::fmt;

use buclib_core::transport::SharedTransport;
use buclib_core::types::CommandKind;

/// One command bound to the transport it must run on.
///
/// Built by the driver at submission time and consumed exactly once by the
/// queue worker. The transport is shared with the selector, never owned.
pub struct CommandRecord {
    kind: CommandKind,
    request: String,
    transport: SharedTransport,
}

impl CommandRecord {
    pub fn new(kind: CommandKind, request: impl Into<String>, transport: SharedTransport) -> Self {
        Self {
            kind,
            request: request.into(),
            transport,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The complete request line, including its CR terminator.
    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }
}

impl fmt::Debug for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRecord")
            .field("kind", &self.kind)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

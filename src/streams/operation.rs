use super::error::StreamError;
pub use super::status::OperationCompleter;
use super::status::OperationStatus;

type StreamResult<T> = Result<T, StreamError>;

/// What a queued operation carries.
///
/// `Data` holds the written chunk; `Abort` and `Cancel` carry the optional
/// reason given by the side that raised the signal. `Cancel` records never
/// traverse the queue — they surface as the cancel signal on both halves.
#[derive(Debug, PartialEq, Eq)]
pub enum OperationKind<T> {
    Data(T),
    Close,
    Abort(Option<String>),
    Cancel(Option<String>),
}

impl<T> OperationKind<T> {
    /// Short label used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Data(_) => "data",
            OperationKind::Close => "close",
            OperationKind::Abort(_) => "abort",
            OperationKind::Cancel(_) => "cancel",
        }
    }
}

/// A dequeued operation: the written kind plus the completer that advances
/// the writer-held status.
///
/// The reader resolves the operation exactly once, via `complete` or
/// `error`; both take the operation by value, so a second resolution is not
/// expressible. A forwarding consumer (the pipe engine) can instead
/// `into_parts` the operation to move the chunk onward while holding the
/// completer until the downstream outcome is known.
pub struct Operation<T, R = T> {
    kind: OperationKind<T>,
    status: OperationStatus<R>,
    completer: OperationCompleter<R>,
}

impl<T, R> Operation<T, R> {
    pub(crate) fn new(
        kind: OperationKind<T>,
        status: OperationStatus<R>,
        completer: OperationCompleter<R>,
    ) -> Self {
        Self {
            kind,
            status,
            completer,
        }
    }

    pub fn kind(&self) -> &OperationKind<T> {
        &self.kind
    }

    /// The written chunk, for data operations.
    pub fn argument(&self) -> Option<&T> {
        match &self.kind {
            OperationKind::Data(chunk) => Some(chunk),
            _ => None,
        }
    }

    /// Another observer of the status this operation advances.
    pub fn status(&self) -> OperationStatus<R> {
        self.status.clone()
    }

    /// Resolve the linked status as completed, with an optional result the
    /// writer can reclaim through the status.
    pub fn complete(self, result: Option<R>) -> StreamResult<()> {
        self.completer.complete(result)
    }

    /// Resolve the linked status as errored.
    pub fn error(self, reason: StreamError) -> StreamResult<()> {
        self.completer.error(reason)
    }

    /// Split into the carried kind and the completion handle.
    pub fn into_parts(self) -> (OperationKind<T>, OperationCompleter<R>) {
        (self.kind, self.completer)
    }
}

use super::error::StreamError;
use crate::platform::SharedPtr;
use futures::future::poll_fn;
use parking_lot::Mutex;
use std::task::{Poll, Waker};

type StreamResult<T> = Result<T, StreamError>;

// ----------- WakerSet -----------
#[derive(Clone, Default, Debug)]
pub(crate) struct WakerSet(SharedPtr<Mutex<Vec<Waker>>>);

impl WakerSet {
    pub(crate) fn new() -> Self {
        Self(SharedPtr::new(Mutex::new(Vec::new())))
    }

    pub(crate) fn register(&self, waker: &Waker) {
        let mut wakers = self.0.lock();
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    pub(crate) fn wake_all(&self) {
        let mut wakers = self.0.lock();
        for waker in wakers.drain(..) {
            waker.wake();
        }
    }
}

/// Lifecycle of a per-write status.
///
/// A status starts `Waiting` and reaches exactly one terminal state:
/// `Completed` or `Errored` when the reader resolves the dequeued operation,
/// or `Canceled` when the stream tears the operation down before the reader
/// resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Waiting,
    Completed,
    Errored,
    Canceled,
}

enum Outcome<R> {
    Completed(Option<R>),
    Errored(StreamError),
    Canceled(StreamError),
}

impl<R> Outcome<R> {
    fn state(&self) -> StatusState {
        match self {
            Outcome::Completed(_) => StatusState::Completed,
            Outcome::Errored(_) => StatusState::Errored,
            Outcome::Canceled(_) => StatusState::Canceled,
        }
    }
}

struct StatusCell<R> {
    outcome: Option<Outcome<R>>,
}

/// Observer handle for a single write.
///
/// Returned from `WritableOperationStream::write`; clones observe the same
/// underlying cell. The status advances when the reader resolves the
/// corresponding dequeued operation.
pub struct OperationStatus<R> {
    cell: SharedPtr<Mutex<StatusCell<R>>>,
    wakers: WakerSet,
}

impl<R> Clone for OperationStatus<R> {
    fn clone(&self) -> Self {
        Self {
            cell: SharedPtr::clone(&self.cell),
            wakers: self.wakers.clone(),
        }
    }
}

impl<R> OperationStatus<R> {
    pub fn state(&self) -> StatusState {
        match &self.cell.lock().outcome {
            None => StatusState::Waiting,
            Some(outcome) => outcome.state(),
        }
    }

    /// The completion result, if the status is `Completed` with one.
    pub fn result(&self) -> Option<R>
    where
        R: Clone,
    {
        match &self.cell.lock().outcome {
            Some(Outcome::Completed(result)) => result.clone(),
            _ => None,
        }
    }

    /// Move the completion result out of the cell, leaving a result-less
    /// completion behind. Lets a producer reclaim a resource (e.g. a pooled
    /// buffer) that the reader handed back through `complete`.
    pub fn take_result(&self) -> Option<R> {
        match &mut self.cell.lock().outcome {
            Some(Outcome::Completed(result)) => result.take(),
            _ => None,
        }
    }

    /// The error the status terminated with, for `Errored` and `Canceled`.
    pub fn error_reason(&self) -> Option<StreamError> {
        match &self.cell.lock().outcome {
            Some(Outcome::Errored(e)) | Some(Outcome::Canceled(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Resolves once the status leaves `Waiting`, with the terminal state.
    pub async fn ready(&self) -> StatusState {
        poll_fn(|cx| {
            let cell = self.cell.lock();
            match &cell.outcome {
                None => {
                    self.wakers.register(cx.waker());
                    Poll::Pending
                }
                Some(outcome) => Poll::Ready(outcome.state()),
            }
        })
        .await
    }
}

/// Single-use handle that advances a status to its terminal state.
///
/// Held by the queued operation and surrendered to the reader on dequeue.
/// Dropping a completer whose status is still `Waiting` cancels the status,
/// so an abandoned operation can never strand its writer.
pub struct OperationCompleter<R> {
    cell: SharedPtr<Mutex<StatusCell<R>>>,
    wakers: WakerSet,
    armed: bool,
}

impl<R> OperationCompleter<R> {
    /// A fresh waiting status and the completer that resolves it.
    pub(crate) fn pair() -> (OperationStatus<R>, OperationCompleter<R>) {
        let cell = SharedPtr::new(Mutex::new(StatusCell { outcome: None }));
        let wakers = WakerSet::new();
        (
            OperationStatus {
                cell: SharedPtr::clone(&cell),
                wakers: wakers.clone(),
            },
            OperationCompleter {
                cell,
                wakers,
                armed: true,
            },
        )
    }

    pub fn complete(mut self, result: Option<R>) -> StreamResult<()> {
        self.resolve(Outcome::Completed(result))
    }

    pub fn error(mut self, reason: StreamError) -> StreamResult<()> {
        self.resolve(Outcome::Errored(reason))
    }

    pub(crate) fn cancel(mut self, reason: StreamError) -> StreamResult<()> {
        self.resolve(Outcome::Canceled(reason))
    }

    fn resolve(&mut self, outcome: Outcome<R>) -> StreamResult<()> {
        self.armed = false;
        {
            let mut cell = self.cell.lock();
            if cell.outcome.is_some() {
                return Err(StreamError::AlreadyCompleted);
            }
            cell.outcome = Some(outcome);
        }
        self.wakers.wake_all();
        Ok(())
    }
}

impl<R> Drop for OperationCompleter<R> {
    fn drop(&mut self) {
        if self.armed {
            let abandoned = {
                let mut cell = self.cell.lock();
                if cell.outcome.is_none() {
                    cell.outcome = Some(Outcome::Canceled(StreamError::Canceled(None)));
                    true
                } else {
                    false
                }
            };
            if abandoned {
                self.wakers.wake_all();
            }
        }
    }
}

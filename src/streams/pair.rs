use super::error::StreamError;
use super::operation::{Operation, OperationKind};
use super::readable::ReadableOperationStream;
use super::status::{OperationCompleter, OperationStatus, WakerSet};
use super::writable::WritableOperationStream;
use super::NoBackpressureStrategy;
use crate::platform::{BoxedStrategy, MaybeSend, SharedPtr};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::trace;

type StreamResult<T> = Result<T, StreamError>;

/// State of the writable half.
///
/// `Writable` and `Waiting` track the strategy's backpressure verdict;
/// `Closed`, `Aborted` and `Canceled` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritableState {
    Writable,
    Waiting,
    Closed,
    Aborted,
    Canceled,
}

/// State of the readable half.
///
/// `Readable` mirrors queue occupancy; `Drained` follows a consumed close,
/// `Aborted` a consumed abort, `Canceled` the reader's own cancel. The three
/// terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadableState {
    Waiting,
    Readable,
    Drained,
    Canceled,
    Aborted,
}

struct QueuedOperation<T, R> {
    kind: OperationKind<T>,
    size: usize,
    status: OperationStatus<R>,
    completer: OperationCompleter<R>,
}

pub(crate) struct PairCore<T, R> {
    queue: VecDeque<QueuedOperation<T, R>>,
    queue_size: usize,
    strategy: BoxedStrategy<T>,
    window: usize,
    pub(crate) writable_state: WritableState,
    pub(crate) readable_state: ReadableState,
    // reason given to abort(); readable accessor valid once the abort op is consumed
    abort_reason: Option<Option<String>>,
    // the cancel signal record; set once by the reader's cancel
    cancel_record: Option<OperationKind<T>>,
}

impl<T, R> PairCore<T, R> {
    // Queue mutations re-derive the writable state from the strategy while
    // the half is still live.
    fn reevaluate_writable(&mut self) {
        if matches!(
            self.writable_state,
            WritableState::Writable | WritableState::Waiting
        ) {
            self.writable_state = if self.strategy.should_apply_backpressure(self.queue_size) {
                WritableState::Waiting
            } else {
                WritableState::Writable
            };
        }
    }

    fn mark_readable(&mut self) {
        if self.readable_state == ReadableState::Waiting {
            self.readable_state = ReadableState::Readable;
        }
    }

    // Drops every queued data operation, erroring its status, then enqueues
    // the single terminal abort operation.
    fn abort_queue(&mut self, reason: Option<String>) {
        for queued in self.queue.drain(..) {
            let QueuedOperation {
                kind, completer, ..
            } = queued;
            if matches!(kind, OperationKind::Data(_)) {
                let _ = completer.error(StreamError::Aborted(reason.clone()));
            }
        }
        self.queue_size = 0;

        let (status, completer) = OperationCompleter::pair();
        self.queue.push_back(QueuedOperation {
            kind: OperationKind::Abort(reason.clone()),
            size: 0,
            status,
            completer,
        });
        self.abort_reason = Some(reason);
        self.writable_state = WritableState::Aborted;
        self.mark_readable();
    }
}

/// The owning structure of a pair: one queue, one strategy, both half state
/// machines. The halves are lightweight views over this.
pub(crate) struct PairShared<T, R> {
    pub(crate) core: Mutex<PairCore<T, R>>,
    pub(crate) writable_wakers: WakerSet,
    pub(crate) readable_wakers: WakerSet,
}

impl<T, R> PairShared<T, R> {
    fn wake_both(&self) {
        self.writable_wakers.wake_all();
        self.readable_wakers.wake_all();
    }

    pub(crate) fn write(&self, chunk: T) -> StreamResult<OperationStatus<R>> {
        let status = {
            let mut core = self.core.lock();
            match core.writable_state {
                WritableState::Writable | WritableState::Waiting => {}
                WritableState::Closed => return Err(StreamError::Closed),
                WritableState::Aborted => {
                    return Err(StreamError::Aborted(
                        core.abort_reason.clone().unwrap_or(None),
                    ))
                }
                WritableState::Canceled => {
                    return Err(StreamError::Canceled(self.cancel_reason_of(&core)))
                }
            }

            let size = match core.strategy.size(&chunk) {
                Ok(size) => size,
                Err(e) => {
                    // A strategy failure is fatal: the pair aborts with the
                    // raised reason and the reader observes an abort op.
                    trace!(error = %e, "queuing strategy failed, aborting pair");
                    core.abort_queue(Some(e.to_string()));
                    drop(core);
                    self.wake_both();
                    return Err(e);
                }
            };

            let (status, completer) = OperationCompleter::pair();
            core.queue.push_back(QueuedOperation {
                kind: OperationKind::Data(chunk),
                size,
                status: status.clone(),
                completer,
            });
            core.queue_size += size;
            core.mark_readable();
            core.reevaluate_writable();
            status
        };
        self.wake_both();
        Ok(status)
    }

    pub(crate) fn close(&self) -> StreamResult<()> {
        {
            let mut core = self.core.lock();
            match core.writable_state {
                WritableState::Writable | WritableState::Waiting => {}
                WritableState::Closed => return Err(StreamError::Closed),
                WritableState::Aborted => {
                    return Err(StreamError::Aborted(
                        core.abort_reason.clone().unwrap_or(None),
                    ))
                }
                WritableState::Canceled => {
                    return Err(StreamError::Canceled(self.cancel_reason_of(&core)))
                }
            }

            let (status, completer) = OperationCompleter::pair();
            core.queue.push_back(QueuedOperation {
                kind: OperationKind::Close,
                size: 0,
                status,
                completer,
            });
            core.writable_state = WritableState::Closed;
            core.mark_readable();
        }
        self.wake_both();
        Ok(())
    }

    pub(crate) fn abort(&self, reason: Option<String>) -> StreamResult<()> {
        {
            let mut core = self.core.lock();
            match core.writable_state {
                WritableState::Writable | WritableState::Waiting | WritableState::Closed => {}
                WritableState::Aborted => {
                    return Err(StreamError::InvalidState("writable side already aborted"))
                }
                WritableState::Canceled => {
                    return Err(StreamError::InvalidState(
                        "writable side was canceled by the reader",
                    ))
                }
            }
            trace!(?reason, "aborting writable side");
            core.abort_queue(reason);
        }
        self.wake_both();
        Ok(())
    }

    pub(crate) fn read(&self) -> StreamResult<Operation<T, R>> {
        let op = {
            let mut core = self.core.lock();
            if core.readable_state != ReadableState::Readable {
                return Err(StreamError::InvalidState("readable side has no operation"));
            }
            let Some(queued) = core.queue.pop_front() else {
                return Err(StreamError::InvalidState("readable side has no operation"));
            };

            match &queued.kind {
                OperationKind::Data(_) => {
                    core.queue_size = core.queue_size.saturating_sub(queued.size);
                    if core.queue.is_empty() {
                        core.readable_state = ReadableState::Waiting;
                    }
                }
                OperationKind::Close => {
                    core.readable_state = ReadableState::Drained;
                }
                OperationKind::Abort(_) => {
                    core.readable_state = ReadableState::Aborted;
                }
                OperationKind::Cancel(_) => {}
            }
            core.reevaluate_writable();
            Operation::new(queued.kind, queued.status, queued.completer)
        };
        self.wake_both();
        Ok(op)
    }

    pub(crate) fn cancel(&self, reason: Option<String>) -> StreamResult<()> {
        {
            let mut core = self.core.lock();
            match core.readable_state {
                ReadableState::Waiting | ReadableState::Readable => {}
                ReadableState::Drained => {
                    return Err(StreamError::InvalidState("readable side already drained"))
                }
                ReadableState::Aborted => {
                    return Err(StreamError::InvalidState("readable side already aborted"))
                }
                ReadableState::Canceled => {
                    return Err(StreamError::InvalidState("readable side already canceled"))
                }
            }
            trace!(?reason, "canceling readable side");

            for queued in core.queue.drain(..) {
                let QueuedOperation {
                    kind, completer, ..
                } = queued;
                if matches!(kind, OperationKind::Data(_)) {
                    let _ = completer.cancel(StreamError::Canceled(reason.clone()));
                }
            }
            core.queue_size = 0;
            core.cancel_record = Some(OperationKind::Cancel(reason));
            core.readable_state = ReadableState::Canceled;
            // an already-aborted writer keeps its terminal state
            if !matches!(core.writable_state, WritableState::Aborted) {
                core.writable_state = WritableState::Canceled;
            }
        }
        self.wake_both();
        Ok(())
    }

    pub(crate) fn set_window(&self, window: usize) -> StreamResult<()> {
        {
            let mut core = self.core.lock();
            match core.readable_state {
                ReadableState::Waiting | ReadableState::Readable => {}
                _ => {
                    return Err(StreamError::InvalidState(
                        "window updates require a live readable side",
                    ))
                }
            }
            core.window = window;
            core.strategy.on_window_update(window);
            core.reevaluate_writable();
        }
        self.writable_wakers.wake_all();
        Ok(())
    }

    // ----------- observers -----------

    pub(crate) fn writable_state(&self) -> WritableState {
        self.core.lock().writable_state
    }

    pub(crate) fn readable_state(&self) -> ReadableState {
        self.core.lock().readable_state
    }

    pub(crate) fn window(&self) -> usize {
        self.core.lock().window
    }

    pub(crate) fn space(&self) -> Option<usize> {
        let core = self.core.lock();
        match core.writable_state {
            WritableState::Writable | WritableState::Waiting => {
                core.strategy.space(core.queue_size)
            }
            _ => None,
        }
    }

    pub(crate) fn abort_reason(&self) -> StreamResult<Option<String>> {
        let core = self.core.lock();
        if core.readable_state == ReadableState::Aborted {
            Ok(core.abort_reason.clone().unwrap_or(None))
        } else {
            Err(StreamError::InvalidState("readable side is not aborted"))
        }
    }

    // Writable-side view of the abort reason. Unlike `abort_reason` it is
    // valid as soon as abort() runs, without waiting for the reader to
    // consume the abort op.
    pub(crate) fn abort_reason_unchecked(&self) -> Option<String> {
        self.core.lock().abort_reason.clone().flatten()
    }

    pub(crate) fn cancel_reason(&self) -> StreamResult<Option<String>> {
        let core = self.core.lock();
        match &core.cancel_record {
            Some(OperationKind::Cancel(reason)) => Ok(reason.clone()),
            _ => Err(StreamError::InvalidState("pair is not canceled")),
        }
    }

    fn cancel_reason_of(&self, core: &PairCore<T, R>) -> Option<String> {
        match &core.cancel_record {
            Some(OperationKind::Cancel(reason)) => reason.clone(),
            _ => None,
        }
    }

    pub(crate) fn head_is_data(&self) -> bool {
        matches!(
            self.core.lock().queue.front().map(|q| &q.kind),
            Some(OperationKind::Data(_))
        )
    }

    pub(crate) fn has_queued_data(&self) -> bool {
        self.core
            .lock()
            .queue
            .iter()
            .any(|q| matches!(q.kind, OperationKind::Data(_)))
    }
}

/// Create a paired writable/readable operation stream sharing one queue.
///
/// `None` for the strategy means no backpressure. The writable half starts
/// `Writable` unless the strategy asserts backpressure on an empty queue
/// (e.g. an adjustable strategy with a zero window).
pub fn create_operation_stream<T, R>(
    strategy: Option<BoxedStrategy<T>>,
) -> (WritableOperationStream<T, R>, ReadableOperationStream<T, R>)
where
    T: MaybeSend + 'static,
    R: MaybeSend + 'static,
{
    let strategy = strategy.unwrap_or_else(|| Box::new(NoBackpressureStrategy));
    let writable_state = if strategy.should_apply_backpressure(0) {
        WritableState::Waiting
    } else {
        WritableState::Writable
    };

    let shared = SharedPtr::new(PairShared {
        core: Mutex::new(PairCore {
            queue: VecDeque::new(),
            queue_size: 0,
            strategy,
            window: 0,
            writable_state,
            readable_state: ReadableState::Waiting,
            abort_reason: None,
            cancel_record: None,
        }),
        writable_wakers: WakerSet::new(),
        readable_wakers: WakerSet::new(),
    });

    (
        WritableOperationStream::new(SharedPtr::clone(&shared)),
        ReadableOperationStream::new(shared),
    )
}

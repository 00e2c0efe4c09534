use super::error::StreamError;
use super::operation::{Operation, OperationKind};
use super::pair::{PairShared, ReadableState};
use crate::platform::{MaybeSend, SharedPtr};
use futures::future::poll_fn;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

type StreamResult<T> = Result<T, StreamError>;

/// The consumer half of an operation-stream pair.
///
/// Reads dequeue operations; completing a dequeued operation advances the
/// status its writer holds. The half also advertises the flow-control
/// window consumed by the writable side's strategy.
pub struct ReadableOperationStream<T, R = T> {
    shared: SharedPtr<PairShared<T, R>>,
}

impl<T, R> ReadableOperationStream<T, R>
where
    T: MaybeSend + 'static,
    R: MaybeSend + 'static,
{
    pub(crate) fn new(shared: SharedPtr<PairShared<T, R>>) -> Self {
        Self { shared }
    }

    pub fn state(&self) -> ReadableState {
        self.shared.readable_state()
    }

    pub fn window(&self) -> usize {
        self.shared.window()
    }

    /// Advertise a new window. The strategy is notified and the writable
    /// side's backpressure verdict is re-derived, which may flip it between
    /// `Waiting` and `Writable`.
    pub fn set_window(&self, window: usize) -> StreamResult<()> {
        self.shared.set_window(window)
    }

    /// Dequeue the head operation. Fails unless the half is `Readable`.
    pub fn read(&self) -> StreamResult<Operation<T, R>> {
        self.shared.read()
    }

    /// Discard the queue, cancel the still-waiting statuses of queued data
    /// operations with `reason`, and mark the writable side `Canceled`.
    pub fn cancel(&self, reason: Option<String>) -> StreamResult<()> {
        self.shared.cancel(reason)
    }

    /// Reason carried by the consumed abort operation. Valid only once the
    /// half is `Aborted`.
    pub fn abort_reason(&self) -> StreamResult<Option<String>> {
        self.shared.abort_reason()
    }

    /// Reason this half was canceled with. Valid only once the half is
    /// `Canceled`.
    pub fn cancel_reason(&self) -> StreamResult<Option<String>> {
        self.shared.cancel_reason()
    }

    /// Resolves as soon as the half is not `Waiting`, with the state it
    /// settled in.
    pub async fn ready(&self) -> ReadableState {
        poll_fn(|cx| {
            let core = self.shared.core.lock();
            match core.readable_state {
                ReadableState::Waiting => {
                    self.shared.readable_wakers.register(cx.waker());
                    Poll::Pending
                }
                state => Poll::Ready(state),
            }
        })
        .await
    }

    /// Resolves with the abort error once this half consumes an abort
    /// operation.
    pub async fn errored(&self) -> StreamError {
        poll_fn(|cx| {
            let core = self.shared.core.lock();
            if core.readable_state == ReadableState::Aborted {
                drop(core);
                Poll::Ready(StreamError::Aborted(self.abort_reason().unwrap_or(None)))
            } else {
                self.shared.readable_wakers.register(cx.waker());
                Poll::Pending
            }
        })
        .await
    }

    // Lets the pipe engine decide whether the head needs downstream credit
    // before it commits to a dequeue.
    pub(crate) fn head_is_data(&self) -> bool {
        self.shared.head_is_data()
    }
}

struct FacadeShared<T, R> {
    stream: ReadableOperationStream<T, R>,
    claimed: AtomicBool,
}

/// High-level wrapper around a readable half with exclusive reader locking.
///
/// While a [`ReadableStreamReader`] is live the stream's own `read` and
/// `cancel` fail with [`StreamError::Locked`]; observers stay available.
pub struct ReadableStream<T, R = T> {
    shared: SharedPtr<FacadeShared<T, R>>,
}

impl<T, R> ReadableStream<T, R>
where
    T: MaybeSend + 'static,
    R: MaybeSend + 'static,
{
    pub fn new(stream: ReadableOperationStream<T, R>) -> Self {
        Self {
            shared: SharedPtr::new(FacadeShared {
                stream,
                claimed: AtomicBool::new(false),
            }),
        }
    }

    pub fn locked(&self) -> bool {
        self.shared.claimed.load(Ordering::SeqCst)
    }

    /// Claim exclusive read access. Fails if a reader is already live.
    pub fn get_reader(&self) -> StreamResult<ReadableStreamReader<T, R>> {
        if self
            .shared
            .claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StreamError::Locked);
        }
        Ok(ReadableStreamReader {
            shared: SharedPtr::clone(&self.shared),
            finished: false,
        })
    }

    pub fn state(&self) -> ReadableState {
        self.shared.stream.state()
    }

    pub fn read(&self) -> StreamResult<Operation<T, R>> {
        if self.locked() {
            return Err(StreamError::Locked);
        }
        self.shared.stream.read()
    }

    pub fn cancel(&self, reason: Option<String>) -> StreamResult<()> {
        if self.locked() {
            return Err(StreamError::Locked);
        }
        self.shared.stream.cancel(reason)
    }

    pub async fn ready(&self) -> ReadableState {
        self.shared.stream.ready().await
    }

    pub async fn errored(&self) -> StreamError {
        self.shared.stream.errored().await
    }
}

/// Exclusive reader over a [`ReadableStream`]. Releases the claim on drop.
pub struct ReadableStreamReader<T, R = T> {
    shared: SharedPtr<FacadeShared<T, R>>,
    finished: bool,
}

impl<T, R> ReadableStreamReader<T, R>
where
    T: MaybeSend + 'static,
    R: MaybeSend + 'static,
{
    pub fn state(&self) -> ReadableState {
        self.shared.stream.state()
    }

    pub fn read(&self) -> StreamResult<Operation<T, R>> {
        self.shared.stream.read()
    }

    pub fn cancel(&self, reason: Option<String>) -> StreamResult<()> {
        self.shared.stream.cancel(reason)
    }

    pub async fn ready(&self) -> ReadableState {
        self.shared.stream.ready().await
    }

    pub async fn errored(&self) -> StreamError {
        self.shared.stream.errored().await
    }
}

impl<T, R> Drop for ReadableStreamReader<T, R> {
    fn drop(&mut self) {
        self.shared.claimed.store(false, Ordering::SeqCst);
    }
}

/// `futures::Stream` over the reader, yielding data chunks.
///
/// Each yielded data operation is completed with no result; close ends the
/// stream, an abort surfaces once as an `Err` item.
impl<T, R> futures::Stream for ReadableStreamReader<T, R>
where
    T: MaybeSend + 'static,
    R: MaybeSend + 'static,
{
    type Item = StreamResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        let stream = &this.shared.stream;
        loop {
            match stream.state() {
                ReadableState::Readable => {
                    let op = match stream.read() {
                        Ok(op) => op,
                        Err(e) => {
                            this.finished = true;
                            return Poll::Ready(Some(Err(e)));
                        }
                    };
                    let (kind, completer) = op.into_parts();
                    match kind {
                        OperationKind::Data(chunk) => {
                            let _ = completer.complete(None);
                            return Poll::Ready(Some(Ok(chunk)));
                        }
                        OperationKind::Close => {
                            let _ = completer.complete(None);
                            this.finished = true;
                            return Poll::Ready(None);
                        }
                        OperationKind::Abort(reason) => {
                            drop(completer);
                            this.finished = true;
                            return Poll::Ready(Some(Err(StreamError::Aborted(reason))));
                        }
                        OperationKind::Cancel(_) => {
                            this.finished = true;
                            return Poll::Ready(None);
                        }
                    }
                }
                ReadableState::Waiting => {
                    stream.shared.readable_wakers.register(cx.waker());
                    // re-check to close the race with a concurrent enqueue
                    if stream.state() == ReadableState::Waiting {
                        return Poll::Pending;
                    }
                }
                ReadableState::Drained | ReadableState::Canceled => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                ReadableState::Aborted => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(StreamError::Aborted(
                        stream.abort_reason().unwrap_or(None),
                    ))));
                }
            }
        }
    }
}

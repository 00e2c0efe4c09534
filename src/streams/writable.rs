use super::error::StreamError;
use super::pair::{PairShared, WritableState};
use super::status::OperationStatus;
use crate::platform::{MaybeSend, SharedPtr};
use futures::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll};

type StreamResult<T> = Result<T, StreamError>;

/// The producer half of an operation-stream pair.
///
/// Writes enqueue data operations and hand back an [`OperationStatus`] the
/// reader later resolves. The half is an exclusive view: it is not `Clone`,
/// and dropping it leaves the pair to drain whatever is already queued.
pub struct WritableOperationStream<T, R = T> {
    shared: SharedPtr<PairShared<T, R>>,
}

impl<T, R> WritableOperationStream<T, R>
where
    T: MaybeSend + 'static,
    R: MaybeSend + 'static,
{
    pub(crate) fn new(shared: SharedPtr<PairShared<T, R>>) -> Self {
        Self { shared }
    }

    pub fn state(&self) -> WritableState {
        self.shared.writable_state()
    }

    /// Remaining credit advertised by the strategy, `None` once the half is
    /// terminal or the strategy has no notion of credit.
    pub fn space(&self) -> Option<usize> {
        self.shared.space()
    }

    /// Enqueue a data operation and return its status.
    ///
    /// Writing while the half is `Waiting` is permitted — backpressure is
    /// advisory, and a producer that ignores it simply grows the queue.
    pub fn write(&self, chunk: T) -> StreamResult<OperationStatus<R>> {
        self.shared.write(chunk)
    }

    /// Enqueue the terminal close operation. Further writes fail.
    pub fn close(&self) -> StreamResult<()> {
        self.shared.close()
    }

    /// Drop all queued data operations, erroring their statuses with
    /// `reason`, and enqueue the terminal abort operation.
    pub fn abort(&self, reason: Option<String>) -> StreamResult<()> {
        self.shared.abort(reason)
    }

    /// Reason the reader canceled with. Valid only once the half is
    /// `Canceled`.
    pub fn cancel_reason(&self) -> StreamResult<Option<String>> {
        self.shared.cancel_reason()
    }

    /// Resolves as soon as the half is not `Waiting`, with the state it
    /// settled in.
    pub async fn ready(&self) -> WritableState {
        poll_fn(|cx| {
            let core = self.shared.core.lock();
            match core.writable_state {
                WritableState::Waiting => {
                    self.shared.writable_wakers.register(cx.waker());
                    Poll::Pending
                }
                state => Poll::Ready(state),
            }
        })
        .await
    }

    /// Resolves with the cancel reason once the reader cancels the pair.
    pub async fn cancelled(&self) -> Option<String> {
        poll_fn(|cx| {
            let core = self.shared.core.lock();
            if core.writable_state == WritableState::Canceled {
                drop(core);
                Poll::Ready(self.shared.cancel_reason().unwrap_or(None))
            } else {
                self.shared.writable_wakers.register(cx.waker());
                Poll::Pending
            }
        })
        .await
    }
}

/// `futures::Sink` over the writable half.
///
/// `poll_ready` maps to backpressure, `start_send` to `write` (the status
/// is dropped — a sink consumer does not track per-item completion),
/// `poll_flush` to queue drain, `poll_close` to `close` plus drain.
impl<T, R> futures::Sink<T> for WritableOperationStream<T, R>
where
    T: MaybeSend + 'static,
    R: MaybeSend + 'static,
{
    type Error = StreamError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let core = self.shared.core.lock();
        match core.writable_state {
            WritableState::Writable => Poll::Ready(Ok(())),
            WritableState::Waiting => {
                self.shared.writable_wakers.register(cx.waker());
                Poll::Pending
            }
            WritableState::Closed => Poll::Ready(Err(StreamError::Closed)),
            WritableState::Aborted => {
                drop(core);
                Poll::Ready(Err(StreamError::Aborted(
                    self.shared.abort_reason_unchecked(),
                )))
            }
            WritableState::Canceled => {
                drop(core);
                Poll::Ready(Err(StreamError::Canceled(
                    self.shared.cancel_reason().unwrap_or(None),
                )))
            }
        }
    }

    fn start_send(self: Pin<&mut Self>, item: T) -> Result<(), Self::Error> {
        // Sink contract: start_send is only valid after poll_ready
        if self.shared.writable_state() == WritableState::Waiting {
            return Err(
                "start_send called while backpressure is active - call poll_ready first".into(),
            );
        }
        self.shared.write(item).map(|_status| ())
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.shared.writable_state() {
            WritableState::Aborted => {
                return Poll::Ready(Err(StreamError::Aborted(
                    self.shared.abort_reason_unchecked(),
                )))
            }
            WritableState::Canceled => {
                return Poll::Ready(Err(StreamError::Canceled(
                    self.shared.cancel_reason().unwrap_or(None),
                )))
            }
            _ => {}
        }
        if self.shared.has_queued_data() {
            self.shared.writable_wakers.register(cx.waker());
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.shared.writable_state() {
            WritableState::Writable | WritableState::Waiting => {
                self.shared.close()?;
            }
            WritableState::Closed => {}
            WritableState::Aborted => {
                return Poll::Ready(Err(StreamError::Aborted(
                    self.shared.abort_reason_unchecked(),
                )))
            }
            WritableState::Canceled => {
                return Poll::Ready(Err(StreamError::Canceled(
                    self.shared.cancel_reason().unwrap_or(None),
                )))
            }
        }
        if self.shared.has_queued_data() {
            self.shared.writable_wakers.register(cx.waker());
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::pair::create_operation_stream;
    use super::super::{NonEmptyBackpressureStrategy, ReadableState, StatusState};
    use super::*;
    use futures::SinkExt;

    #[tokio::test]
    async fn ready_resolves_when_backpressure_clears() {
        let (wos, ros) = create_operation_stream::<u32, u32>(Some(Box::new(
            NonEmptyBackpressureStrategy,
        )));
        wos.write(5).unwrap();
        assert_eq!(wos.state(), WritableState::Waiting);

        let (state, _) = futures::join!(wos.ready(), async {
            let op = ros.read().unwrap();
            op.complete(None).unwrap();
        });
        assert_eq!(state, WritableState::Writable);
    }

    #[tokio::test]
    async fn cancelled_resolves_with_the_reader_reason() {
        let (wos, ros) = create_operation_stream::<u32, u32>(None);

        let (reason, _) = futures::join!(wos.cancelled(), async {
            ros.cancel(Some("done here".into())).unwrap();
        });
        assert_eq!(reason, Some("done here".to_string()));
        assert_eq!(wos.state(), WritableState::Canceled);
    }

    #[tokio::test]
    async fn sink_feed_round_trips_through_the_queue() {
        let (wos, ros) = create_operation_stream::<u32, u32>(None);
        let mut sink = wos;

        sink.feed(41).await.unwrap();
        sink.feed(42).await.unwrap();

        assert_eq!(ros.state(), ReadableState::Readable);
        assert_eq!(ros.read().unwrap().argument(), Some(&41));
        assert_eq!(ros.read().unwrap().argument(), Some(&42));

        // flush resolves once the queue holds no data ops
        sink.flush().await.unwrap();
        SinkExt::close(&mut sink).await.unwrap();
        assert_eq!(sink.state(), WritableState::Closed);
    }

    #[tokio::test]
    async fn sink_surfaces_the_abort_reason() {
        let (wos, _ros) = create_operation_stream::<u32, u32>(None);
        wos.abort(Some("disk full".into())).unwrap();

        let mut sink = wos;
        let err = sink.feed(1).await.unwrap_err();
        assert!(matches!(err, StreamError::Aborted(Some(r)) if r == "disk full"));

        let err = sink.flush().await.unwrap_err();
        assert!(matches!(err, StreamError::Aborted(Some(r)) if r == "disk full"));
    }

    #[test]
    fn write_after_close_reports_closed() {
        let (wos, _ros) = create_operation_stream::<u32, u32>(None);
        wos.close().unwrap();
        assert!(matches!(wos.write(1), Err(StreamError::Closed)));
    }

    #[test]
    fn abort_reports_reason_to_late_writes() {
        let (wos, _ros) = create_operation_stream::<u32, u32>(None);
        let status = wos.write(1).unwrap();
        wos.abort(Some("powering down".into())).unwrap();

        assert_eq!(status.state(), StatusState::Errored);
        assert!(matches!(
            wos.write(2),
            Err(StreamError::Aborted(Some(r))) if r == "powering down"
        ));
    }
}

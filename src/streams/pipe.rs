use super::error::StreamError;
use super::operation::OperationKind;
use super::pair::{ReadableState, WritableState};
use super::readable::ReadableOperationStream;
use super::status::{OperationCompleter, OperationStatus, StatusState};
use super::writable::WritableOperationStream;
use crate::platform::MaybeSend;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::trace;

// One entry of the pipe's completion book: resolves when the downstream
// status settles, handing back the upstream completer to mirror onto.
async fn settled<R>(
    status: OperationStatus<R>,
    completer: OperationCompleter<R>,
) -> (OperationStatus<R>, OperationCompleter<R>) {
    status.ready().await;
    (status, completer)
}

fn mirror<R>(status: OperationStatus<R>, completer: OperationCompleter<R>) {
    match status.state() {
        StatusState::Completed => {
            let _ = completer.complete(status.take_result());
        }
        StatusState::Errored => {
            let _ = completer.error(
                status
                    .error_reason()
                    .unwrap_or_else(|| "downstream operation errored".into()),
            );
        }
        StatusState::Canceled => {
            let _ = completer.cancel(
                status
                    .error_reason()
                    .unwrap_or(StreamError::Canceled(None)),
            );
        }
        // settled() only hands back resolved statuses; drop-cancel covers
        // anything else
        StatusState::Waiting => {}
    }
}

/// Couple a readable half to a writable half until one side terminates.
///
/// Data operations forward downstream while the destination has credit;
/// each forwarded operation's upstream status resolves with the outcome the
/// downstream reader gives it. Close and abort forward downstream,
/// downstream cancellation propagates upstream, and the destination's
/// remaining space is advertised as the source's window so credit flows
/// end-to-end.
///
/// The future resolves once the pipe has terminated and every forwarded
/// operation's outcome has been mirrored upstream. Outcomes are observed
/// through the halves' states and the individual statuses.
pub async fn pipe_operation_streams<T, R>(
    src: ReadableOperationStream<T, R>,
    dst: WritableOperationStream<T, R>,
) where
    T: MaybeSend + 'static,
    R: MaybeSend + 'static,
{
    let mut links = FuturesUnordered::new();

    'forward: loop {
        // Credit flows end-to-end: downstream space becomes the upstream
        // window.
        if let Some(space) = dst.space() {
            if matches!(
                src.state(),
                ReadableState::Waiting | ReadableState::Readable
            ) && src.window() != space
            {
                let _ = src.set_window(space);
            }
        }

        if dst.state() == WritableState::Canceled {
            let reason = dst.cancel_reason().unwrap_or(None);
            trace!(?reason, "downstream canceled, canceling upstream");
            let _ = src.cancel(reason);
            break;
        }

        match src.state() {
            ReadableState::Aborted => {
                // abort signal was consumed before the pipe attached
                let reason = src.abort_reason().unwrap_or(None);
                let _ = dst.abort(reason);
                break;
            }
            ReadableState::Canceled | ReadableState::Drained => break,
            ReadableState::Readable => {
                let dst_state = dst.state();
                let can_forward = if src.head_is_data() {
                    dst_state == WritableState::Writable
                } else {
                    matches!(
                        dst_state,
                        WritableState::Writable | WritableState::Waiting
                    )
                };
                if can_forward {
                    let Ok(op) = src.read() else { break };
                    let (kind, completer) = op.into_parts();
                    match kind {
                        OperationKind::Data(chunk) => match dst.write(chunk) {
                            Ok(status) => links.push(settled(status, completer)),
                            Err(e) => {
                                trace!(error = %e, "downstream write failed, tearing pipe down");
                                let _ = completer.error(e.clone());
                                let _ = src.cancel(Some(e.to_string()));
                                break;
                            }
                        },
                        OperationKind::Close => {
                            trace!("forwarding close downstream");
                            let _ = dst.close();
                            let _ = completer.complete(None);
                            break;
                        }
                        OperationKind::Abort(reason) => {
                            trace!(?reason, "forwarding abort downstream");
                            let _ = dst.abort(reason);
                            break;
                        }
                        OperationKind::Cancel(_) => break,
                    }
                    continue 'forward;
                }
            }
            ReadableState::Waiting => {}
        }

        // Nothing forwardable right now: wait for movement on either side
        // or for a downstream completion to mirror upstream.
        let src_wait = async {
            if src.state() == ReadableState::Waiting {
                let _ = src.ready().await;
            } else {
                futures::future::pending::<()>().await
            }
        }
        .fuse();
        let dst_wait = async {
            if dst.state() == WritableState::Waiting {
                let _ = dst.ready().await;
            } else {
                let _ = dst.cancelled().await;
            }
        }
        .fuse();
        futures::pin_mut!(src_wait, dst_wait);

        futures::select! {
            _ = src_wait => {}
            _ = dst_wait => {}
            link = links.select_next_some() => {
                let (status, completer) = link;
                mirror(status, completer);
            }
        }
    }

    // Drain the completion book. Every termination path resolves the
    // downstream statuses (reads complete them, abort and cancel error
    // them), so the drain always finishes and upstream statuses observe
    // the termination reason.
    while let Some((status, completer)) = links.next().await {
        mirror(status, completer);
    }
}

#[cfg(test)]
mod tests {
    use super::super::pair::create_operation_stream;
    use super::super::{NonEmptyBackpressureStrategy, StatusState};
    use super::*;

    #[tokio::test]
    async fn forwards_data_and_close_downstream() {
        let (up_w, up_r) = create_operation_stream::<u32, u32>(None);
        let (down_w, down_r) = create_operation_stream::<u32, u32>(None);

        up_w.write(1).unwrap();
        up_w.write(2).unwrap();
        up_w.close().unwrap();

        let consumer = async {
            let mut seen = Vec::new();
            loop {
                match down_r.state() {
                    ReadableState::Readable => {
                        let op = down_r.read().unwrap();
                        let (kind, completer) = op.into_parts();
                        match kind {
                            OperationKind::Data(v) => {
                                seen.push(v);
                                completer.complete(None).unwrap();
                            }
                            OperationKind::Close => {
                                completer.complete(None).unwrap();
                                return seen;
                            }
                            _ => return seen,
                        }
                    }
                    ReadableState::Drained => return seen,
                    _ => {
                        down_r.ready().await;
                    }
                }
            }
        };

        let (_, seen) = futures::join!(pipe_operation_streams(up_r, down_w), consumer);
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn mirrors_downstream_completion_upstream() {
        let (up_w, up_r) = create_operation_stream::<String, String>(None);
        let (down_w, down_r) = create_operation_stream::<String, String>(None);

        let status = up_w.write("ping".to_string()).unwrap();
        up_w.close().unwrap();

        let consumer = async {
            loop {
                match down_r.state() {
                    ReadableState::Readable => {
                        let op = down_r.read().unwrap();
                        let (kind, completer) = op.into_parts();
                        match kind {
                            OperationKind::Data(_) => {
                                completer.complete(Some("pong".to_string())).unwrap()
                            }
                            _ => {
                                completer.complete(None).unwrap();
                                return;
                            }
                        }
                    }
                    ReadableState::Drained => return,
                    _ => {
                        down_r.ready().await;
                    }
                }
            }
        };

        futures::join!(pipe_operation_streams(up_r, down_w), consumer);
        assert_eq!(status.state(), StatusState::Completed);
        assert_eq!(status.result(), Some("pong".to_string()));
    }

    #[tokio::test]
    async fn downstream_cancel_propagates_upstream() {
        let (up_w, up_r) = create_operation_stream::<u32, u32>(Some(Box::new(
            NonEmptyBackpressureStrategy,
        )));
        let (down_w, down_r) = create_operation_stream::<u32, u32>(None);

        let status = up_w.write(7).unwrap();

        let canceller = async {
            down_r.ready().await;
            down_r.cancel(Some("enough".into())).unwrap();
        };

        futures::join!(pipe_operation_streams(up_r, down_w), canceller);

        assert_eq!(up_w.state(), WritableState::Canceled);
        assert_eq!(up_w.cancel_reason().unwrap(), Some("enough".to_string()));
        // the forwarded op's status observed the termination reason
        assert_eq!(status.state(), StatusState::Canceled);
        assert!(matches!(
            status.error_reason(),
            Some(StreamError::Canceled(Some(r))) if r == "enough"
        ));
    }

    #[tokio::test]
    async fn upstream_abort_propagates_downstream() {
        let (up_w, up_r) = create_operation_stream::<u32, u32>(None);
        let (down_w, down_r) = create_operation_stream::<u32, u32>(None);

        up_w.write(1).unwrap();
        up_w.abort(Some("upstream failure".into())).unwrap();

        let consumer = async {
            loop {
                match down_r.state() {
                    ReadableState::Readable => {
                        let op = down_r.read().unwrap();
                        if let OperationKind::Abort(reason) = op.kind() {
                            return reason.clone();
                        }
                        op.complete(None).unwrap();
                    }
                    ReadableState::Aborted => {
                        return down_r.abort_reason().unwrap();
                    }
                    _ => {
                        down_r.ready().await;
                    }
                }
            }
        };

        let (_, reason) = futures::join!(pipe_operation_streams(up_r, down_w), consumer);
        assert_eq!(reason, Some("upstream failure".to_string()));
    }
}

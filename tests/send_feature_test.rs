/// Test that the send feature works with tokio::spawn (requires Send)
/// and the local feature with spawn_local on a LocalSet.

#[cfg(feature = "send")]
#[tokio::test]
async fn test_send_feature_with_tokio_spawn() {
    use operation_streams::{create_operation_stream, OperationKind, ReadableState};

    let (wos, ros) = create_operation_stream::<u32, u32>(None);

    // tokio::spawn requires Send, so this won't compile if the halves lose it
    let producer = tokio::spawn(async move {
        for v in [1, 2, 3] {
            wos.write(v).unwrap();
        }
        wos.close().unwrap();
    });

    let mut result = Vec::new();
    loop {
        match ros.ready().await {
            ReadableState::Readable => {
                let op = ros.read().unwrap();
                let (kind, completer) = op.into_parts();
                match kind {
                    OperationKind::Data(v) => {
                        result.push(v);
                        completer.complete(None).unwrap();
                    }
                    _ => break,
                }
            }
            _ => break,
        }
    }
    producer.await.unwrap();

    assert_eq!(result, vec![1, 2, 3]);
}

#[cfg(feature = "local")]
#[tokio::test]
async fn test_local_feature_with_spawn_local() {
    use operation_streams::{create_operation_stream, OperationKind, ReadableState};
    use tokio::task::LocalSet;

    let local = LocalSet::new();

    local
        .run_until(async {
            let (wos, ros) = create_operation_stream::<u32, u32>(None);

            // spawn_local does NOT require Send
            tokio::task::spawn_local(async move {
                for v in [1, 2, 3] {
                    wos.write(v).unwrap();
                }
                wos.close().unwrap();
            });

            let mut result = Vec::new();
            loop {
                match ros.ready().await {
                    ReadableState::Readable => {
                        let op = ros.read().unwrap();
                        let (kind, completer) = op.into_parts();
                        match kind {
                            OperationKind::Data(v) => {
                                result.push(v);
                                completer.complete(None).unwrap();
                            }
                            _ => break,
                        }
                    }
                    _ => break,
                }
            }

            assert_eq!(result, vec![1, 2, 3]);
        })
        .await;
}

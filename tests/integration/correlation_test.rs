use bytes::Bytes;
use futures::StreamExt;
use ldapext::extended::{ExtendedResult, GenericExtendedRequest};
use ldapext::ldap::message::{peek_message_id, InboundResponse, LDAP_EXTENDED_RESPONSE};
use ldapext::{Connection, Outcome, ResultCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

fn request() -> GenericExtendedRequest {
    GenericExtendedRequest::new("1.3.6.1.4.1.4203.1.11.3", None)
}

fn reply(message_id: i32) -> Bytes {
    InboundResponse::new(message_id, LDAP_EXTENDED_RESPONSE, ResultCode::Success)
        .with_response(Some("1.3.6.1.4.1.4203.1.11.3"), Some(Bytes::from(format!("dn:uid={}", message_id))))
        .encode()
}

/// Answers every outbound request, in reverse order of arrival per batch.
async fn echo_server(mut outbound: mpsc::UnboundedReceiver<Bytes>, inbound: mpsc::UnboundedSender<Bytes>, batch: usize) {
    let mut pending = Vec::new();
    while let Some(pdu) = outbound.recv().await {
        if let Some(id) = peek_message_id(&pdu) {
            pending.push(id);
        }
        if pending.len() == batch {
            for id in pending.drain(..).rev() {
                if inbound.send(reply(id)).is_err() {
                    return;
                }
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_out_of_order_responses_reach_their_requests() {
    let (tx, outbound) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Bytes>();
    let conn = Connection::new(tx, Handle::current());

    tokio::spawn(echo_server(outbound, inbound_tx, 10));
    let reader = {
        let conn = conn.clone();
        let stream = tokio_stream_from(inbound_rx);
        tokio::spawn(async move { conn.drive(stream).await })
    };

    let futures: Vec<_> = (0..10).map(|_| conn.submit(request(), None)).collect();
    for future in futures {
        let expected = format!("dn:uid={}", future.message_id());
        let result = future.await.unwrap();
        assert_eq!(result.response_value, Some(Bytes::from(expected)));
    }
    assert_eq!(conn.pending_count(), 0);

    conn.fail_all("test finished");
    reader.abort();
}

fn tokio_stream_from(
    rx: mpsc::UnboundedReceiver<Bytes>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|pdu| (pdu, rx)) })
        .map(Ok::<Bytes, std::io::Error>)
        .boxed()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_handlers_run_exactly_once_under_teardown_race() {
    let (tx, _outbound) = mpsc::unbounded_channel();
    let conn = Connection::new(tx, Handle::current());
    let calls = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let mut ids = Vec::new();
    for _ in 0..50 {
        let calls = Arc::clone(&calls);
        let done_tx = done_tx.clone();
        let future = conn.submit(
            request(),
            Some(Box::new(move |outcome: Outcome<ExtendedResult>| {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(outcome.is_ok());
            })),
        );
        ids.push(future.message_id());
    }
    drop(done_tx);

    let completer = {
        let conn = conn.clone();
        let ids = ids.clone();
        tokio::spawn(async move {
            for id in ids {
                conn.complete(InboundResponse::new(id, LDAP_EXTENDED_RESPONSE, ResultCode::Success));
            }
        })
    };
    let closer = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.fail_all("connection reset") })
    };
    completer.await.unwrap();
    closer.await.unwrap();

    let mut delivered = 0;
    while let Some(_ok) = done_rx.recv().await {
        delivered += 1;
    }
    assert_eq!(delivered, 50);
    assert_eq!(calls.load(Ordering::SeqCst), 50);
    assert_eq!(conn.pending_count(), 0);
}

#[tokio::test]
async fn test_timeout_then_late_response_is_dropped() {
    let (tx, mut outbound) = mpsc::unbounded_channel();
    let conn = Connection::new(tx, Handle::current());
    let future = conn.submit_with_timeout(request(), None, Duration::from_millis(10));
    let message_id = future.message_id();
    outbound.recv().await.unwrap();

    let err = future.await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::ClientSideTimeout);

    // The timeout also abandons the request on the server.
    let abandon = outbound.recv().await.unwrap();
    assert_eq!(abandon[5], 0x50);

    assert!(!conn.complete(InboundResponse::new(message_id, LDAP_EXTENDED_RESPONSE, ResultCode::Success)));
}

#[tokio::test]
async fn test_future_resolves_when_last_connection_handle_dropped() {
    let (tx, _outbound) = mpsc::unbounded_channel();
    let future = {
        let conn = Connection::new(tx, Handle::current());
        conn.submit(request(), None)
    };
    assert!(!future.cancel());

    let err = tokio::time::timeout(Duration::from_secs(1), future)
        .await
        .expect("future left hanging after the connection was dropped")
        .unwrap_err();
    assert_eq!(err.result_code(), ResultCode::ClientSideServerDown);
}

// tests/transport_memory.rs

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

use ipc_rpc::{
    // ---
    create_memory_transport_pair,
    Dictionary,
    ErrorEvent,
    Inbound,
    MemoryTransport,
    Transport,
    Value,
};

fn numbered(n: u64) -> Value {
    // ---
    let mut dict = Dictionary::new();
    dict.insert("n", n);
    Value::from(dict)
}

/// Answer every message with `{n}` after `n` milliseconds.
fn delayed_echo(mut inbound: Inbound) {
    // ---
    let n = inbound
        .message()
        .as_dictionary()
        .and_then(|dict| dict.get("n"))
        .and_then(Value::as_u64)
        .unwrap_or_default();

    if let Some(ctx) = inbound.create_reply_context() {
        tokio::spawn(async move {
            sleep(Duration::from_millis(n)).await;
            let mut reply = Dictionary::new();
            reply.insert("n", n);
            let _ = ctx.send(reply);
        });
    }
}

#[tokio::test]
async fn memory_messages_queue_until_handler_installed() {
    // ---
    // Arrange
    // ---
    let (client, server) = MemoryTransport::pair("mqueue-client", "mqueue-server");

    // ---
    // Act
    // ---
    client.send(numbered(1)).await.expect("send failed");
    client.send(numbered(2)).await.expect("send failed");

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    server
        .set_inbound_handler(Arc::new(move |inbound: Inbound| {
            let _ = seen_tx.send(inbound.into_message());
        }))
        .expect("install handler failed");

    // ---
    // Assert
    // ---
    let mut seen = Vec::new();
    for _ in 0..2 {
        let message = timeout(Duration::from_millis(500), seen_rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("handler channel closed unexpectedly");
        seen.push(message);
    }

    assert!(seen.contains(&numbered(1)));
    assert!(seen.contains(&numbered(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn memory_replies_complete_independently() {
    // ---
    // Arrange
    // ---
    let (client, server) = create_memory_transport_pair("mindep-client", "mindep-server");
    server
        .set_inbound_handler(Arc::new(delayed_echo))
        .expect("install handler failed");

    // ---
    // Act
    // ---
    let slow = {
        let client = client.clone();
        tokio::spawn(async move { client.send_with_reply(numbered(300)).await })
    };
    let fast = timeout(Duration::from_millis(200), client.send_with_reply(numbered(1)))
        .await
        .expect("fast reply waited behind slow one")
        .expect("send_with_reply failed");

    // ---
    // Assert
    // ---
    assert_eq!(fast, numbered(1));

    let slow = timeout(Duration::from_secs(2), slow)
        .await
        .expect("timed out waiting for slow reply")
        .unwrap()
        .expect("send_with_reply failed");
    assert_eq!(slow, numbered(300));
}

#[tokio::test]
async fn memory_both_ends_can_serve() {
    // ---
    // Arrange
    // ---
    let (left, right) = MemoryTransport::pair("mduplex-left", "mduplex-right");
    left.set_inbound_handler(Arc::new(delayed_echo)).unwrap();
    right.set_inbound_handler(Arc::new(delayed_echo)).unwrap();

    // ---
    // Act
    // ---
    let from_left = timeout(Duration::from_millis(500), left.send_with_reply(numbered(3)))
        .await
        .expect("timed out")
        .unwrap();
    let from_right = timeout(Duration::from_millis(500), right.send_with_reply(numbered(4)))
        .await
        .expect("timed out")
        .unwrap();

    // ---
    // Assert
    // ---
    assert_eq!(from_left, numbered(3));
    assert_eq!(from_right, numbered(4));
}

#[tokio::test]
async fn memory_non_dictionary_message_cannot_be_answered() {
    // ---
    // Arrange
    // ---
    let (client, server) = MemoryTransport::pair("mscalar-client", "mscalar-server");
    server.set_inbound_handler(Arc::new(delayed_echo)).unwrap();

    // ---
    // Act
    // ---
    let reply = timeout(
        Duration::from_millis(500),
        client.send_with_reply(Value::from("plain string")),
    )
    .await
    .expect("timed out")
    .unwrap();

    // ---
    // Assert
    // ---
    assert_eq!(reply, Value::Error(ErrorEvent::ConnectionInterrupted));
}

#[tokio::test]
async fn memory_cancel_before_send() {
    // ---
    let (client, server) = MemoryTransport::pair("mclosed-client", "mclosed-server");
    server.set_inbound_handler(Arc::new(delayed_echo)).unwrap();

    client.cancel().await.unwrap();

    assert!(server.is_closed());
    assert_eq!(
        client.send_with_reply(numbered(1)).await.unwrap(),
        Value::Error(ErrorEvent::ConnectionInvalid)
    );
    assert!(server.send(numbered(1)).await.is_err());
}

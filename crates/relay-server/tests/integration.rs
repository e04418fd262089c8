//! End-to-end tests against a real listener with WebSocket clients.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_server::{HubConfig, RelayServer, ServerConfig};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start(hub: HubConfig) -> (RelayServer, SocketAddr) {
    let server = RelayServer::new(ServerConfig {
        hub,
        ..ServerConfig::default()
    });
    let (addr, _handle) = server.listen().await.unwrap();
    (server, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _resp) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    client
}

async fn wait_for_sessions(server: &RelayServer, n: usize) {
    tokio::time::timeout(WAIT, async {
        while server.hub().session_count() != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {n} sessions, have {}",
            server.hub().session_count()
        )
    });
}

async fn next_message(client: &mut Client) -> Message {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("websocket error");
        if !matches!(msg, Message::Ping(_) | Message::Pong(_)) {
            return msg;
        }
    }
}

async fn next_text(client: &mut Client) -> String {
    match next_message(client).await {
        Message::Text(text) => text.as_str().to_owned(),
        other => panic!("expected text, got {other:?}"),
    }
}

/// Text frames left on a client after its own close handshake.
async fn texts_until_closed(client: &mut Client) -> Vec<String> {
    let mut texts = Vec::new();
    let _ = tokio::time::timeout(WAIT, async {
        while let Some(Ok(msg)) = client.next().await {
            match msg {
                Message::Text(text) => texts.push(text.as_str().to_owned()),
                Message::Close(_) => break,
                _ => {}
            }
        }
    })
    .await;
    texts
}

#[tokio::test]
async fn hello_world_three_clients() {
    let (server, addr) = start(HubConfig::default()).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;
    wait_for_sessions(&server, 3).await;

    a.send(Message::text("hello")).await.unwrap();
    assert_eq!(next_text(&mut a).await, "hello");
    assert_eq!(next_text(&mut b).await, "hello");
    assert_eq!(next_text(&mut c).await, "hello");

    b.close(None).await.unwrap();
    wait_for_sessions(&server, 2).await;

    a.send(Message::text("world")).await.unwrap();
    assert_eq!(next_text(&mut c).await, "world");
    assert_eq!(next_text(&mut a).await, "world");
    // A duplicate would be queued ahead of this.
    c.send(Message::text("marker")).await.unwrap();
    assert_eq!(next_text(&mut a).await, "marker");
    assert_eq!(next_text(&mut c).await, "marker");

    // B got "hello" once and nothing after it left.
    assert!(texts_until_closed(&mut b).await.is_empty());
}

#[tokio::test]
async fn hello_world_three_clients_without_echo() {
    let (server, addr) = start(HubConfig {
        echo_to_sender: false,
        ..HubConfig::default()
    })
    .await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;
    wait_for_sessions(&server, 3).await;

    a.send(Message::text("hello")).await.unwrap();
    assert_eq!(next_text(&mut b).await, "hello");
    assert_eq!(next_text(&mut c).await, "hello");

    b.close(None).await.unwrap();
    wait_for_sessions(&server, 2).await;

    a.send(Message::text("world")).await.unwrap();
    assert_eq!(next_text(&mut c).await, "world");
    c.send(Message::text("marker")).await.unwrap();
    // A's first frame is C's marker: neither of its own messages came back.
    assert_eq!(next_text(&mut a).await, "marker");
    assert!(texts_until_closed(&mut b).await.is_empty());
}

#[tokio::test]
async fn echo_disabled_over_websocket() {
    let (server, addr) = start(HubConfig {
        echo_to_sender: false,
        ..HubConfig::default()
    })
    .await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_sessions(&server, 2).await;

    a.send(Message::text("first")).await.unwrap();
    assert_eq!(next_text(&mut b).await, "first");
    b.send(Message::text("second")).await.unwrap();
    // A never saw its own "first", so the next frame is B's.
    assert_eq!(next_text(&mut a).await, "second");
}

#[tokio::test]
async fn order_preserved_per_sender() {
    let (server, addr) = start(HubConfig::default()).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_sessions(&server, 2).await;

    for i in 0..100 {
        a.send(Message::text(format!("seq-{i}"))).await.unwrap();
    }
    for i in 0..100 {
        assert_eq!(next_text(&mut b).await, format!("seq-{i}"));
    }
}

#[tokio::test]
async fn binary_frames_keep_their_kind() {
    let (server, addr) = start(HubConfig::default()).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_sessions(&server, 2).await;

    a.send(Message::binary(vec![0xde, 0xad, 0xbe, 0xef]))
        .await
        .unwrap();
    match next_message(&mut b).await {
        Message::Binary(data) => assert_eq!(&data[..], &[0xde, 0xad, 0xbe, 0xef]),
        other => panic!("expected binary, got {other:?}"),
    }
}

#[tokio::test]
async fn greeting_is_first_frame() {
    let (server, addr) = start(HubConfig {
        greeting: Some("Hi Client!".into()),
        ..HubConfig::default()
    })
    .await;
    let mut a = connect(addr).await;
    assert_eq!(next_text(&mut a).await, "Hi Client!");
    wait_for_sessions(&server, 1).await;
}

#[tokio::test]
async fn upgrade_refused_at_capacity() {
    let (server, addr) = start(HubConfig {
        max_sessions: 1,
        ..HubConfig::default()
    })
    .await;
    let _a = connect(addr).await;
    wait_for_sessions(&server, 1).await;

    match tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status(), 503);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade should have been refused"),
    }
    assert_eq!(server.hub().session_count(), 1);
}

#[tokio::test]
async fn abrupt_disconnect_only_affects_that_client() {
    let (server, addr) = start(HubConfig::default()).await;
    let mut a = connect(addr).await;
    let b = connect(addr).await;
    wait_for_sessions(&server, 2).await;

    // Drop without a close handshake.
    drop(b);
    wait_for_sessions(&server, 1).await;

    a.send(Message::text("still here")).await.unwrap();
    assert_eq!(next_text(&mut a).await, "still here");
}

#[tokio::test]
async fn shutdown_closes_clients() {
    let (server, addr) = start(HubConfig::default()).await;
    let mut a = connect(addr).await;
    wait_for_sessions(&server, 1).await;

    server.shutdown().shutdown();

    let ended = tokio::time::timeout(WAIT, async {
        loop {
            match a.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "client was not disconnected");
    wait_for_sessions(&server, 0).await;
}

use std::io;
use std::time::Duration;

use dedsocket::endpoint::Endpoint;
use dedsocket::events::{DialError, EventSocket, DEFAULT_RECV_BUFFER};
use dedsocket::probe::{Probe, State};
use dedsocket::shield::Session;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

struct Upgrade {
    path: String,
    session: Option<String>,
}

/// Accept one websocket client, report its upgrade request, push a few
/// events at it and return whatever frame it sends first.
async fn serve_once(listener: TcpListener, upgrades: oneshot::Sender<Upgrade>) -> Option<Message> {
    let (stream, _) = listener.accept().await.expect("accept");
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let _ = upgrades.send(Upgrade {
            path: req.uri().path().to_string(),
            session: req
                .headers()
                .get("X-Shield-Session")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });
        Ok(resp)
    };
    let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .expect("handshake");

    for i in 0..8 {
        let event = format!(r#"{{"type":"task-status-update","seq":{}}}"#, i);
        ws.send(Message::Text(event)).await.expect("send event");
    }

    ws.next().await.and_then(Result::ok)
}

async fn listen() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let endpoint = Endpoint::resolve(Some(&addr.to_string())).expect("resolve");
    (listener, endpoint)
}

#[tokio::test]
async fn dial_attaches_session_and_pins_buffer() {
    let (listener, endpoint) = listen().await;
    let (upgrade_tx, upgrade_rx) = oneshot::channel();
    let server = tokio::spawn(serve_once(listener, upgrade_tx));

    let mut status = Vec::new();
    let socket = timeout(
        WAIT,
        EventSocket::dial(
            &endpoint,
            &Session::new("c0ffee"),
            DEFAULT_RECV_BUFFER,
            &mut status,
        ),
    )
    .await
    .expect("dial timed out")
    .expect("dial");
    assert_eq!(
        String::from_utf8(status).expect("utf8 status"),
        "Setting read buffer size\nSuccessfully set buffer size\n"
    );

    let upgrade = upgrade_rx.await.expect("upgrade reported");
    assert_eq!(upgrade.path, "/v2/events");
    assert_eq!(upgrade.session.as_deref(), Some("c0ffee"));

    // Linux reports double the requested size, other platforms the value itself.
    let size = socket.recv_buffer_size();
    assert!(
        (DEFAULT_RECV_BUFFER..=2 * DEFAULT_RECV_BUFFER).contains(&size),
        "unexpected receive buffer size {}",
        size
    );

    let (tx, rx) = oneshot::channel();
    tx.send(()).expect("probe is listening");
    assert_eq!(Probe::new(socket).hold(rx).await, State::Closed);

    let first = timeout(WAIT, server).await.expect("server timed out").expect("server");
    assert!(matches!(first, Some(Message::Close(_))), "got {:?}", first);
}

#[tokio::test]
async fn probe_holds_until_shutdown_fires() {
    let (listener, endpoint) = listen().await;
    let (upgrade_tx, _upgrade_rx) = oneshot::channel();
    let server = tokio::spawn(serve_once(listener, upgrade_tx));

    let socket = EventSocket::dial(
        &endpoint,
        &Session::new("c0ffee"),
        DEFAULT_RECV_BUFFER,
        &mut io::sink(),
    )
    .await
    .expect("dial");
    let probe = Probe::new(socket);
    assert_eq!(probe.state(), State::Running);

    let (tx, rx) = oneshot::channel();
    let held = tokio::spawn(probe.hold(rx));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!held.is_finished());
    assert!(!server.is_finished(), "probe must not send anything while held");

    tx.send(()).expect("probe is listening");
    let state = timeout(WAIT, held).await.expect("hold timed out").expect("hold");
    assert_eq!(state, State::Closed);
}

#[tokio::test]
async fn dropped_console_keeps_the_socket_open() {
    let (listener, endpoint) = listen().await;
    let (upgrade_tx, _upgrade_rx) = oneshot::channel();
    let _server = tokio::spawn(serve_once(listener, upgrade_tx));

    let socket = EventSocket::dial(
        &endpoint,
        &Session::new("c0ffee"),
        DEFAULT_RECV_BUFFER,
        &mut io::sink(),
    )
    .await
    .expect("dial");

    let (tx, rx) = oneshot::channel::<()>();
    drop(tx);

    let held = timeout(Duration::from_millis(300), Probe::new(socket).hold(rx)).await;
    assert!(held.is_err(), "probe must keep waiting without a keyword");
}

#[tokio::test]
async fn invalid_session_token_is_rejected_before_connecting() {
    let endpoint = Endpoint::resolve(Some("127.0.0.1:1")).expect("resolve");
    let err = EventSocket::dial(
        &endpoint,
        &Session::new("bad\ntoken"),
        DEFAULT_RECV_BUFFER,
        &mut io::sink(),
    )
    .await
    .err()
    .expect("dial should fail");
    assert!(matches!(err, DialError::InvalidToken), "got {:?}", err);
}

#[tokio::test]
async fn refused_connection_is_a_dial_error() {
    let (listener, endpoint) = listen().await;
    drop(listener);

    let err = EventSocket::dial(
        &endpoint,
        &Session::new("c0ffee"),
        DEFAULT_RECV_BUFFER,
        &mut io::sink(),
    )
    .await
    .err()
    .expect("dial should fail");
    assert!(matches!(err, DialError::Connect(..)), "got {:?}", err);
}

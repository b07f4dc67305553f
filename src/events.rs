use std::io::{self, Write};

use http::HeaderValue;
use socket2::SockRef;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    client_async_tls_with_config, tungstenite::client::IntoClientRequest, Connector,
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::shield::{Session, SESSION_HEADER};

/// Receive buffer the probe pins its socket to unless told otherwise.
pub const DEFAULT_RECV_BUFFER: usize = 4096;

#[derive(Error, Debug)]
pub enum DialError {
    #[error("session token is not a valid header value")]
    InvalidToken,
    #[error("could not connect to {0}")]
    Connect(String, #[source] io::Error),
    #[error("could not set read buffer size")]
    BufferSize(#[source] io::Error),
    #[error("could not build TLS connector")]
    Tls(#[from] native_tls::Error),
    #[error("error establishing websocket connection")]
    Establishing(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A connection to the SHIELD event stream that nobody reads from.
///
/// There is intentionally no way to receive on this type. Frames the core
/// pushes pile up in the kernel receive buffer until it is full and the
/// core has to deal with a stalled client.
pub struct EventSocket {
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    recv_buffer: usize,
}

impl EventSocket {
    /// Connect to `/v2/events`, shrink the receive buffer to `recv_buffer`
    /// bytes and complete the websocket upgrade with the session attached.
    ///
    /// Buffer progress is written to `status` regardless of log filtering,
    /// the operator needs it to know the stall is set up.
    pub async fn dial<S: Write>(
        endpoint: &Endpoint,
        session: &Session,
        recv_buffer: usize,
        status: &mut S,
    ) -> Result<EventSocket, DialError> {
        let mut req = endpoint.events_url().into_client_request()?;
        req.headers_mut().append(
            SESSION_HEADER,
            HeaderValue::from_str(session.as_str()).map_err(|_| DialError::InvalidToken)?,
        );

        let addr = format!("{}:{}", endpoint.host(), endpoint.port());
        debug!(%addr, "connecting to SHIELD core");
        let stream = TcpStream::connect((endpoint.host_name().as_str(), endpoint.port()))
            .await
            .map_err(|err| DialError::Connect(addr, err))?;

        let _ = writeln!(status, "Setting read buffer size");
        let recv_buffer = pin_recv_buffer(&stream, recv_buffer).map_err(DialError::BufferSize)?;
        let _ = writeln!(status, "Successfully set buffer size");
        debug!(bytes = recv_buffer, "receive buffer pinned");

        let connector = if endpoint.scheme().is_tls() {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        debug!(url = %endpoint.events_url(), "upgrading to websocket");
        let (ws_stream, _) = client_async_tls_with_config(req, stream, None, connector).await?;
        debug!("event socket connected");

        Ok(EventSocket {
            ws_stream,
            recv_buffer,
        })
    }

    /// Receive buffer size as reported back by the OS. Linux doubles the
    /// requested value for bookkeeping overhead.
    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer
    }

    /// Send a close frame. The peer's close reply is never read; the
    /// connection goes away when the socket is dropped.
    pub async fn close(&mut self) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        self.ws_stream.close(None).await
    }
}

fn pin_recv_buffer(stream: &TcpStream, size: usize) -> io::Result<usize> {
    let socket = SockRef::from(stream);
    socket.set_recv_buffer_size(size)?;
    socket.recv_buffer_size()
}

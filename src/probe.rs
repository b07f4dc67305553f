use std::future;
use std::io::Write;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::console::{self, Credentials};
use crate::endpoint::Endpoint;
use crate::events::{DialError, EventSocket};
use crate::shield::client::{AuthError, Client};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("could not build SHIELD client")]
    Client(#[source] AuthError),
    #[error("failed to authenticate")]
    Authenticate(#[source] AuthError),
    #[error("error when dialing")]
    Dial(#[source] DialError),
}

/// Lifecycle of a held event socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    ShutdownRequested,
    Closed,
}

pub struct Probe {
    socket: EventSocket,
    state: State,
}

impl Probe {
    pub fn new(socket: EventSocket) -> Probe {
        Probe {
            socket,
            state: State::Running,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, next: State) {
        debug!(from = ?self.state, to = ?next, "probe state change");
        self.state = next;
    }

    /// Hold the socket, unread, until `shutdown` fires, then close it.
    ///
    /// If the sender is dropped without firing the socket is held forever;
    /// only the exit keyword ends a probe.
    pub async fn hold(mut self, shutdown: oneshot::Receiver<()>) -> State {
        if shutdown.await.is_err() {
            warn!("console closed without an exit keyword, holding the connection");
            return future::pending().await;
        }
        self.transition(State::ShutdownRequested);

        info!("closing event socket");
        if let Err(err) = self.socket.close().await {
            warn!(?err, "error sending close frame");
        }
        self.transition(State::Closed);
        self.state
    }
}

/// Log in, open the event socket and hold it until the operator types an
/// exit keyword on `input`.
///
/// Nothing is dialed unless the login succeeds. `status` receives the
/// buffer progress lines, `prompt` the exit prompt.
pub async fn run<S, R, W>(
    endpoint: &Endpoint,
    credentials: Credentials,
    recv_buffer: usize,
    status: &mut S,
    input: R,
    prompt: W,
) -> Result<State, RunError>
where
    S: Write,
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let client = Client::new(endpoint).map_err(RunError::Client)?;
    let session = client
        .login(credentials)
        .await
        .map_err(RunError::Authenticate)?;
    info!(%endpoint, "authenticated");

    let socket = EventSocket::dial(endpoint, &session, recv_buffer, status)
        .await
        .map_err(RunError::Dial)?;
    info!(
        recv_buffer = socket.recv_buffer_size(),
        "connected to event stream, not reading from it"
    );

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(err) = console::watch_for_exit(input, prompt, tx).await {
            warn!(?err, "console reader failed");
        }
    });

    Ok(Probe::new(socket).hold(rx).await)
}

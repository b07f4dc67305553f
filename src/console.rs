//! Operator I/O: credential prompts and the exit keyword watcher.
//!
//! Prompts go to stderr so stdout stays clean. The password is read from
//! the terminal device with echo disabled.

use std::fmt;
use std::io::{self, BufRead, Write};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::debug;

pub const USERNAME_PROMPT: &str = "SHIELD Username: ";
pub const PASSWORD_PROMPT: &str = "SHIELD Password: ";
pub const EXIT_PROMPT: &str = "Type `quit' to exit: ";

/// Words that end the probe. Matched case-sensitively.
pub const EXIT_KEYWORDS: [&str; 2] = ["quit", "exit"];

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("could not read username")]
    ReadUsername(#[source] io::Error),
    #[error("could not read password")]
    ReadPassword(#[source] io::Error),
}

/// Local user credentials, handed over by value to the login call.
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn into_parts(self) -> (String, String) {
        (self.username, self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Write the username prompt and read one echoed line.
pub fn prompt_username<R: BufRead, W: Write>(input: &mut R, prompt: &mut W) -> io::Result<String> {
    prompt.write_all(USERNAME_PROMPT.as_bytes())?;
    prompt.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Collect credentials from the controlling terminal. Blocking; call it
/// from `spawn_blocking` inside the runtime.
pub fn prompt_credentials(username: Option<String>) -> Result<Credentials, ConsoleError> {
    let mut stderr = io::stderr();
    let username = match username {
        Some(username) => username,
        None => prompt_username(&mut io::stdin().lock(), &mut stderr)
            .map_err(ConsoleError::ReadUsername)?,
    };

    eprint!("{}", PASSWORD_PROMPT);
    let password = rpassword::read_password();
    eprintln!();
    let password = password.map_err(ConsoleError::ReadPassword)?;

    Ok(Credentials::new(username, password))
}

pub fn is_exit_keyword(line: &str) -> bool {
    EXIT_KEYWORDS.contains(&line.trim())
}

/// Prompt until the operator types an exit keyword, then fire `shutdown`.
///
/// Returns `Ok(true)` once the signal was sent. End of input returns
/// `Ok(false)` without signalling: the caller decides what a closed console
/// means.
pub async fn watch_for_exit<R, W>(
    input: R,
    mut prompt: W,
    shutdown: oneshot::Sender<()>,
) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        prompt.write_all(EXIT_PROMPT.as_bytes()).await?;
        prompt.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => {
                debug!("console input closed");
                return Ok(false);
            }
        };

        if is_exit_keyword(&line) {
            debug!(keyword = line.trim(), "exit requested");
            // The receiver only goes away if the main task already exited.
            let _ = shutdown.send(());
            return Ok(true);
        }
    }
}

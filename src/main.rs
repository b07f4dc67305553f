use std::fmt::Display;
use std::io;
use std::process;

use anyhow::Context;
use clap::Parser;
use dedsocket::console;
use dedsocket::endpoint::Endpoint;
use dedsocket::events::DEFAULT_RECV_BUFFER;
use dedsocket::probe::{self, State};
use tokio::io::BufReader;
use tracing::debug;

/// Connect to the SHIELD event websocket and then just don't read the buffer.
#[derive(Parser, Debug)]
#[command(name = "dedsocket", version)]
struct Args {
    /// SHIELD core to connect to (http://host:port, scheme and port optional)
    url: Option<String>,

    /// Skip the username prompt
    #[arg(short, long, env = "SHIELD_USERNAME")]
    username: Option<String>,

    /// Receive buffer size to pin the event socket to, in bytes
    #[arg(long, env = "DEDSOCKET_RECV_BUFFER", default_value_t = DEFAULT_RECV_BUFFER)]
    recv_buffer: usize,
}

fn bail_with(message: impl Display) -> ! {
    eprintln!("\x1b[1;31m{}\x1b[0m", message);
    process::exit(1);
}

async fn run(args: Args) -> anyhow::Result<State> {
    let endpoint = Endpoint::resolve(args.url.as_deref())?;
    debug!(%endpoint, "resolved SHIELD core");

    let username = args.username;
    let credentials = tokio::task::spawn_blocking(move || console::prompt_credentials(username))
        .await
        .context("credential prompt panicked")??;

    let state = probe::run(
        &endpoint,
        credentials,
        args.recv_buffer,
        &mut io::stderr(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stderr(),
    )
    .await?;
    Ok(state)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if !err.use_stderr() => {
            // --help and --version
            let _ = err.print();
            process::exit(0);
        }
        Err(err) => bail_with(err.render()),
    };
    dedsocket::logging::init();

    match run(args).await {
        Ok(state) => {
            debug!(?state, "probe finished");
            // Don't wait on a console reader that may still be parked on stdin.
            process::exit(0);
        }
        Err(err) => bail_with(format!("{:#}", err)),
    }
}

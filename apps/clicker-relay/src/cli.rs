use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::timeout;
use tracing::{debug, info};

use clicker_proto::{ControlKey, KeyAction};
use clicker_session::{RelaySession, SessionEvent, SessionState};

use crate::config::ServerConfig;

#[derive(Debug, Parser)]
#[command(
    name = "clicker-relay",
    about = "Relay server bridging touch controllers to a set-top box",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Address to bind the relay listener to.
    #[arg(long, env = "CLICKER_RELAY_LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// Set-top box address to forward commands to at startup.
    #[arg(long, env = "CLICKER_RELAY_ROKU_IP")]
    pub roku_ip: Option<String>,

    /// Port the device control protocol listens on.
    #[arg(long, env = "CLICKER_RELAY_ECP_PORT", default_value_t = 8060)]
    pub ecp_port: u16,

    /// Budget for one downstream command request, in milliseconds.
    #[arg(long, env = "CLICKER_RELAY_FORWARD_TIMEOUT_MS", default_value_t = 500)]
    pub forward_timeout_ms: u64,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send a single key command through a running relay.
    Send {
        /// Relay address, e.g. ws://localhost:3000.
        #[arg(short, long, default_value = "ws://localhost:3000")]
        url: String,

        /// Set-top box address to select before sending.
        #[arg(long)]
        roku_ip: Option<String>,

        /// Key press phase (key-down, key-up or key-press).
        #[arg(long, default_value = "key-press")]
        action: KeyAction,

        /// Key to send, e.g. Home or Select.
        key: ControlKey,
    },
}

impl TryFrom<Cli> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let listen_addr = cli
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", cli.listen_addr))?;
        Ok(ServerConfig {
            listen_addr,
            roku_ip: cli.roku_ip,
            ecp_port: cli.ecp_port,
            forward_timeout: Duration::from_millis(cli.forward_timeout_ms),
        })
    }
}

/// One-shot debug client: connect, optionally retarget, fire a key command
/// and report anything the relay complains about.
pub async fn run_send_client(
    url: String,
    roku_ip: Option<String>,
    action: KeyAction,
    key: ControlKey,
) -> Result<()> {
    let (session, mut events) = RelaySession::spawn();
    let mut state = session.watch_state();

    if let Some(ip) = roku_ip {
        session.set_target(ip)?;
    }
    session.connect(url.as_str())?;

    timeout(Duration::from_secs(5), async {
        loop {
            state.changed().await.context("session task ended")?;
            match *state.borrow() {
                SessionState::Connected => return Ok(()),
                SessionState::Disconnected => {
                    anyhow::bail!("could not reach relay at {url}")
                }
                _ => {}
            }
        }
    })
    .await
    .context("timed out connecting to relay")??;

    session.send_command(action, key)?;
    info!(%action, %key, "command sent");

    // Give the relay a moment to report a delivery failure before exiting.
    let verdict = timeout(Duration::from_millis(700), async {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::RelayError { message } => {
                    anyhow::bail!("relay reported: {message}")
                }
                SessionEvent::Config { roku_ip, .. } => {
                    debug!(%roku_ip, "target acknowledged");
                }
            }
        }
        Ok(())
    })
    .await
    .unwrap_or(Ok(()));
    verdict?;

    session.shutdown()?;
    Ok(())
}

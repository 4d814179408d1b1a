//! Session actor owning the relay connection.
//!
//! All connection state lives in one task; the [`RelaySession`] handle and
//! every internal timer or dial attempt communicate with it over channels.
//! Attempts and reconnect timers carry a sequence number stamped when they
//! are spawned, and the actor ignores results whose number no longer
//! matches, so a cancelled attempt can never install a stale connection.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use clicker_proto::{ClientFrame, CommandFrame, ControlKey, ControlMessage, KeyAction, ServerMessage};

use crate::backoff::ReconnectBackoff;
use crate::connector::{ConnectorError, RelayConnection, RelayConnector, WsConnector};

/// Connection lifecycle as seen by the owner of the session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No relay address configured, or the session was shut down.
    Idle,
    /// A dial attempt is in flight.
    Connecting,
    /// Live relay connection.
    Connected,
    /// Connection lost; a retry is pending.
    Disconnected,
}

/// Frames from the relay surfaced to the session owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Target snapshot or retarget acknowledgement.
    Config {
        roku_ip: String,
        server_time: Option<i64>,
    },
    /// The relay could not deliver a command.
    RelayError { message: String },
}

/// The session task has terminated; the handle is no longer usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session task has terminated")]
pub struct SessionClosed;

enum SessionCommand {
    Connect { address: String },
    Reconnect,
    SendCommand { action: KeyAction, key: ControlKey },
    SetTarget { ip: String },
    Shutdown,
}

enum Internal {
    ConnectOutcome {
        attempt: u64,
        result: Result<RelayConnection, ConnectorError>,
    },
    ReconnectTimer {
        timer: u64,
    },
}

/// Cloneable handle to a running session task.
#[derive(Clone)]
pub struct RelaySession {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    state_rx: watch::Receiver<SessionState>,
}

impl RelaySession {
    /// Spawn a session task backed by the websocket connector, returning the
    /// handle and the stream of relay events. Must be called from within a
    /// Tokio runtime.
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::spawn_with(Arc::new(WsConnector::default()), ReconnectBackoff::default())
    }

    fn spawn_with(
        connector: Arc<dyn RelayConnector>,
        backoff: ReconnectBackoff,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let actor = SessionActor {
            connector,
            backoff,
            address: None,
            target: None,
            conn: None,
            connecting: false,
            attempt_seq: 0,
            timer_seq: 0,
            pending_timer: None,
            internal_tx,
            state_tx,
            event_tx,
        };
        tokio::spawn(actor.run(cmd_rx, internal_rx));

        (RelaySession { cmd_tx, state_rx }, event_rx)
    }

    /// Dial the relay at `address`. An empty address tears the session down
    /// to idle. Calls while an attempt is already in flight are ignored.
    pub fn connect(&self, address: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Connect {
            address: address.into(),
        })
    }

    /// Retry immediately, resetting the backoff schedule.
    pub fn reconnect(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Reconnect)
    }

    /// Queue one key command. Dropped with a log line when not connected.
    pub fn send_command(&self, action: KeyAction, key: ControlKey) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SendCommand { action, key })
    }

    /// Single press and release.
    pub fn tap(&self, key: ControlKey) -> Result<(), SessionClosed> {
        self.send_command(KeyAction::KeyPress, key)
    }

    /// Begin holding a key. Pair with [`RelaySession::release`].
    pub fn hold(&self, key: ControlKey) -> Result<(), SessionClosed> {
        self.send_command(KeyAction::KeyDown, key)
    }

    /// Release a held key.
    pub fn release(&self, key: ControlKey) -> Result<(), SessionClosed> {
        self.send_command(KeyAction::KeyUp, key)
    }

    /// Choose the set-top box the relay forwards to. Applied on the live
    /// connection and replayed after every reconnect.
    pub fn set_target(&self, ip: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetTarget { ip: ip.into() })
    }

    /// Stop the session task. Terminal: the handle errors afterwards.
    pub fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Shutdown)
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    fn send(&self, cmd: SessionCommand) -> Result<(), SessionClosed> {
        self.cmd_tx.send(cmd).map_err(|_| SessionClosed)
    }
}

struct SessionActor {
    connector: Arc<dyn RelayConnector>,
    backoff: ReconnectBackoff,
    address: Option<String>,
    target: Option<String>,
    conn: Option<RelayConnection>,
    connecting: bool,
    attempt_seq: u64,
    timer_seq: u64,
    pending_timer: Option<JoinHandle<()>>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    state_tx: watch::Sender<SessionState>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(SessionCommand::Shutdown) => {
                        self.cancel_timer();
                        self.conn = None;
                        self.set_state(SessionState::Idle);
                        break;
                    }
                    Some(SessionCommand::Connect { address }) => self.on_connect(address),
                    Some(SessionCommand::Reconnect) => self.on_reconnect(),
                    Some(SessionCommand::SendCommand { action, key }) => {
                        self.on_send_command(action, key)
                    }
                    Some(SessionCommand::SetTarget { ip }) => self.on_set_target(ip),
                },
                Some(event) = internal_rx.recv() => self.on_internal(event),
                frame = recv_frame(&mut self.conn) => match frame {
                    Some(text) => self.on_frame(&text),
                    None => self.on_closed(),
                },
            }
        }
        debug!("session task finished");
    }

    fn on_connect(&mut self, address: String) {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            self.cancel_timer();
            // Orphan any attempt still in flight.
            self.attempt_seq += 1;
            self.connecting = false;
            self.conn = None;
            self.address = None;
            self.set_state(SessionState::Idle);
            return;
        }
        if self.connecting {
            debug!("connect ignored, attempt already in flight");
            return;
        }
        self.address = Some(trimmed.to_string());
        self.cancel_timer();
        self.conn = None;
        self.backoff.reset();
        self.begin_attempt();
    }

    fn on_reconnect(&mut self) {
        if self.connecting {
            debug!("reconnect ignored, attempt already in flight");
            return;
        }
        if self.address.is_none() {
            warn!("reconnect requested before any connect");
            return;
        }
        self.cancel_timer();
        self.conn = None;
        self.backoff.reset();
        self.begin_attempt();
    }

    fn on_send_command(&mut self, action: KeyAction, key: ControlKey) {
        if self.conn.is_none() {
            debug!(%action, %key, "dropping command, not connected");
            return;
        }
        self.send_frame(&ClientFrame::Command(CommandFrame::new(action, key)));
    }

    fn on_set_target(&mut self, ip: String) {
        let trimmed = ip.trim();
        if trimmed.is_empty() {
            warn!("ignoring empty target address");
            return;
        }
        self.target = Some(trimmed.to_string());
        if self.conn.is_some() {
            self.send_frame(&ClientFrame::Control(ControlMessage::SetRokuIp {
                ip: trimmed.to_string(),
            }));
        }
    }

    fn on_internal(&mut self, event: Internal) {
        match event {
            Internal::ConnectOutcome { attempt, result } => {
                if attempt != self.attempt_seq {
                    // Superseded attempt; dropping the result closes its socket.
                    return;
                }
                self.connecting = false;
                match result {
                    Ok(conn) => self.on_connected(conn),
                    Err(err) => {
                        warn!(error = %err, "relay connect failed");
                        self.set_state(SessionState::Disconnected);
                        self.schedule_reconnect();
                    }
                }
            }
            Internal::ReconnectTimer { timer } => {
                if timer != self.timer_seq || self.pending_timer.is_none() {
                    return;
                }
                self.pending_timer = None;
                if self.connecting || self.conn.is_some() {
                    return;
                }
                self.begin_attempt();
            }
        }
    }

    fn on_connected(&mut self, conn: RelayConnection) {
        self.backoff.reset();
        self.conn = Some(conn);
        self.set_state(SessionState::Connected);
        info!("relay connected");
        if let Some(ip) = self.target.clone() {
            self.send_frame(&ClientFrame::Control(ControlMessage::SetRokuIp { ip }));
        }
    }

    fn on_frame(&mut self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::Config {
                roku_ip,
                server_time,
            }) => {
                if !roku_ip.is_empty() {
                    self.target = Some(roku_ip.clone());
                }
                let _ = self.event_tx.send(SessionEvent::Config {
                    roku_ip,
                    server_time,
                });
            }
            Ok(ServerMessage::Error { message }) => {
                warn!(%message, "relay reported an error");
                let _ = self.event_tx.send(SessionEvent::RelayError { message });
            }
            Err(err) => {
                debug!(error = %err, "ignoring unrecognized relay frame");
            }
        }
    }

    fn on_closed(&mut self) {
        self.conn = None;
        warn!("relay connection closed");
        self.set_state(SessionState::Disconnected);
        self.schedule_reconnect();
    }

    fn begin_attempt(&mut self) {
        let Some(address) = self.address.clone() else {
            return;
        };
        self.attempt_seq += 1;
        let attempt = self.attempt_seq;
        self.connecting = true;
        self.set_state(SessionState::Connecting);
        debug!(%address, attempt, "dialing relay");

        let connector = Arc::clone(&self.connector);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = connector.connect(&address).await;
            let _ = tx.send(Internal::ConnectOutcome { attempt, result });
        });
    }

    fn schedule_reconnect(&mut self) {
        self.cancel_timer();
        self.timer_seq += 1;
        let timer = self.timer_seq;
        let delay = self.backoff.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");

        let tx = self.internal_tx.clone();
        self.pending_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::ReconnectTimer { timer });
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.pending_timer.take() {
            handle.abort();
        }
    }

    fn send_frame(&mut self, frame: &ClientFrame) {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to encode frame");
                return;
            }
        };
        let delivered = match self.conn.as_ref() {
            Some(active) => active.outbound.send(text).is_ok(),
            None => return,
        };
        if !delivered {
            self.on_closed();
        }
    }

    fn set_state(&self, state: SessionState) {
        if *self.state_tx.borrow() != state {
            let _ = self.state_tx.send(state);
        }
    }
}

async fn recv_frame(conn: &mut Option<RelayConnection>) -> Option<String> {
    match conn.as_mut() {
        Some(active) => active.inbound.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::time::{sleep, timeout};

    #[derive(Debug, Clone, Copy)]
    enum ConnectPlan {
        Accept,
        Refuse,
    }

    /// Server half of an accepted scripted connection.
    struct ServerLink {
        to_client: mpsc::UnboundedSender<String>,
        from_client: mpsc::UnboundedReceiver<String>,
    }

    impl ServerLink {
        async fn next_json(&mut self) -> Value {
            let text = timeout(Duration::from_secs(2), self.from_client.recv())
                .await
                .expect("timed out waiting for client frame")
                .expect("client closed the connection");
            serde_json::from_str(&text).expect("client frame is json")
        }

        fn push(&self, msg: &ServerMessage) {
            let text = serde_json::to_string(msg).expect("encode server message");
            self.to_client.send(text).expect("client inbound closed");
        }
    }

    /// Connector whose outcomes are scripted per attempt. Unplanned attempts
    /// are accepted.
    struct ScriptedConnector {
        plan: Mutex<VecDeque<ConnectPlan>>,
        attempts: Mutex<Vec<Instant>>,
        links: mpsc::UnboundedSender<ServerLink>,
        connect_delay: Duration,
    }

    impl ScriptedConnector {
        fn new(connect_delay: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerLink>) {
            let (links, link_rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    plan: Mutex::new(VecDeque::new()),
                    attempts: Mutex::new(Vec::new()),
                    links,
                    connect_delay,
                }),
                link_rx,
            )
        }

        fn script(&self, outcomes: impl IntoIterator<Item = ConnectPlan>) {
            self.plan.lock().unwrap().extend(outcomes);
        }

        fn attempt_times(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }

        fn attempt_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RelayConnector for ScriptedConnector {
        async fn connect(&self, _address: &str) -> Result<RelayConnection, ConnectorError> {
            self.attempts.lock().unwrap().push(Instant::now());
            if !self.connect_delay.is_zero() {
                sleep(self.connect_delay).await;
            }
            let next = self
                .plan
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ConnectPlan::Accept);
            match next {
                ConnectPlan::Refuse => Err(ConnectorError::Handshake(
                    "connection refused".to_string(),
                )),
                ConnectPlan::Accept => {
                    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                    let _ = self.links.send(ServerLink {
                        to_client: inbound_tx,
                        from_client: outbound_rx,
                    });
                    Ok(RelayConnection {
                        outbound: outbound_tx,
                        inbound: inbound_rx,
                    })
                }
            }
        }
    }

    fn spawn_session(
        connector: Arc<ScriptedConnector>,
    ) -> (RelaySession, mpsc::UnboundedReceiver<SessionEvent>) {
        RelaySession::spawn_with(
            connector,
            ReconnectBackoff::new(Duration::from_millis(40), Duration::from_millis(400), 2.0),
        )
    }

    async fn wait_for_state(rx: &mut watch::Receiver<SessionState>, want: SessionState) {
        timeout(Duration::from_secs(2), async {
            loop {
                if *rx.borrow_and_update() == want {
                    return;
                }
                rx.changed().await.expect("session state channel closed");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want:?}"));
    }

    async fn next_link(rx: &mut mpsc::UnboundedReceiver<ServerLink>) -> ServerLink {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for connection")
            .expect("connector gone")
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn connect_reaches_connected_state() {
        let (connector, _links) = ScriptedConnector::new(Duration::ZERO);
        let (session, _events) = spawn_session(connector.clone());
        let mut state = session.watch_state();

        assert_eq!(session.state(), SessionState::Idle);
        session.connect("relay.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;
        assert_eq!(connector.attempt_count(), 1);
    }

    #[tokio::test]
    async fn commands_and_retargets_reach_the_relay() {
        let (connector, mut links) = ScriptedConnector::new(Duration::ZERO);
        let (session, _events) = spawn_session(connector);
        let mut state = session.watch_state();

        session.connect("relay.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;
        let mut link = next_link(&mut links).await;

        session.set_target("192.168.1.50").unwrap();
        assert_eq!(
            link.next_json().await,
            json!({"type": "set-roku-ip", "ip": "192.168.1.50"})
        );

        session.tap(ControlKey::Home).unwrap();
        assert_eq!(
            link.next_json().await,
            json!({"action": "key-press", "key": "Home"})
        );

        session.hold(ControlKey::Select).unwrap();
        assert_eq!(
            link.next_json().await,
            json!({"action": "key-down", "key": "Select"})
        );

        session.release(ControlKey::Select).unwrap();
        assert_eq!(
            link.next_json().await,
            json!({"action": "key-up", "key": "Select"})
        );
    }

    #[tokio::test]
    async fn target_set_before_connect_is_replayed() {
        let (connector, mut links) = ScriptedConnector::new(Duration::ZERO);
        let (session, _events) = spawn_session(connector);
        let mut state = session.watch_state();

        session.set_target("10.0.0.5").unwrap();
        session.connect("relay.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;

        let mut link = next_link(&mut links).await;
        assert_eq!(
            link.next_json().await,
            json!({"type": "set-roku-ip", "ip": "10.0.0.5"})
        );
    }

    #[tokio::test]
    async fn config_frames_update_target_and_surface_events() {
        let (connector, mut links) = ScriptedConnector::new(Duration::ZERO);
        let (session, mut events) = spawn_session(connector);
        let mut state = session.watch_state();

        session.connect("relay.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;
        let link = next_link(&mut links).await;

        link.push(&ServerMessage::Config {
            roku_ip: "10.0.0.9".to_string(),
            server_time: Some(5),
        });
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Config {
                roku_ip: "10.0.0.9".to_string(),
                server_time: Some(5),
            }
        );

        // The adopted target is replayed on the next connection.
        drop(link);
        wait_for_state(&mut state, SessionState::Disconnected).await;
        wait_for_state(&mut state, SessionState::Connected).await;
        let mut link = next_link(&mut links).await;
        assert_eq!(
            link.next_json().await,
            json!({"type": "set-roku-ip", "ip": "10.0.0.9"})
        );
    }

    #[tokio::test]
    async fn relay_errors_surface_as_events() {
        let (connector, mut links) = ScriptedConnector::new(Duration::ZERO);
        let (session, mut events) = spawn_session(connector);
        let mut state = session.watch_state();

        session.connect("relay.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;
        let link = next_link(&mut links).await;

        link.push(&ServerMessage::Error {
            message: "Roku unreachable: request timed out".to_string(),
        });
        match next_event(&mut events).await {
            SessionEvent::RelayError { message } => assert!(message.contains("timed out")),
            other => panic!("expected relay error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_connection_reconnects_with_growing_delays() {
        let (connector, mut links) = ScriptedConnector::new(Duration::ZERO);
        connector.script([ConnectPlan::Accept, ConnectPlan::Refuse, ConnectPlan::Accept]);
        let (session, _events) = spawn_session(connector.clone());
        let mut state = session.watch_state();

        session.connect("relay.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;

        let link = next_link(&mut links).await;
        let dropped_at = Instant::now();
        drop(link);

        wait_for_state(&mut state, SessionState::Disconnected).await;
        wait_for_state(&mut state, SessionState::Connected).await;

        let attempts = connector.attempt_times();
        assert_eq!(attempts.len(), 3);
        // First retry waits the floor delay, the refused attempt doubles it.
        assert!(attempts[1].duration_since(dropped_at) >= Duration::from_millis(40));
        assert!(attempts[2].duration_since(attempts[1]) >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn successful_connect_resets_retry_pacing() {
        let (connector, mut links) = ScriptedConnector::new(Duration::ZERO);
        connector.script([
            ConnectPlan::Accept,
            ConnectPlan::Refuse,
            ConnectPlan::Refuse,
            ConnectPlan::Accept,
            ConnectPlan::Accept,
        ]);
        let (session, _events) = spawn_session(connector.clone());
        let mut state = session.watch_state();

        session.connect("relay.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;
        let link = next_link(&mut links).await;

        // Two refused attempts grow the delay to 160ms.
        drop(link);
        wait_for_state(&mut state, SessionState::Disconnected).await;
        wait_for_state(&mut state, SessionState::Connected).await;
        let link = next_link(&mut links).await;

        let dropped_at = Instant::now();
        drop(link);
        wait_for_state(&mut state, SessionState::Disconnected).await;
        wait_for_state(&mut state, SessionState::Connected).await;

        let attempts = connector.attempt_times();
        assert_eq!(attempts.len(), 5);
        let retry_gap = attempts[4].duration_since(dropped_at);
        // Back at the floor delay rather than the grown one.
        assert!(retry_gap >= Duration::from_millis(40));
        assert!(retry_gap < Duration::from_millis(160));
    }

    #[tokio::test]
    async fn connect_while_connecting_is_ignored() {
        let (connector, _links) = ScriptedConnector::new(Duration::from_millis(80));
        let (session, _events) = spawn_session(connector.clone());
        let mut state = session.watch_state();

        session.connect("relay-a.test:3000").unwrap();
        session.connect("relay-b.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;

        assert_eq!(connector.attempt_count(), 1);
    }

    #[tokio::test]
    async fn blank_connect_cancels_the_pending_attempt() {
        let (connector, _links) = ScriptedConnector::new(Duration::from_millis(80));
        let (session, _events) = spawn_session(connector.clone());
        let mut state = session.watch_state();

        session.connect("relay.test:3000").unwrap();
        sleep(Duration::from_millis(10)).await;
        session.connect("   ").unwrap();
        wait_for_state(&mut state, SessionState::Idle).await;

        // The attempt resolves after 80ms but its connection is discarded.
        sleep(Duration::from_millis(150)).await;
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(connector.attempt_count(), 1);
    }

    #[tokio::test]
    async fn commands_without_a_connection_are_dropped() {
        let (connector, _links) = ScriptedConnector::new(Duration::ZERO);
        let (session, _events) = spawn_session(connector.clone());

        session.tap(ControlKey::Home).unwrap();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(connector.attempt_count(), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn shutdown_is_terminal() {
        let (connector, _links) = ScriptedConnector::new(Duration::ZERO);
        let (session, _events) = spawn_session(connector);
        let mut state = session.watch_state();

        session.connect("relay.test:3000").unwrap();
        wait_for_state(&mut state, SessionState::Connected).await;

        session.shutdown().unwrap();
        wait_for_state(&mut state, SessionState::Idle).await;
        sleep(Duration::from_millis(20)).await;

        assert_eq!(session.tap(ControlKey::Home), Err(SessionClosed));
    }
}

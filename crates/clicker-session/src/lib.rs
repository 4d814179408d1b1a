//! Client-side session management for a clicker relay connection.
//!
//! [`RelaySession`] wraps a background task that owns the websocket to the
//! relay, reconnects with exponential backoff when the connection drops, and
//! replays the selected set-top box after every reconnect. Callers interact
//! through the cloneable handle and observe the connection lifecycle through
//! a watch channel.

mod backoff;
mod connector;
mod session;

pub use backoff::ReconnectBackoff;
pub use connector::{ConnectorError, RelayConnection, RelayConnector, WsConnector};
pub use session::{RelaySession, SessionClosed, SessionEvent, SessionState};

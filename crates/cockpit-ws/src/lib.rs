//! Push channel client for the trading cockpit.
//!
//! Provides the WebSocket side of synchronization:
//! - Explicit connection state machine fed by transport events
//! - Unconditional reconnection after a fixed delay (no cap, no growth)
//! - One subscription request per successful open
//! - In-order routing of decoded partial updates to the aggregator

pub mod connection;
pub mod error;
pub mod machine;
pub mod message;

pub use cockpit_core::ConnectionState;
pub use connection::{ConnectionConfig, ConnectionManager};
pub use error::{WsError, WsResult};
pub use machine::{ConnectionAction, ConnectionEvent, ConnectionMachine};
pub use message::{parse_inbound, InboundMessage, SubscribeRequest, DEFAULT_CHANNELS};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

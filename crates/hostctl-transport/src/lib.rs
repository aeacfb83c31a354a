//! Chat-facing side of remote host control.
//!
//! Provides:
//! - `ChatAgent` - Gate, commands, reasoning, dispatch and routing for one message
//! - `OutputRouter` - Inline text vs. file attachments for a turn
//! - `ChatTransport` + `deliver` - Sending routed replies
//! - `JsonPlanReasoner` - Plans supplied directly as JSON
//! - Wire protocol (JSON + base64)
//! - WebSocket transport (feature: websocket)

pub mod agent;
pub mod delivery;
pub mod protocol;
pub mod reasoner;
pub mod router;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use agent::{ChatAgent, Inbound};
pub use delivery::{ChatTransport, TransportError, deliver};
pub use protocol::{ClientMessage, ServerMessage};
pub use reasoner::JsonPlanReasoner;
pub use router::{Attachment, OutputRouter, Reply};

#[cfg(feature = "websocket")]
pub use websocket::{ConnectError, ConnectionAuth, WsOutbound, create_ws_router};

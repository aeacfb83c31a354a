//! WebSocket chat transport.

use std::{collections::HashMap, path::Path, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use hostctl_core::{CallerId, Reasoner};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    agent::ChatAgent,
    delivery::{ChatTransport, TransportError, deliver},
    protocol::{ClientMessage, ServerMessage},
};

/// Why a connection was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Cross-origin connection from {0}")]
    CrossOrigin(String),
    #[error("Missing connection token")]
    MissingToken,
    #[error("Unknown connection token")]
    UnknownToken,
    #[error("Invalid caller token entry {0:?}, expected caller=token")]
    InvalidEntry(String),
}

impl IntoResponse for ConnectError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::CrossOrigin(_) => StatusCode::FORBIDDEN,
            Self::MissingToken | Self::UnknownToken => StatusCode::UNAUTHORIZED,
            Self::InvalidEntry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Maps connection tokens to the caller they authenticate.
///
/// With no tokens configured every connection gets its own anonymous caller
/// id, which only an open authorization gate lets through.
#[derive(Debug, Clone, Default)]
pub struct ConnectionAuth {
    tokens: HashMap<String, CallerId>,
}

impl ConnectionAuth {
    #[must_use]
    pub fn new(pairs: impl IntoIterator<Item = (CallerId, String)>) -> Self {
        let tokens = pairs
            .into_iter()
            .filter(|(caller, token)| !caller.as_str().is_empty() && !token.trim().is_empty())
            .map(|(caller, token)| (token.trim().to_string(), caller))
            .collect();
        Self { tokens }
    }

    /// Parse `caller=token` entries; blank entries are skipped.
    ///
    /// # Errors
    /// Returns `ConnectError::InvalidEntry` for an entry without both parts.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, ConnectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pairs = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('=') {
                Some((caller, token)) if !caller.trim().is_empty() && !token.trim().is_empty() => {
                    pairs.push((CallerId::new(caller), token.to_string()));
                }
                _ => return Err(ConnectError::InvalidEntry(entry.to_string())),
            }
        }
        Ok(Self::new(pairs))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Callers that can authenticate.
    pub fn callers(&self) -> impl Iterator<Item = &CallerId> {
        self.tokens.values()
    }

    /// Fix the caller of a new connection.
    ///
    /// A browser `Origin` must match the `Host` it connects to. The token is
    /// taken from an `Authorization: Bearer` header, else from `query_token`.
    ///
    /// # Errors
    /// Returns a `ConnectError` when the origin or the token is rejected.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<CallerId, ConnectError> {
        check_origin(headers)?;

        if self.tokens.is_empty() {
            return Ok(CallerId::new(format!("anon-{}", uuid::Uuid::new_v4().simple())));
        }

        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .or(query_token)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConnectError::MissingToken)?;

        self.tokens
            .get(token)
            .cloned()
            .ok_or(ConnectError::UnknownToken)
    }
}

fn check_origin(headers: &HeaderMap) -> Result<(), ConnectError> {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Ok(());
    };
    let origin = origin.to_str().unwrap_or_default();
    let origin_host = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if host.is_empty() || !origin_host.eq_ignore_ascii_case(host) {
        return Err(ConnectError::CrossOrigin(origin.to_string()));
    }
    Ok(())
}

/// WebSocket handler state.
pub struct WsState<R> {
    pub agent: Arc<ChatAgent<R>>,
    pub auth: Arc<ConnectionAuth>,
}

impl<R> Clone for WsState<R> {
    fn clone(&self) -> Self {
        Self {
            agent: Arc::clone(&self.agent),
            auth: Arc::clone(&self.auth),
        }
    }
}

/// Query parameters of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Outbound half of one socket, usable as a chat transport.
#[derive(Debug, Clone)]
pub struct WsOutbound {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl WsOutbound {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { tx }
    }

    fn push(&self, msg: ServerMessage) -> Result<(), TransportError> {
        self.tx.send(msg).map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl ChatTransport for WsOutbound {
    async fn send_text(&self, _chat: &CallerId, text: &str) -> Result<(), TransportError> {
        self.push(ServerMessage::Text {
            text: text.to_string(),
        })
    }

    async fn send_document(
        &self,
        _chat: &CallerId,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| TransportError::Attachment {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        self.push(ServerMessage::document(
            file_name,
            caption.map(ToString::to_string),
            &data,
        ))
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler. The caller is fixed here, before the
/// upgrade, and holds for the whole connection.
pub async fn ws_handler<R>(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<ConnectParams>,
    State(state): State<WsState<R>>,
) -> Response
where
    R: Reasoner + 'static,
{
    match state.auth.authenticate(&headers, params.token.as_deref()) {
        Ok(caller) => {
            tracing::info!(caller = %caller, "WebSocket connected");
            ws.on_upgrade(move |socket| handle_socket(socket, state, caller))
        }
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket connection refused");
            e.into_response()
        }
    }
}

async fn handle_socket<R>(socket: WebSocket, state: WsState<R>, caller: CallerId)
where
    R: Reasoner + 'static,
{
    let (mut sender, mut receiver) = socket.split();

    // Channel for sending messages to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let outbound = WsOutbound::new(tx);

    // Spawn task to forward messages to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // One message at a time per socket.
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s.into(),
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        let client_msg: ClientMessage = match serde_json::from_str(msg.as_str()) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Invalid client message: {e}");
                let _ = outbound.push(ServerMessage::Error {
                    message: format!("Invalid message: {e}"),
                });
                continue;
            }
        };

        match client_msg {
            ClientMessage::Ping => {
                let _ = outbound.push(ServerMessage::Pong);
            }
            ClientMessage::ListCapabilities => {
                let capabilities = state.agent.dispatcher().capabilities().describe();
                let _ = outbound.push(ServerMessage::Capabilities { capabilities });
            }
            other => match other.into_inbound(&caller) {
                Some(Ok(inbound)) => {
                    let reply = state.agent.handle(inbound).await;
                    if let Err(e) = deliver(reply, &caller, &outbound).await {
                        tracing::warn!(caller = %caller, error = %e, "Reply not delivered");
                        if matches!(e, TransportError::Closed) {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    let _ = outbound.push(ServerMessage::Error {
                        message: format!("Invalid upload data: {e}"),
                    });
                }
                None => {}
            },
        }
    }

    send_task.abort();
}

/// Create WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(agent, ConnectionAuth::default()));
/// ```
#[must_use]
pub fn create_ws_router<R>(agent: Arc<ChatAgent<R>>, auth: ConnectionAuth) -> axum::Router
where
    R: Reasoner + 'static,
{
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler::<R>))
        .with_state(WsState {
            agent,
            auth: Arc::new(auth),
        })
}

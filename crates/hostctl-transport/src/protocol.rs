//! Wire protocol for chat clients.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hostctl_core::{CallerId, CapabilityInfo};
use serde::{Deserialize, Serialize};

use crate::agent::Inbound;

/// Message from client to server.
///
/// Messages carry no caller identity; the connection fixes it once it is
/// authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Chat text.
    Message { text: String },
    /// Document upload (base64 encoded).
    Upload { file_name: String, data: String },
    /// Ask for the capability catalog.
    ListCapabilities,
    /// Ping for keepalive.
    Ping,
}

impl ClientMessage {
    /// Create an upload message from raw bytes.
    #[must_use]
    pub fn upload(file_name: impl Into<String>, data: &[u8]) -> Self {
        Self::Upload {
            file_name: file_name.into(),
            data: BASE64.encode(data),
        }
    }

    /// Convert into an agent inbound message from `caller`.
    ///
    /// Returns `None` for control messages, `Some(Err)` for undecodable uploads.
    #[must_use]
    pub fn into_inbound(self, caller: &CallerId) -> Option<Result<Inbound, base64::DecodeError>> {
        match self {
            Self::Message { text } => Some(Ok(Inbound::Message {
                caller: caller.clone(),
                text,
            })),
            Self::Upload { file_name, data } => Some(BASE64.decode(data).map(|data| Inbound::Upload {
                caller: caller.clone(),
                file_name,
                data,
            })),
            Self::ListCapabilities | Self::Ping => None,
        }
    }
}

/// Message from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply text.
    Text { text: String },
    /// File attachment (base64 encoded).
    Document {
        file_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        data: String,
    },
    /// Capability catalog.
    Capabilities { capabilities: Vec<CapabilityInfo> },
    /// Error message.
    Error { message: String },
    /// Pong response.
    Pong,
}

impl ServerMessage {
    /// Create a document message from raw bytes.
    #[must_use]
    pub fn document(file_name: impl Into<String>, caption: Option<String>, data: &[u8]) -> Self {
        Self::Document {
            file_name: file_name.into(),
            caption,
            data: BASE64.encode(data),
        }
    }

    /// Decode document data from base64.
    #[must_use]
    pub fn decode_document(&self) -> Option<Vec<u8>> {
        if let Self::Document { data, .. } = self {
            BASE64.decode(data).ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_shape() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"message","text":"hi"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Message { text: "hi".into() });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"list_capabilities"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ListCapabilities);
    }

    #[test]
    fn test_upload_decodes_to_inbound() {
        let inbound = ClientMessage::upload("a.bin", &[0, 1, 2])
            .into_inbound(&CallerId::from("7"))
            .unwrap()
            .unwrap();
        assert_eq!(
            inbound,
            Inbound::Upload {
                caller: CallerId::from("7"),
                file_name: "a.bin".into(),
                data: vec![0, 1, 2],
            }
        );
    }

    #[test]
    fn test_bad_base64_upload_is_error() {
        let caller = CallerId::from("7");
        let msg = ClientMessage::Upload {
            file_name: "a.bin".into(),
            data: "***".into(),
        };
        assert!(msg.into_inbound(&caller).unwrap().is_err());
        assert!(ClientMessage::Ping.into_inbound(&caller).is_none());
    }

    #[test]
    fn test_claimed_caller_id_is_ignored() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"message","caller_id":"42","text":"ls"}"#).unwrap();
        let inbound = msg.into_inbound(&CallerId::from("1")).unwrap().unwrap();
        assert_eq!(inbound.caller(), &CallerId::from("1"));
    }

    #[test]
    fn test_document_without_caption_omits_field() {
        let msg = ServerMessage::document("r.txt", None, b"abc");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "document");
        assert!(json.get("caption").is_none());
        assert_eq!(msg.decode_document().unwrap(), b"abc");
    }
}

//! Sending routed replies through a chat transport.

use std::path::Path;

use async_trait::async_trait;
use hostctl_core::CallerId;
use thiserror::Error;

use crate::router::{FALLBACK_TEXT, Reply};

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("Failed to read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Send failed: {0}")]
    Send(String),
}

/// Outbound side of a chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat: &CallerId, text: &str) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        chat: &CallerId,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), TransportError>;
}

/// Send a reply: text first, then attachments in order.
///
/// Attachments that vanished or cannot be read are skipped. If nothing at all
/// could be sent, the fallback text is sent instead. Temporary attachments are
/// removed afterwards whether or not sending succeeded.
///
/// # Errors
/// Returns the first connection or send error; later sends are not attempted.
pub async fn deliver<T>(reply: Reply, chat: &CallerId, transport: &T) -> Result<(), TransportError>
where
    T: ChatTransport + ?Sized,
{
    let result = send_all(&reply, chat, transport).await;

    for attachment in reply.attachments.iter().filter(|a| a.temporary) {
        if let Err(e) = tokio::fs::remove_file(&attachment.path).await {
            tracing::warn!(path = %attachment.path.display(), error = %e, "Failed to remove temporary file");
        }
    }

    if let Err(e) = &result {
        tracing::error!(chat = %chat, error = %e, "Failed to deliver reply");
    }
    result
}

async fn send_all<T>(reply: &Reply, chat: &CallerId, transport: &T) -> Result<(), TransportError>
where
    T: ChatTransport + ?Sized,
{
    let mut sent = 0usize;
    if let Some(text) = &reply.text {
        transport.send_text(chat, text).await?;
        sent += 1;
    }
    for attachment in &reply.attachments {
        if !attachment.path.is_file() {
            tracing::warn!(path = %attachment.path.display(), "Attachment vanished before send");
            continue;
        }
        match transport
            .send_document(chat, &attachment.path, attachment.caption.as_deref())
            .await
        {
            Ok(()) => sent += 1,
            Err(e @ TransportError::Attachment { .. }) => {
                tracing::warn!(error = %e, "Skipping unreadable attachment");
            }
            Err(e) => return Err(e),
        }
    }
    if sent == 0 {
        transport.send_text(chat, FALLBACK_TEXT).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Mutex};

    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::router::Attachment;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text(String),
        Document(PathBuf, Option<String>),
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Sent>>,
        fail_documents: bool,
        unreadable: Option<PathBuf>,
    }

    #[async_trait]
    impl ChatTransport for Recorder {
        async fn send_text(&self, _chat: &CallerId, text: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(Sent::Text(text.into()));
            Ok(())
        }

        async fn send_document(
            &self,
            _chat: &CallerId,
            path: &Path,
            caption: Option<&str>,
        ) -> Result<(), TransportError> {
            if self.fail_documents {
                return Err(TransportError::Send("upload rejected".into()));
            }
            if self.unreadable.as_deref() == Some(path) {
                return Err(TransportError::Attachment {
                    path: path.display().to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Document(path.to_path_buf(), caption.map(Into::into)));
            Ok(())
        }
    }

    fn attachment(path: PathBuf, temporary: bool) -> Attachment {
        Attachment {
            path,
            caption: Some("cap".into()),
            temporary,
        }
    }

    #[tokio::test]
    async fn test_text_then_attachments_skipping_vanished() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("a.txt");
        std::fs::write(&present, "a").unwrap();
        let reply = Reply {
            text: Some("hello".into()),
            attachments: vec![
                attachment(dir.path().join("gone.txt"), false),
                attachment(present.clone(), false),
            ],
        };

        let transport = Recorder::default();
        assert_ok!(deliver(reply, &CallerId::from("1"), &transport).await);
        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![
                Sent::Text("hello".into()),
                Sent::Document(present.clone(), Some("cap".into())),
            ]
        );
        assert!(present.exists());
    }

    #[tokio::test]
    async fn test_temporary_files_removed_even_on_failure() {
        let dir = TempDir::new().unwrap();
        let overflow = dir.path().join("response_x.txt");
        std::fs::write(&overflow, "long").unwrap();
        let reply = Reply {
            text: None,
            attachments: vec![attachment(overflow.clone(), true)],
        };

        let transport = Recorder {
            fail_documents: true,
            ..Recorder::default()
        };
        let err = assert_err!(deliver(reply, &CallerId::from("1"), &transport).await);
        assert!(err.to_string().contains("upload rejected"));
        assert!(!overflow.exists());
    }

    #[tokio::test]
    async fn test_unreadable_attachment_does_not_stop_later_ones() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.bin");
        let second = dir.path().join("b.bin");
        std::fs::write(&first, "a").unwrap();
        std::fs::write(&second, "b").unwrap();
        let reply = Reply {
            text: Some("two files".into()),
            attachments: vec![attachment(first.clone(), false), attachment(second.clone(), false)],
        };

        let transport = Recorder {
            unreadable: Some(first),
            ..Recorder::default()
        };
        assert_ok!(deliver(reply, &CallerId::from("1"), &transport).await);
        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![
                Sent::Text("two files".into()),
                Sent::Document(second, Some("cap".into())),
            ]
        );
    }

    #[tokio::test]
    async fn test_vanished_overflow_file_falls_back_to_text() {
        let dir = TempDir::new().unwrap();
        let router = crate::router::OutputRouter::new(dir.path());
        let reply = router.route(&[hostctl_core::TurnItem::Text("x".repeat(5000))]);
        assert!(reply.text.is_none());
        for attachment in &reply.attachments {
            std::fs::remove_file(&attachment.path).unwrap();
        }

        let transport = Recorder::default();
        assert_ok!(deliver(reply, &CallerId::from("1"), &transport).await);
        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![Sent::Text(FALLBACK_TEXT.into())]
        );
    }

    #[tokio::test]
    async fn test_only_unreadable_attachment_falls_back_to_text() {
        let dir = TempDir::new().unwrap();
        let shot = dir.path().join("shot.png");
        std::fs::write(&shot, "png").unwrap();
        let reply = Reply {
            text: None,
            attachments: vec![attachment(shot.clone(), false)],
        };

        let transport = Recorder {
            unreadable: Some(shot),
            ..Recorder::default()
        };
        assert_ok!(deliver(reply, &CallerId::from("1"), &transport).await);
        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![Sent::Text(FALLBACK_TEXT.into())]
        );
    }
}

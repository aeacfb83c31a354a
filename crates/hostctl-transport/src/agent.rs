//! One inbound chat message in, one routed reply out.

use std::path::{Path, PathBuf};

use hostctl_core::{CallerId, CapabilityError, Reasoner, ResultEnvelope, TurnItem};
use hostctl_session::{Dispatcher, REJECTION_TEXT};

use crate::router::{OutputRouter, Reply};

pub const WELCOME_TEXT: &str = "🤖 Welcome to hostctl!

I control this machine on your behalf.

What I can do:
📁 Browse, create and delete files and folders
📝 Read, write, copy, move and rename files
💻 Run shell commands
🔐 Encrypt and decrypt folders
📸 Take screenshots and 🎥 record the screen
📦 Send you files and zipped folders

Commands:
/start - Show this message
/help - Examples
/clear - Forget the conversation
/info - Host information";

pub const HELP_TEXT: &str = "📖 Examples

Files:
• Read config.txt
• Create notes/todo.txt containing \"buy milk\"
• Copy report.pdf into backup/
• Rename every photo in ~/Pictures to holiday_N

Folders:
• Where am I?
• Change to ~/projects
• List the files in Downloads
• Send me the logs folder

System:
• Run: df -h
• Make deploy.sh executable (755)
• Encrypt everything in ~/private

Screen:
• Take a screenshot
• Record the screen for 15 seconds

You can also drop a file into the chat to upload it.";

pub const CLEARED_TEXT: &str = "🗑️ Conversation context cleared! Starting fresh.";

/// A message arriving from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message {
        caller: CallerId,
        text: String,
    },
    Upload {
        caller: CallerId,
        file_name: String,
        data: Vec<u8>,
    },
}

impl Inbound {
    #[must_use]
    pub const fn caller(&self) -> &CallerId {
        match self {
            Self::Message { caller, .. } | Self::Upload { caller, .. } => caller,
        }
    }
}

/// Wires gate, sessions, reasoning, dispatch and routing together.
pub struct ChatAgent<R> {
    dispatcher: Dispatcher,
    reasoner: R,
    router: OutputRouter,
    upload_dir: PathBuf,
}

impl<R: Reasoner> ChatAgent<R> {
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        reasoner: R,
        router: OutputRouter,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dispatcher,
            reasoner,
            router,
            upload_dir: upload_dir.into(),
        }
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one inbound message.
    pub async fn handle(&self, inbound: Inbound) -> Reply {
        let caller = inbound.caller().clone();
        if !self.dispatcher.is_authorized(&caller) {
            tracing::warn!(caller = %caller, "Rejected unauthorized caller");
            return Reply::text(REJECTION_TEXT);
        }

        match inbound {
            Inbound::Upload {
                file_name, data, ..
            } => self.route_one(self.save_upload(&file_name, &data).await),
            Inbound::Message { text, .. } => {
                if let Some(reply) = self.command(&caller, &text) {
                    return reply;
                }
                self.converse(&caller, &text).await
            }
        }
    }

    fn route_one(&self, envelope: ResultEnvelope) -> Reply {
        self.router.route(&[TurnItem::Envelope(envelope)])
    }

    fn command(&self, caller: &CallerId, text: &str) -> Option<Reply> {
        let word = text.split_whitespace().next()?;
        // Group chats address commands as /cmd@botname.
        let command = word.split('@').next().unwrap_or(word);
        let envelope = match command {
            "/start" => ResultEnvelope::info(WELCOME_TEXT),
            "/help" => ResultEnvelope::info(HELP_TEXT),
            "/clear" => {
                if let Err(e) = self.dispatcher.clear_session(caller) {
                    return Some(Reply::text(e.to_string()));
                }
                ResultEnvelope::info(CLEARED_TEXT)
            }
            "/info" => system_info(),
            _ => return None,
        };
        tracing::debug!(caller = %caller, command, "Built-in command");
        Some(self.route_one(envelope))
    }

    async fn converse(&self, caller: &CallerId, text: &str) -> Reply {
        let session = match self.dispatcher.session(caller) {
            Ok(session) => session,
            Err(e) => return Reply::text(e.to_string()),
        };

        let plan = match self.reasoner.plan(&session, text).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(caller = %caller, error = %e, "Reasoning failed");
                return Reply::text(format!(
                    "❌ Error: {e}\n\nPlease try again or rephrase your request."
                ));
            }
        };

        match self.dispatcher.execute(caller, &plan).await {
            Ok(items) => self.router.route(&items),
            Err(e) => Reply::text(e.to_string()),
        }
    }

    async fn save_upload(&self, file_name: &str, data: &[u8]) -> ResultEnvelope {
        match store_upload(&self.upload_dir, file_name, data).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), bytes = data.len(), "Upload saved");
                ResultEnvelope::info(format!(
                    "✅ File uploaded successfully!\n📁 Saved to: {}",
                    path.display()
                ))
                .with_capability("upload")
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upload failed");
                ResultEnvelope::error(format!("❌ Error saving file: {e}")).with_capability("upload")
            }
        }
    }
}

/// Save under `dir`, keeping only the final component of `file_name`.
async fn store_upload(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf, CapabilityError> {
    let name = Path::new(file_name)
        .file_name()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CapabilityError::InvalidArgument(format!("invalid file name: {file_name:?}")))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(CapabilityError::io(format!("Failed to create {}", dir.display())))?;
    let path = dir.join(name);
    tokio::fs::write(&path, data)
        .await
        .map_err(CapabilityError::io(format!("Failed to write {}", path.display())))?;
    Ok(path)
}

fn system_info() -> ResultEnvelope {
    let cwd = std::env::current_dir()
        .map_or_else(|e| format!("unavailable ({e})"), |p| p.display().to_string());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "N/A".to_string());
    let os = std::env::consts::OS;
    ResultEnvelope::info(format!(
        "💻 System Information\n\n📂 Current Directory: {cwd}\n🖥️ OS: {os}\n👤 User: {user}"
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use hostctl_core::{
        AgentConfig, CapabilityArgs, PlanStep, ReasonerError, SessionHandle,
    };
    use hostctl_session::{AuthorizationGate, SessionRegistry};
    use tempfile::TempDir;

    use super::*;
    use crate::{reasoner::JsonPlanReasoner, router::FALLBACK_TEXT};

    /// Returns a fixed plan and counts calls.
    struct Scripted {
        plan: Vec<PlanStep>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Reasoner for Scripted {
        async fn plan(
            &self,
            _session: &SessionHandle,
            _message: &str,
        ) -> Result<Vec<PlanStep>, ReasonerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.plan.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl Reasoner for Broken {
        async fn plan(
            &self,
            _session: &SessionHandle,
            _message: &str,
        ) -> Result<Vec<PlanStep>, ReasonerError> {
            Err(ReasonerError::Unavailable("model offline".into()))
        }
    }

    fn agent<R: Reasoner>(allow: &[&str], reasoner: R, dir: &TempDir) -> ChatAgent<R> {
        let config = AgentConfig {
            artifact_dir: dir.path().join("artifacts"),
            ..AgentConfig::default()
        };
        let dispatcher = Dispatcher::new(
            AuthorizationGate::new(allow.iter().map(|id| CallerId::from(*id))),
            Arc::new(SessionRegistry::new()),
            hostctl_capabilities::default_capabilities(&config),
        );
        ChatAgent::new(
            dispatcher,
            reasoner,
            OutputRouter::new(&config.artifact_dir),
            dir.path().join("uploads"),
        )
    }

    fn message(caller: &str, text: &str) -> Inbound {
        Inbound::Message {
            caller: CallerId::from(caller),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_caller_gets_rejection_only() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let agent = agent(
            &["1"],
            Scripted {
                plan: vec![PlanStep::invoke("get_cwd", CapabilityArgs::new())],
                calls: Arc::clone(&calls),
            },
            &dir,
        );

        let reply = agent.handle(message("99", "hello")).await;
        assert_eq!(reply, Reply::text(REJECTION_TEXT));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let reply = agent
            .handle(Inbound::Upload {
                caller: CallerId::from("99"),
                file_name: "x.txt".into(),
                data: b"x".to_vec(),
            })
            .await;
        assert_eq!(reply, Reply::text(REJECTION_TEXT));
        assert!(!dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_commands_answer_without_reasoning() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let agent = agent(
            &[],
            Scripted {
                plan: Vec::new(),
                calls: Arc::clone(&calls),
            },
            &dir,
        );

        let reply = agent.handle(message("1", "/start")).await;
        assert!(reply.text.unwrap().contains("/help"));
        let reply = agent.handle(message("1", "/help@hostctl_bot")).await;
        assert!(reply.text.unwrap().starts_with("📖 Examples"));
        let reply = agent.handle(message("1", "/info")).await;
        assert!(reply.text.unwrap().contains("OS:"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_resets_session() {
        let dir = TempDir::new().unwrap();
        let agent = agent(&["1"], JsonPlanReasoner, &dir);
        let caller = CallerId::from("1");
        let before = agent.dispatcher().session(&caller).unwrap();

        let reply = agent.handle(message("1", "/clear")).await;
        assert_eq!(reply.text.as_deref(), Some(CLEARED_TEXT));
        assert_ne!(agent.dispatcher().session(&caller).unwrap().id, before.id);
    }

    #[tokio::test]
    async fn test_plan_is_dispatched_and_routed() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("hello.txt");
        std::fs::write(&file, "hi there").unwrap();
        let agent = agent(&[], JsonPlanReasoner, &dir);

        let plan = serde_json::json!([
            { "type": "text", "text": "Here it is:" },
            { "type": "invoke", "capability": "download_file", "args": { "file_path": file } }
        ]);
        let reply = agent.handle(message("1", &plan.to_string())).await;
        let text = reply.text.unwrap();
        assert!(text.starts_with("Here it is:\n\nFile ready for download"));
        assert_eq!(reply.attachments.len(), 1);
        assert_eq!(reply.attachments[0].path, file);
    }

    #[tokio::test]
    async fn test_reasoner_failure_text() {
        let dir = TempDir::new().unwrap();
        let agent = agent(&[], Broken, &dir);
        let reply = agent.handle(message("1", "do things")).await;
        assert_eq!(
            reply.text.as_deref(),
            Some(
                "❌ Error: Reasoning service unavailable: model offline\n\nPlease try again or rephrase your request."
            )
        );
    }

    #[tokio::test]
    async fn test_empty_plan_gets_fallback() {
        let dir = TempDir::new().unwrap();
        let agent = agent(
            &[],
            Scripted {
                plan: Vec::new(),
                calls: Arc::new(AtomicUsize::new(0)),
            },
            &dir,
        );
        let reply = agent.handle(message("1", "anything")).await;
        assert_eq!(reply.text.as_deref(), Some(FALLBACK_TEXT));
    }

    #[tokio::test]
    async fn test_upload_keeps_only_file_name() {
        let dir = TempDir::new().unwrap();
        let agent = agent(&[], JsonPlanReasoner, &dir);

        let reply = agent
            .handle(Inbound::Upload {
                caller: CallerId::from("1"),
                file_name: "../../etc/evil.txt".into(),
                data: b"payload".to_vec(),
            })
            .await;
        let saved = dir.path().join("uploads").join("evil.txt");
        assert_eq!(std::fs::read(&saved).unwrap(), b"payload");
        assert_eq!(
            reply.text.unwrap(),
            format!("✅ File uploaded successfully!\n📁 Saved to: {}", saved.display())
        );
    }

    #[tokio::test]
    async fn test_upload_without_name_is_error() {
        let dir = TempDir::new().unwrap();
        let agent = agent(&[], JsonPlanReasoner, &dir);
        let reply = agent
            .handle(Inbound::Upload {
                caller: CallerId::from("1"),
                file_name: "..".into(),
                data: Vec::new(),
            })
            .await;
        assert!(reply.text.unwrap().starts_with("❌ Error saving file"));
    }
}

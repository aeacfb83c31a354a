//! WebSocket chat server for remote host control.
//!
//! Run with: cargo run -p hostctl-server -- --allowed-callers 42 --caller-tokens 42=s3cret
//!
//! Then open http://localhost:3000/?token=s3cret in your browser.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, response::Html, routing::get};
use clap::Parser;
use hostctl_capabilities::default_capabilities;
use hostctl_core::{AgentConfig, ScreenConfig};
use hostctl_session::{AuthorizationGate, Dispatcher, SessionRegistry};
use hostctl_transport::{ChatAgent, ConnectionAuth, JsonPlanReasoner, OutputRouter, create_ws_router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(author, version, about = "Chat-driven remote control for this host")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOSTCTL_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Comma-separated list of allowed caller IDs (empty = allow all)
    #[arg(long, env = "HOSTCTL_ALLOWED_CALLERS", default_value = "")]
    allowed_callers: String,

    /// Comma-separated `caller=token` pairs authenticating WebSocket connections
    #[arg(long, env = "HOSTCTL_CALLER_TOKENS", value_delimiter = ',')]
    caller_tokens: Vec<String>,

    /// Directory for screenshots, recordings, archives and overflow replies
    #[arg(long, env = "HOSTCTL_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,

    /// Directory uploaded documents are saved to
    #[arg(long, env = "HOSTCTL_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Append raw result envelopes to every reply
    #[arg(long, env = "HOSTCTL_DEBUG")]
    debug: bool,

    /// Recording length when none is requested, in seconds
    #[arg(long, env = "HOSTCTL_RECORDING_SECS", default_value_t = 10)]
    recording_secs: u64,

    /// Longest allowed recording, in seconds
    #[arg(long, env = "HOSTCTL_MAX_RECORDING_SECS", default_value_t = 60)]
    max_recording_secs: u64,

    /// Recording frame rate
    #[arg(long, env = "HOSTCTL_RECORDING_FPS", default_value_t = 7)]
    recording_fps: u32,

    /// Screenshot command; the output path is appended
    #[arg(long, env = "HOSTCTL_CAPTURE_COMMAND")]
    capture_command: Option<String>,

    /// Replacement for ffmpeg when recording
    #[arg(long, env = "HOSTCTL_RECORD_COMMAND")]
    record_command: Option<String>,
}

impl Cli {
    fn into_config(self) -> AgentConfig {
        let defaults = AgentConfig::default();
        AgentConfig {
            allow_list: AgentConfig::parse_allow_list(&self.allowed_callers),
            artifact_dir: self.artifact_dir.unwrap_or(defaults.artifact_dir),
            upload_dir: self.upload_dir,
            debug: self.debug,
            screen: ScreenConfig {
                default_recording_secs: self.recording_secs,
                max_recording_secs: self.max_recording_secs,
                recording_fps: self.recording_fps,
                capture_command: self.capture_command,
                record_command: self.record_command,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let bind = cli.bind;
    let auth = ConnectionAuth::from_entries(&cli.caller_tokens).context("parsing caller tokens")?;
    let config = cli.into_config();

    tokio::fs::create_dir_all(&config.artifact_dir)
        .await
        .with_context(|| format!("creating artifact dir {}", config.artifact_dir.display()))?;

    let gate = AuthorizationGate::new(config.allow_list.iter().cloned());
    if auth.is_empty() && !gate.is_open() {
        tracing::warn!("No caller tokens configured; every WebSocket connection will be refused");
    }
    for caller in auth.callers().filter(|c| !gate.is_authorized(c)) {
        tracing::warn!(caller = %caller, "Token configured for a caller outside the allow-list");
    }
    let sessions = Arc::new(SessionRegistry::with_callers(gate.callers()));
    let capabilities = default_capabilities(&config);
    tracing::info!(
        capabilities = capabilities.len(),
        sessions = sessions.len(),
        artifact_dir = %config.artifact_dir.display(),
        "Agent ready"
    );

    let dispatcher = Dispatcher::new(gate, sessions, capabilities);
    let router = OutputRouter::new(&config.artifact_dir).with_debug(config.debug);
    let agent = Arc::new(ChatAgent::new(
        dispatcher,
        JsonPlanReasoner,
        router,
        &config.upload_dir,
    ));

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .merge(create_ws_router(agent, auth))
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!("Server listening on http://{bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>hostctl</title>
    <style>
        body {
            margin: 0;
            padding: 20px;
            background: #1e1e1e;
            color: #d4d4d4;
            font-family: system-ui, sans-serif;
        }
        h1 { color: #fff; margin-bottom: 10px; }
        #log {
            height: calc(100vh - 200px);
            overflow-y: auto;
            white-space: pre-wrap;
            font-family: Menlo, Monaco, "Courier New", monospace;
        }
        .out { color: #9cdcfe; }
        .err { color: #a44; }
        .status { color: #888; font-size: 14px; margin-bottom: 10px; }
        .connected { color: #4a4; }
        .disconnected { color: #a44; }
        form { display: flex; gap: 8px; margin-top: 10px; }
        input[type=text] { flex: 1; }
    </style>
</head>
<body>
    <h1>hostctl</h1>
    <div class="status" id="status">Connecting...</div>
    <div id="log"></div>
    <form id="form">
        <input id="text" type="text" placeholder="/help or a JSON plan" />
        <input id="file" type="file" />
        <button>Send</button>
    </form>

    <script>
        const log = document.getElementById('log');
        const status = document.getElementById('status');
        let ws;

        function append(text, cls) {
            const line = document.createElement('div');
            line.className = cls;
            line.textContent = text;
            log.appendChild(line);
            log.scrollTop = log.scrollHeight;
        }

        function connect() {
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            const token = new URLSearchParams(window.location.search).get('token') || '';
            ws = new WebSocket(`${protocol}//${window.location.host}/ws?token=${encodeURIComponent(token)}`);

            ws.onopen = () => {
                status.textContent = 'Connected';
                status.className = 'status connected';
            };

            ws.onclose = () => {
                status.textContent = 'Disconnected - reconnecting...';
                status.className = 'status disconnected';
                setTimeout(connect, 2000);
            };

            ws.onmessage = (event) => {
                const msg = JSON.parse(event.data);
                if (msg.type === 'text') {
                    append(msg.text, 'out');
                } else if (msg.type === 'document') {
                    const bytes = Uint8Array.from(atob(msg.data), c => c.charCodeAt(0));
                    const link = document.createElement('a');
                    link.href = URL.createObjectURL(new Blob([bytes]));
                    link.download = msg.file_name;
                    link.textContent = `📎 ${msg.file_name}${msg.caption ? ' - ' + msg.caption : ''}`;
                    log.appendChild(link);
                    log.appendChild(document.createElement('br'));
                } else if (msg.type === 'capabilities') {
                    append(msg.capabilities.map(c => `${c.name}: ${c.description}`).join('\n'), 'out');
                } else if (msg.type === 'error') {
                    append(`[Error: ${msg.message}]`, 'err');
                }
            };
        }

        document.getElementById('form').onsubmit = (e) => {
            e.preventDefault();
            const text = document.getElementById('text');
            const file = document.getElementById('file');
            if (file.files.length) {
                const f = file.files[0];
                const reader = new FileReader();
                reader.onload = () => {
                    const data = reader.result.split(',')[1];
                    ws.send(JSON.stringify({ type: 'upload', file_name: f.name, data }));
                };
                reader.readAsDataURL(f);
                file.value = '';
            }
            if (text.value) {
                append(`> ${text.value}`, '');
                ws.send(JSON.stringify({ type: 'message', text: text.value }));
                text.value = '';
            }
        };

        connect();
    </script>
</body>
</html>
"#;

// Droid session CLI
//
// Sends each line read from stdin as a user message to one Droid session and
// prints the assistant's replies. Configured through DROID_BIN, DROID_MODEL
// and DROID_MACHINE_ID; an optional first argument names a session to resume.

use std::sync::Arc;

use anyhow::{Context, Result};
use kodegen_droid_agent::{
    InboundRequest, InboundRequestKind, ManagerConfig, ManagerEvent, SessionEvent, SessionId,
    SessionManager, UserMessageRequest,
};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = ManagerConfig::from_env().context("Invalid DROID_* environment")?;
    let manager = Arc::new(SessionManager::new(config)?);
    let mut session_id = std::env::args()
        .nth(1)
        .map_or_else(SessionId::placeholder, SessionId::from);

    let (turn_tx, mut turn_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(Arc::clone(&manager), turn_tx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        manager
            .send_user_message(UserMessageRequest::new(session_id.clone(), text))
            .await;
        match turn_rx.recv().await {
            Some(0) => {}
            Some(code) => log::warn!("Turn ended with code {code}"),
            None => break,
        }
        if let Some(current) = manager.resolve_id(&session_id) {
            session_id = current;
        }
    }

    let disposed = manager.dispose_all_sessions();
    log::info!("Disposed {disposed} session(s)");
    printer.abort();
    Ok(())
}

async fn print_events(manager: Arc<SessionManager>, turns: mpsc::UnboundedSender<i32>) {
    let mut events = manager.subscribe();
    let mut stdout = tokio::io::stdout();

    loop {
        let ManagerEvent { session_id, event } = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Skipped {skipped} events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match &event {
            SessionEvent::InboundRequest(request) => {
                let answer = automatic_answer(request);
                log::info!("Answering {} for {session_id} with {answer}", request.method);
                if let Err(e) = manager.respond(&session_id, &request.id, answer) {
                    log::error!("Failed to answer {}: {e}", request.id);
                }
            }
            SessionEvent::TurnEnded { code } => {
                let _ = stdout.write_all(b"\n").await;
                let _ = stdout.flush().await;
                let _ = turns.send(*code);
            }
            SessionEvent::SessionIdReplaced { current, .. } => {
                log::info!("Session id is now {current}");
            }
            SessionEvent::Error { message } => log::error!("[{session_id}] {message}"),
            SessionEvent::Stderr(line) => log::debug!("[{session_id}] stderr: {line}"),
            SessionEvent::ProcessExited { code } => {
                log::info!("[{session_id}] droid exited with {code:?}");
            }
            _ => {
                if let Some(text) = event.assistant_text() {
                    let _ = stdout.write_all(text.as_bytes()).await;
                    let _ = stdout.flush().await;
                }
            }
        }
    }
}

/// Non-interactive answer: refuse permissions, leave questions unanswered
fn automatic_answer(request: &InboundRequest) -> Value {
    match request.kind {
        InboundRequestKind::Permission => json!({ "selectedOption": "cancel" }),
        InboundRequestKind::AskUser => json!({ "answer": "" }),
        InboundRequestKind::Other => json!({}),
    }
}

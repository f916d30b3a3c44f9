//! Event subscriptions

use futures::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::types::events::{ManagerEvent, SessionEvent};
use crate::types::identifiers::SessionId;

use super::core::SessionManager;

impl SessionManager {
    /// Subscribe to the events of every session
    ///
    /// Delivery is best effort: a subscriber that falls more than the
    /// configured capacity behind loses the oldest events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    /// Events of one session, following it across rekeys
    ///
    /// The stream ends when the manager and all its sessions are gone.
    pub fn session_events(
        &self,
        session_id: &SessionId,
    ) -> impl Stream<Item = SessionEvent> + Send + 'static {
        let mut rx = self.events.subscribe();
        let mut tracked = self
            .resolve_id(session_id)
            .unwrap_or_else(|| session_id.clone());

        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(ManagerEvent { session_id, event }) => {
                        if let SessionEvent::SessionIdReplaced { previous, current } = &event {
                            if *previous == tracked {
                                tracked = current.clone();
                            }
                        }
                        if session_id == tracked {
                            yield event;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Event stream for {tracked} lagged; skipped {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

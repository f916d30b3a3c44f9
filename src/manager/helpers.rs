//! Helpers shared by the manager submodules

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::types::events::{EventSink, ManagerEvent};
use crate::types::identifiers::SessionId;

/// Event sink that tags each event with the id in `id_cell` at emit time
///
/// Rekeying rewrites the cell, so a sink built before a rekey reports
/// under the new id afterwards.
pub(super) fn fan_out_sink(
    id_cell: Arc<RwLock<SessionId>>,
    events: broadcast::Sender<ManagerEvent>,
) -> EventSink {
    Arc::new(move |event| {
        let session_id = id_cell.read().clone();
        // Nobody listening is not an error.
        let _ = events.send(ManagerEvent { session_id, event });
    })
}

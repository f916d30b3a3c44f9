//! Outstanding outbound requests
//!
//! Every entry is settled exactly once: whoever removes it from the table
//! (response dispatch, its timeout, or process exit) owns the settlement.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::Result;
use crate::protocol::RpcResponse;
use crate::types::identifiers::RequestId;
use crate::types::options::NullIdPolicy;

/// Completion side of an outbound request
pub(super) type Completion = oneshot::Sender<Result<RpcResponse>>;

pub(super) struct PendingRequest {
    pub method: String,
    pub seq: u64,
    pub generation: u64,
    pub created_at: Instant,
    completion: Completion,
    timer: Option<AbortHandle>,
}

impl PendingRequest {
    pub fn new(method: &str, seq: u64, generation: u64, completion: Completion) -> Self {
        Self {
            method: method.to_string(),
            seq,
            generation,
            created_at: Instant::now(),
            completion,
            timer: None,
        }
    }

    /// Stop the timer and hand the outcome to the caller
    pub fn settle(self, outcome: Result<RpcResponse>) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        // The caller may have given up waiting; nothing to do then.
        let _ = self.completion.send(outcome);
    }
}

#[derive(Default)]
pub(super) struct PendingTable {
    entries: HashMap<RequestId, PendingRequest>,
}

impl PendingTable {
    pub fn insert(&mut self, id: RequestId, request: PendingRequest) {
        self.entries.insert(id, request);
    }

    pub fn set_timer(&mut self, id: &RequestId, timer: AbortHandle) {
        match self.entries.get_mut(id) {
            Some(entry) => entry.timer = Some(timer),
            // Already settled before the timer was attached.
            None => timer.abort(),
        }
    }

    pub fn take(&mut self, id: &RequestId) -> Option<PendingRequest> {
        self.entries.remove(id)
    }

    /// Find the request a response belongs to
    ///
    /// Exact id match first; a null id falls back according to `policy`.
    pub fn take_for_response(
        &mut self,
        id: Option<&RequestId>,
        policy: NullIdPolicy,
    ) -> Option<(RequestId, PendingRequest)> {
        let key = match id {
            Some(id) => id.clone(),
            None => {
                let candidates = self.entries.iter().map(|(id, req)| (req.seq, id));
                let chosen = match policy {
                    NullIdPolicy::Oldest => candidates.min_by_key(|(seq, _)| *seq),
                    NullIdPolicy::Newest => candidates.max_by_key(|(seq, _)| *seq),
                    NullIdPolicy::Ignore => None,
                };
                chosen.map(|(_, id)| id.clone())?
            }
        };
        self.entries.remove_entry(&key)
    }

    /// Remove every request sent to the process of `generation`
    pub fn drain_generation(&mut self, generation: u64) -> Vec<(RequestId, PendingRequest)> {
        let ids: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|(_, req)| req.generation == generation)
            .map(|(id, _)| id.clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| self.entries.remove_entry(&id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

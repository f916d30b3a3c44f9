//! Routing of decoded engine output
//!
//! Every item the line parser produces ends up here: responses settle
//! pending requests, inbound requests and notifications become events, and
//! working-state notifications drive the turn state.

use serde_json::Value;

use super::SessionInner;
use super::state::SessionPhase;
use crate::diagnostics::{self, DiagnosticRecord, Direction};
use crate::error::DroidError;
use crate::message::{ParsedLine, SessionNotification};
use crate::protocol::{MessageBody, ProtocolMessage, RpcNotification, RpcRequest, RpcResponse, methods};
use crate::types::events::{InboundRequest, InboundRequestKind, SessionEvent};

/// Turn-ended code reported for failures
pub(super) const TURN_FAILED: i32 = 1;

impl SessionInner {
    pub(super) fn dispatch(&self, generation: u64, item: ParsedLine) {
        match item {
            ParsedLine::Text(text) => {
                log::debug!("droid output: {text}");
                self.emit(SessionEvent::ProcessOutput(text));
            }
            ParsedLine::Message(message) => self.dispatch_message(generation, message),
        }
    }

    fn dispatch_message(&self, generation: u64, message: ProtocolMessage) {
        match message.body {
            MessageBody::Response(response) => {
                diagnostics::record(self.diagnostics.as_ref(), || {
                    DiagnosticRecord::new(
                        Direction::InboundResponse,
                        None,
                        response.id.as_ref(),
                        &response_payload(&response),
                    )
                });
                self.settle_response(response);
            }
            MessageBody::Request(request) => self.forward_request(request),
            MessageBody::Notification(notification) => {
                self.handle_notification(generation, notification);
            }
        }
    }

    fn settle_response(&self, mut response: RpcResponse) {
        let matched = self
            .pending
            .lock()
            .take_for_response(response.id.as_ref(), self.options.null_id_policy);

        let Some((id, entry)) = matched else {
            log::debug!("Dropping response for unknown request {:?}", response.id);
            return;
        };
        if response.id.is_none() {
            log::debug!("Matched null-id response to {id} ({})", entry.method);
            response.id = Some(id);
        }
        log::trace!(
            "{} answered after {:?}",
            entry.method,
            entry.created_at.elapsed()
        );
        entry.settle(Ok(response));
    }

    fn forward_request(&self, request: RpcRequest) {
        let params = request.params.unwrap_or(Value::Null);
        diagnostics::record(self.diagnostics.as_ref(), || {
            DiagnosticRecord::new(
                Direction::InboundRequest,
                Some(&request.method),
                Some(&request.id),
                &params,
            )
        });
        log::debug!("Inbound request {} ({})", request.id, request.method);
        self.emit(SessionEvent::InboundRequest(InboundRequest {
            id: request.id,
            kind: InboundRequestKind::from_method(&request.method),
            method: request.method,
            params,
        }));
    }

    fn handle_notification(&self, generation: u64, notification: RpcNotification) {
        let params = notification.params.unwrap_or(Value::Null);
        diagnostics::record(self.diagnostics.as_ref(), || {
            DiagnosticRecord::new(
                Direction::InboundNotification,
                Some(&notification.method),
                None,
                &params,
            )
        });

        let interpreted = if notification.method == methods::SESSION_NOTIFICATION {
            SessionNotification::from_params(&params)
        } else {
            None
        };
        self.emit(SessionEvent::Notification {
            method: notification.method,
            params,
        });

        match interpreted {
            Some(SessionNotification::WorkingStateChanged(state)) if state.is_idle() => {
                if self.transition(generation, SessionPhase::end_turn) {
                    self.emit(SessionEvent::TurnEnded { code: 0 });
                }
            }
            Some(SessionNotification::WorkingStateChanged(_)) => {
                if self.transition(generation, SessionPhase::begin_turn) {
                    self.emit(SessionEvent::TurnStarted);
                }
            }
            Some(SessionNotification::Error { message }) => {
                log::warn!("droid reported an error: {message}");
                self.emit(SessionEvent::Error { message });
                if self.transition(generation, SessionPhase::end_turn) {
                    self.emit(SessionEvent::TurnEnded { code: TURN_FAILED });
                }
            }
            _ => {}
        }
    }

    /// Apply a phase transition if `generation` is still the live process
    fn transition(&self, generation: u64, apply: fn(&mut SessionPhase) -> bool) -> bool {
        let mut state = self.state.lock();
        state.generation == generation && apply(&mut state.phase)
    }

    /// Clean up after the process of `generation` has exited
    pub(super) fn handle_exit(&self, generation: u64, exit_code: Option<i32>) {
        let (current, turn_was_active) = {
            let mut state = self.state.lock();
            if state.generation == generation {
                let turn_was_active = state.phase.is_turn_active();
                // A disposed session stays Unstarted.
                if state.phase.is_running() {
                    state.detach(SessionPhase::Terminated { exit_code });
                }
                (true, turn_was_active)
            } else {
                (false, false)
            }
        };

        let orphaned = self.pending.lock().drain_generation(generation);
        if !orphaned.is_empty() {
            log::debug!(
                "Rejecting {} pending request(s) after droid exit",
                orphaned.len()
            );
        }
        for (_, entry) in orphaned {
            entry.settle(Err(DroidError::process_exited(exit_code)));
        }

        if current {
            self.emit(SessionEvent::ProcessExited { code: exit_code });
            if turn_was_active {
                self.emit(SessionEvent::TurnEnded {
                    code: turn_end_code(exit_code),
                });
            }
        }
    }
}

/// Exit code as a turn outcome; a signal exit counts as failure
fn turn_end_code(exit_code: Option<i32>) -> i32 {
    exit_code.unwrap_or(TURN_FAILED)
}

fn response_payload(response: &RpcResponse) -> Value {
    match (&response.error, &response.result) {
        (Some(error), _) => serde_json::to_value(error).unwrap_or(Value::Null),
        (None, Some(result)) => result.clone(),
        (None, None) => Value::Null,
    }
}

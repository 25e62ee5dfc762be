//! Signaling Relay
//!
//! Pairwise forwarding of call-setup messages. Each (caller, callee) pair
//! runs a small machine: `Idle -> Ringing -> Connected -> Idle`, or
//! `Idle -> Ringing -> Idle` on reject, hangup or ring timeout. `Idle` is
//! the absence of an entry. Signal payloads are opaque and forwarded
//! verbatim to the explicit target only.
//!
//! A call is bound to the caller's device and, once answered, to the
//! callee's device. Losing either of those connections ends the call even
//! if the identity stays online elsewhere.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::events::ServerEvent;
use super::gateway::Gateway;
use super::registry::Connection;
use crate::domain::{ConnectionId, UserId};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Media kind requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    #[default]
    Audio,
    Video,
}

/// Why a call ended, as told to the remaining party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallEndReason {
    Hangup,
    Timeout,
    PeerDisconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Ringing,
    Connected,
}

/// Unordered pair of identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey(UserId, UserId);

impl CallKey {
    fn new(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }

    fn involves(&self, user_id: &UserId) -> bool {
        &self.0 == user_id || &self.1 == user_id
    }
}

#[derive(Debug, Clone)]
struct CallSession {
    caller: UserId,
    callee: UserId,
    caller_connection: ConnectionId,
    /// Set when the callee answers; rings on every device until then.
    callee_connection: Option<ConnectionId>,
    kind: CallKind,
    phase: CallPhase,
    generation: u64,
}

impl CallSession {
    fn bound_to(&self, connection_id: ConnectionId) -> bool {
        self.caller_connection == connection_id || self.callee_connection == Some(connection_id)
    }

    fn peer_of(&self, user_id: &UserId) -> &UserId {
        if &self.caller == user_id {
            &self.callee
        } else {
            &self.caller
        }
    }
}

type CallTable = Arc<Mutex<HashMap<CallKey, CallSession>>>;

/// In-flight call pairs of this process.
pub struct CallRelay {
    gateway: Arc<Gateway>,
    calls: CallTable,
    ring_timeout: Duration,
    generation: AtomicU64,
}

impl CallRelay {
    pub fn new(gateway: Arc<Gateway>, ring_timeout: Duration) -> Self {
        Self {
            gateway,
            calls: Arc::new(Mutex::new(HashMap::new())),
            ring_timeout,
            generation: AtomicU64::new(0),
        }
    }

    pub fn ring_timeout(&self) -> Duration {
        self.ring_timeout
    }

    /// Start ringing `to` from the `caller` device. Fails if `to` has no
    /// live connection or either party is already in a call.
    pub fn call(&self, caller: &Connection, to: &UserId, kind: CallKind) -> Result<(), AppError> {
        let from = &caller.user_id;
        if from == to {
            return Err(AppError::Validation("Cannot call yourself".into()));
        }
        if !self.gateway.registry().is_online(to) {
            metrics::record_call("offline");
            return Err(AppError::UserOffline(to.to_string()));
        }

        let key = CallKey::new(from, to);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut calls = self.calls.lock();
            if calls.keys().any(|k| k.involves(from) || k.involves(to)) {
                return Err(AppError::InvalidTransition("A call is already in progress".into()));
            }
            calls.insert(
                key.clone(),
                CallSession {
                    caller: from.clone(),
                    callee: to.clone(),
                    caller_connection: caller.id,
                    callee_connection: None,
                    kind,
                    phase: CallPhase::Ringing,
                    generation,
                },
            );
        }

        let delivered = self.gateway.send_to_identity(
            to,
            &ServerEvent::IncomingCall {
                from: from.clone(),
                call_kind: kind,
            },
        );
        if delivered == 0 {
            // Callee dropped between the presence check and delivery.
            self.calls.lock().remove(&key);
            metrics::record_call("offline");
            return Err(AppError::UserOffline(to.to_string()));
        }

        metrics::record_call("ringing");
        tracing::info!(caller = %from, callee = %to, kind = ?kind, "Call ringing");

        let calls = Arc::clone(&self.calls);
        let gateway = Arc::clone(&self.gateway);
        let timeout = self.ring_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            expire_if_ringing(&calls, &gateway, &key, generation);
        });

        Ok(())
    }

    /// Callee accepts on the `callee` device; forwards its answer payload
    /// to the caller.
    pub fn answer(&self, callee: &Connection, to: &UserId, signal: Value) -> Result<(), AppError> {
        let from = &callee.user_id;
        let key = CallKey::new(from, to);
        {
            let mut calls = self.calls.lock();
            let session = calls
                .get_mut(&key)
                .filter(|s| s.phase == CallPhase::Ringing && &s.callee == from)
                .ok_or_else(|| AppError::InvalidTransition("No ringing call to answer".into()))?;

            if !self.gateway.registry().is_online(to) {
                calls.remove(&key);
                return Err(AppError::UserOffline(to.to_string()));
            }
            session.phase = CallPhase::Connected;
            session.callee_connection = Some(callee.id);
        }

        metrics::record_call("answered");
        tracing::info!(caller = %to, callee = %from, "Call connected");

        self.gateway.send_to_identity(
            to,
            &ServerEvent::CallAnswered {
                from: from.clone(),
                signal,
            },
        );
        Ok(())
    }

    /// Forward an opaque negotiation payload. Allowed while ringing (early
    /// ICE exchange) and once connected.
    pub fn relay_signal(&self, from: &UserId, to: &UserId, signal: Value) -> Result<(), AppError> {
        if !self.calls.lock().contains_key(&CallKey::new(from, to)) {
            return Err(AppError::InvalidTransition("No call in progress".into()));
        }

        let delivered = self.gateway.send_to_identity(
            to,
            &ServerEvent::Signal {
                from: from.clone(),
                signal,
            },
        );
        if delivered == 0 {
            return Err(AppError::UserOffline(to.to_string()));
        }
        Ok(())
    }

    /// Callee declines a ringing call.
    pub fn reject(&self, from: &UserId, to: &UserId) -> Result<(), AppError> {
        let key = CallKey::new(from, to);
        {
            let mut calls = self.calls.lock();
            let ringing = calls
                .get(&key)
                .map(|s| s.phase == CallPhase::Ringing && &s.callee == from)
                .unwrap_or(false);
            if !ringing {
                return Err(AppError::InvalidTransition("No ringing call to reject".into()));
            }
            calls.remove(&key);
        }

        metrics::record_call("rejected");
        tracing::info!(caller = %to, callee = %from, "Call rejected");

        self.gateway
            .send_to_identity(to, &ServerEvent::CallRejected { from: from.clone() });
        Ok(())
    }

    /// Either party hangs up. From `Ringing` this is the caller cancelling.
    pub fn end(&self, from: &UserId, to: &UserId) -> Result<(), AppError> {
        if self.calls.lock().remove(&CallKey::new(from, to)).is_none() {
            return Err(AppError::InvalidTransition("No call in progress".into()));
        }

        metrics::record_call("ended");
        tracing::info!(from = %from, to = %to, "Call ended");

        self.gateway.send_to_identity(
            to,
            &ServerEvent::CallEnded {
                from: from.clone(),
                reason: CallEndReason::Hangup,
            },
        );
        Ok(())
    }

    /// Tear down every call involving `user_id` and notify the other side.
    /// Called when the identity loses its last connection.
    pub fn drop_identity(&self, user_id: &UserId) -> usize {
        self.tear_down(user_id, |_| true)
    }

    /// Tear down the calls of `user_id` that are bound to one of its
    /// devices. Called for every closed connection.
    pub fn drop_connection(&self, user_id: &UserId, connection_id: ConnectionId) -> usize {
        self.tear_down(user_id, |session| session.bound_to(connection_id))
    }

    fn tear_down(&self, user_id: &UserId, selected: impl Fn(&CallSession) -> bool) -> usize {
        let dropped: Vec<CallSession> = {
            let mut calls = self.calls.lock();
            let keys: Vec<CallKey> = calls
                .iter()
                .filter(|(k, session)| k.involves(user_id) && selected(session))
                .map(|(k, _)| k.clone())
                .collect();
            keys.iter().filter_map(|k| calls.remove(k)).collect()
        };

        for session in &dropped {
            let peer = session.peer_of(user_id);
            metrics::record_call("disconnected");
            tracing::info!(
                user_id = %user_id,
                peer = %peer,
                kind = ?session.kind,
                "Call torn down by disconnect"
            );
            self.gateway.send_to_identity(
                peer,
                &ServerEvent::CallEnded {
                    from: user_id.clone(),
                    reason: CallEndReason::PeerDisconnected,
                },
            );
        }
        dropped.len()
    }

    /// Current phase of the pair, `None` when idle.
    pub fn phase(&self, a: &UserId, b: &UserId) -> Option<CallPhase> {
        self.calls.lock().get(&CallKey::new(a, b)).map(|s| s.phase)
    }

    pub fn active_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Ring timeout: drop the pair only if it is the same call and still ringing.
fn expire_if_ringing(calls: &CallTable, gateway: &Gateway, key: &CallKey, generation: u64) {
    let expired = {
        let mut calls = calls.lock();
        let stale = calls
            .get(key)
            .map(|s| s.generation == generation && s.phase == CallPhase::Ringing)
            .unwrap_or(false);
        if stale {
            calls.remove(key)
        } else {
            None
        }
    };

    if let Some(session) = expired {
        metrics::record_call("timeout");
        tracing::info!(caller = %session.caller, callee = %session.callee, "Call unanswered, ring timeout");
        gateway.send_to_identity(
            &session.caller,
            &ServerEvent::CallEnded {
                from: session.callee.clone(),
                reason: CallEndReason::Timeout,
            },
        );
        gateway.send_to_identity(
            &session.callee,
            &ServerEvent::CallEnded {
                from: session.caller.clone(),
                reason: CallEndReason::Timeout,
            },
        );
    }
}

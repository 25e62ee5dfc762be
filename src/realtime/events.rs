//! Wire events.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}` with a
//! fixed schema per event name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::signaling::{CallEndReason, CallKind};
use crate::domain::{
    ConnectionId, DirectMessage, GroupMessage, MessageId, MessageStatus, Reactions, RoomId, UserId,
};

/// Events pushed from the server to a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Ready {
        connection_id: ConnectionId,
        user_id: UserId,
        heartbeat_interval_ms: u64,
    },
    HeartbeatAck,
    InvalidSession {
        reason: String,
    },
    /// Failure acknowledgment, delivered only to the requesting connection.
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request: Option<String>,
        code: String,
        message: String,
    },

    PresenceChanged {
        online_identities: Vec<UserId>,
    },
    RoomPresenceChanged {
        room_id: RoomId,
        online_members: Vec<UserId>,
    },

    NewMessage(DirectMessage),
    NewGroupMessage(GroupMessage),
    MessageStatusChanged {
        message_id: MessageId,
        status: MessageStatus,
    },
    GroupMessageStatusChanged {
        message_id: MessageId,
        group_id: RoomId,
        status: MessageStatus,
    },
    GroupMessageRead {
        message_id: MessageId,
        group_id: RoomId,
        user_id: UserId,
    },
    ReactionsChanged {
        message_id: MessageId,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<RoomId>,
        reactions: Reactions,
    },
    MessageEdited {
        message_id: MessageId,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<RoomId>,
        text: String,
        is_edited: bool,
    },
    MessageDeleted {
        message_id: MessageId,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<RoomId>,
    },
    Typing {
        from: UserId,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        is_typing: bool,
    },

    IncomingCall {
        from: UserId,
        call_kind: CallKind,
    },
    CallAnswered {
        from: UserId,
        signal: Value,
    },
    Signal {
        from: UserId,
        signal: Value,
    },
    CallRejected {
        from: UserId,
    },
    CallEnded {
        from: UserId,
        reason: CallEndReason,
    },
}

impl ServerEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Ready { .. } => "ready",
            ServerEvent::HeartbeatAck => "heartbeatAck",
            ServerEvent::InvalidSession { .. } => "invalidSession",
            ServerEvent::Error { .. } => "error",
            ServerEvent::PresenceChanged { .. } => "presenceChanged",
            ServerEvent::RoomPresenceChanged { .. } => "roomPresenceChanged",
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::NewGroupMessage(_) => "newGroupMessage",
            ServerEvent::MessageStatusChanged { .. } => "messageStatusChanged",
            ServerEvent::GroupMessageStatusChanged { .. } => "groupMessageStatusChanged",
            ServerEvent::GroupMessageRead { .. } => "groupMessageRead",
            ServerEvent::ReactionsChanged { .. } => "reactionsChanged",
            ServerEvent::MessageEdited { .. } => "messageEdited",
            ServerEvent::MessageDeleted { .. } => "messageDeleted",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::IncomingCall { .. } => "incomingCall",
            ServerEvent::CallAnswered { .. } => "callAnswered",
            ServerEvent::Signal { .. } => "signal",
            ServerEvent::CallRejected { .. } => "callRejected",
            ServerEvent::CallEnded { .. } => "callEnded",
        }
    }

    /// Error acknowledgment for a failed client request.
    pub fn error(request: Option<&str>, err: &crate::shared::error::AppError) -> Self {
        ServerEvent::Error {
            request: request.map(str::to_string),
            code: err.code().to_string(),
            message: err.public_message(),
        }
    }
}

/// Events sent by a client over its connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    Identify {
        token: String,
    },
    Heartbeat,
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    Typing {
        to: Option<UserId>,
        room_id: Option<RoomId>,
        #[serde(default = "default_true")]
        is_typing: bool,
    },
    RequestCall {
        to: UserId,
        #[serde(default)]
        call_kind: CallKind,
    },
    AnswerCall {
        to: UserId,
        signal: Value,
    },
    RelaySignal {
        to: UserId,
        signal: Value,
    },
    RejectCall {
        to: UserId,
    },
    EndCall {
        to: UserId,
    },
}

fn default_true() -> bool {
    true
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Identify { .. } => "identify",
            ClientEvent::Heartbeat => "heartbeat",
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::LeaveRoom { .. } => "leaveRoom",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::RequestCall { .. } => "requestCall",
            ClientEvent::AnswerCall { .. } => "answerCall",
            ClientEvent::RelaySignal { .. } => "relaySignal",
            ClientEvent::RejectCall { .. } => "rejectCall",
            ClientEvent::EndCall { .. } => "endCall",
        }
    }
}

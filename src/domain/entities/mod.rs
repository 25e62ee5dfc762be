//! # Domain Entities
//!
//! Core domain entities. The message store and the group roster are
//! external durable collaborators; their contracts are the repository
//! traits defined next to each entity and implemented in the
//! infrastructure layer.
//!
//! - **DirectMessage**: one-to-one message with the `sent -> delivered -> read` machine
//! - **GroupMessage**: group message with per-member read tracking
//! - **Group**: group roster (durable membership)
//! - **Reactions**: one reaction per identity per message

mod group;
mod group_message;
mod message;
mod reaction;

pub use group::{Group, GroupRepository};
pub use group_message::{GroupMessage, GroupMessageRepository};
pub use message::{
    Attachment, DirectMessage, FileKind, MessageContent, MessageRepository, MessageStatus,
    StatusChange, StatusWrite,
};
pub use reaction::{Reaction, Reactions};

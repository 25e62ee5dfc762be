//! Application Services
//!
//! The mutation side of event routing: each operation checks authorization,
//! persists through a repository, and only then hands the canonical record
//! to the gateway.
//!
//! ## Available Services
//!
//! - **MessageService**: direct messages, status machine, reactions, edits, deletes, forwarding
//! - **GroupMessageService**: group rosters and group messages

pub mod group_message_service;
pub mod message_service;

pub use group_message_service::GroupMessageService;
pub use message_service::MessageService;

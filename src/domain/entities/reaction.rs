//! Message reactions.
//!
//! A message carries at most one reaction per identity. Adding a reaction
//! replaces any earlier one from the same identity.

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// A single emoji reaction left by one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: UserId,
    pub emoji: String,
}

/// The reaction set of one message, keyed by reacting identity.
///
/// Stored as an ordered list so clients see reactions in the order they
/// were (last) placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reactions(Vec<Reaction>);

impl Reactions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Record `emoji` for `user_id`, replacing any previous reaction from
    /// that identity. Returns the replaced reaction, if any.
    pub fn set(&mut self, user_id: &UserId, emoji: impl Into<String>) -> Option<Reaction> {
        let previous = self.remove(user_id);
        self.0.push(Reaction {
            user_id: user_id.clone(),
            emoji: emoji.into(),
        });
        previous
    }

    /// Remove the reaction of `user_id`, returning it if there was one.
    pub fn remove(&mut self, user_id: &UserId) -> Option<Reaction> {
        let index = self.0.iter().position(|r| &r.user_id == user_id)?;
        Some(self.0.remove(index))
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Reaction> {
        self.0.iter().find(|r| &r.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reaction> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Reaction> {
        self.0
    }
}

impl From<Vec<Reaction>> for Reactions {
    fn from(reactions: Vec<Reaction>) -> Self {
        // Collapse duplicates coming from older rows: the last one wins.
        let mut set = Reactions::new();
        for reaction in reactions {
            set.set(&reaction.user_id, reaction.emoji);
        }
        set
    }
}

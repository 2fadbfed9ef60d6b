//! Identifiers of a synthetic call

use rand::distributions::Alphanumeric;
use rand::Rng;

use super::command::ControlCommand;
use crate::config::{CallConfig, TagOrder};

/// Length of each request cookie
pub const COOKIE_LEN: usize = 8;
/// Length of the call identifier
pub const CALL_ID_LEN: usize = 32;
/// Length of the from/to tags
pub const TAG_LEN: usize = 16;

/// Random alphanumeric token of `len` characters
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Identifiers of the one synthetic call a monitor process places.
///
/// A fresh set is drawn per run; the relay keys its session on the call id,
/// so a restart never collides with the previous run's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    /// Cookie of the Offer request
    pub cookie_offer: String,
    /// Cookie of the Answer request
    pub cookie_answer: String,
    /// Cookie of the Delete request
    pub cookie_delete: String,
    /// Call identifier
    pub call_id: String,
    /// Tag of the calling side
    pub from_tag: String,
    /// Tag of the called side
    pub to_tag: String,
}

impl CallSession {
    /// Draw a new set of random identifiers
    pub fn generate() -> Self {
        Self {
            cookie_offer: random_token(COOKIE_LEN),
            cookie_answer: random_token(COOKIE_LEN),
            cookie_delete: random_token(COOKIE_LEN),
            call_id: random_token(CALL_ID_LEN),
            from_tag: random_token(TAG_LEN),
            to_tag: random_token(TAG_LEN),
        }
    }

    /// Offer request creating the session and allocating party B's port
    pub fn offer(&self, call: &CallConfig) -> ControlCommand {
        ControlCommand::Offer {
            cookie: self.cookie_offer.clone(),
            codecs: call.codecs.clone(),
            call_id: self.call_id.clone(),
            address: call.offer_address.clone(),
            port: call.offer_port,
            from_tag: self.from_tag.clone(),
        }
    }

    /// Answer request completing the session and allocating party A's port
    pub fn answer(&self, call: &CallConfig) -> ControlCommand {
        let tags = match call.tag_order {
            TagOrder::Natural => [self.from_tag.clone(), self.to_tag.clone()],
            TagOrder::Reversed => [self.to_tag.clone(), self.from_tag.clone()],
        };
        ControlCommand::Answer {
            cookie: self.cookie_answer.clone(),
            codecs: call.codecs.clone(),
            call_id: self.call_id.clone(),
            address: call.answer_address.clone(),
            port: call.answer_port,
            tags,
        }
    }

    /// Delete request tearing the session down
    pub fn delete(&self) -> ControlCommand {
        ControlCommand::Delete {
            cookie: self.cookie_delete.clone(),
            call_id: self.call_id.clone(),
            from_tag: self.from_tag.clone(),
            to_tag: self.to_tag.clone(),
        }
    }
}

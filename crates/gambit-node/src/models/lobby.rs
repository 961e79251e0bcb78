//! Lobby model - the authoritative roster for a round.

use serde::{Deserialize, Serialize};

/// A lobby of participants playing together.
///
/// The member list is the roster the scoring engine reconciles
/// submissions against: every member is expected to act each round, and
/// silence becomes a synthesized PASS at completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lobby {
    /// Unique identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Participant ids expected to act each round
    pub members: Vec<String>,
}

impl Lobby {
    /// Create a new empty lobby.
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            members: Vec::new(),
        }
    }

    /// Generate a lobby ID from content hash.
    pub fn generate_id(content: &[u8]) -> String {
        let hash = blake3::hash(content);
        hex::encode(hash.as_bytes())
    }

    /// Whether a participant belongs to this lobby.
    pub fn contains(&self, participant_id: &str) -> bool {
        self.members.iter().any(|m| m == participant_id)
    }

    /// Add a member; duplicates are ignored.
    pub fn add_member(&mut self, participant_id: String) -> bool {
        if self.contains(&participant_id) {
            return false;
        }
        self.members.push(participant_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership() {
        let mut lobby = Lobby::new("l1".into(), "Table 1".into());
        assert!(lobby.add_member("alice".into()));
        assert!(!lobby.add_member("alice".into()));
        assert!(lobby.contains("alice"));
        assert!(!lobby.contains("bob"));
        assert_eq!(lobby.members.len(), 1);
    }
}

//! Core user/team records shared by the hub's crates.
//!
//! These types are the hub's read-only view of the real user database; nothing here
//! is ever written back (see the Persistence Adapter contract).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub team_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

impl Team {
    /// Canonical name of this team's always-on group call room.
    pub fn watercooler_room(&self) -> String {
        format!("team-{}-watercooler", self.id)
    }
}

/// New opaque identifier. Callers that need time-ordering (e.g. call room ids) should
/// prefer `uuid::Uuid::now_v7()` directly; this helper covers the common case.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watercooler_room_is_deterministic_per_team() {
        let team = Team {
            id: "acme".into(),
            name: "Acme".into(),
        };
        assert_eq!(team.watercooler_room(), "team-acme-watercooler");
    }

    #[test]
    fn new_id_produces_distinct_values() {
        assert_ne!(new_id(), new_id());
    }
}

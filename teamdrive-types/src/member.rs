//! Team membership model.

use crate::ids::MemberId;
use serde::{Deserialize, Serialize};

/// Role a member holds inside the remote team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Admin,
    Member,
}

impl TeamRole {
    /// Returns true for the admin role.
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, TeamRole::Admin)
    }
}

/// One member of a remote team as reported by the directory API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    /// The vendor's team-scoped member identifier.
    pub member_id: MemberId,
    /// Primary email address.
    pub email: String,
    /// Role inside the team.
    pub role: TeamRole,
    /// The vendor's account identifier, stable across teams.
    pub account_id: String,
}

impl TeamMember {
    /// Creates a member record.
    #[must_use]
    pub fn new(
        member_id: impl Into<MemberId>,
        email: impl Into<String>,
        role: TeamRole,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            email: email.into(),
            role,
            account_id: account_id.into(),
        }
    }
}

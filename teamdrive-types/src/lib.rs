//! Core types shared across the teamdrive crates.
//!
//! Remote identifiers (teams, members, groups, team folders) are opaque
//! tokens issued by the storage vendor and wrap `String`. Local project
//! identifiers are UUID v7 like the rest of the platform.

mod binding;
mod ids;
mod member;

pub use binding::ProjectStorageBinding;
pub use ids::{GroupId, MemberId, ProjectId, TeamFolderId, TeamId, TemplateId};
pub use member::{TeamMember, TeamRole};

//! Role flags, access requirements and decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::Document;

/// Field on a student record marking a house guardian.
pub const HOUSE_GUARDIAN_FIELD: &str = "is_house_guardian";

/// Field on an admin record; only an explicit `false` grants write access.
pub const READ_ONLY_FIELD: &str = "read_only";

// ═══════════════════════════════════════════════════════════════════════════════
// Role Flags
// ═══════════════════════════════════════════════════════════════════════════════

/// Roles derived from identity store membership at evaluation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFlags {
    pub is_student: bool,
    #[serde(rename = "is_student_hg")]
    pub is_student_house_guardian: bool,
    pub is_admin: bool,
    pub is_admin_write: bool,
}

impl RoleFlags {
    /// Derive flags from the caller's student and admin records.
    pub fn from_records(student: Option<&Document>, admin: Option<&Document>) -> Self {
        Self {
            is_student: student.is_some(),
            is_student_house_guardian: student.is_some_and(is_house_guardian),
            is_admin: admin.is_some(),
            is_admin_write: admin.is_some_and(grants_write),
        }
    }

    pub fn at_least_house_guardian_write(&self) -> bool {
        self.is_student_house_guardian || self.is_admin_write
    }
}

/// A student record with `is_house_guardian: true`. Absent means false.
pub fn is_house_guardian(student: &Document) -> bool {
    student
        .get(HOUSE_GUARDIAN_FIELD)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// An admin record with `read_only: false`. Absent or non-boolean means read-only.
pub fn grants_write(admin: &Document) -> bool {
    admin.get(READ_ONLY_FIELD).and_then(|v| v.as_bool()) == Some(false)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Access Requirements
// ═══════════════════════════════════════════════════════════════════════════════

/// What a protected operation demands of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    /// Any caller with a valid token.
    Authenticated,
    /// The owner, or any admin.
    SelfOrAdminRead { owner: String },
    /// The owner, or an admin with write access.
    SelfOrAdminWrite { owner: String },
    /// Any admin.
    AdminRead,
    /// An admin with write access.
    AdminWrite,
    /// A student house guardian, or an admin with write access.
    HouseGuardianWrite,
}

impl AccessRequirement {
    pub fn self_or_admin_read(owner: impl Into<String>) -> Self {
        Self::SelfOrAdminRead { owner: owner.into() }
    }

    pub fn self_or_admin_write(owner: impl Into<String>) -> Self {
        Self::SelfOrAdminWrite { owner: owner.into() }
    }

    /// The resource owner, for requirements that have one.
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::SelfOrAdminRead { owner } | Self::SelfOrAdminWrite { owner } => Some(owner),
            _ => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::SelfOrAdminRead { .. } => "self_or_admin_read",
            Self::SelfOrAdminWrite { .. } => "self_or_admin_write",
            Self::AdminRead => "admin_read",
            Self::AdminWrite => "admin_write",
            Self::HouseGuardianWrite => "house_guardian_write",
        }
    }

    /// Why a caller failing this requirement is denied.
    pub const fn deny_reason(&self) -> DenyReason {
        match self {
            Self::Authenticated => DenyReason::NotAuthenticated,
            Self::SelfOrAdminRead { .. } => DenyReason::NotOwnerOrAdmin,
            Self::SelfOrAdminWrite { .. } => DenyReason::NotOwnerOrAdminWrite,
            Self::AdminRead => DenyReason::NotAdmin,
            Self::AdminWrite => DenyReason::NotAdminWrite,
            Self::HouseGuardianWrite => DenyReason::NotHouseGuardianOrAdminWrite,
        }
    }
}

impl fmt::Display for AccessRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner() {
            Some(owner) => write!(f, "{}({})", self.name(), owner),
            None => f.write_str(self.name()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    NotOwnerOrAdmin,
    NotOwnerOrAdminWrite,
    NotAdmin,
    NotAdminWrite,
    NotHouseGuardianOrAdminWrite,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotAuthenticated => "caller is not authenticated",
            Self::NotOwnerOrAdmin => "caller is neither the owner nor an admin",
            Self::NotOwnerOrAdminWrite => "caller is neither the owner nor a write admin",
            Self::NotAdmin => "caller is not an admin",
            Self::NotAdminWrite => "caller is not a write admin",
            Self::NotHouseGuardianOrAdminWrite => {
                "caller is neither a house guardian nor a write admin"
            }
        };
        f.write_str(text)
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny(_) => "deny",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_admin_write_requires_explicit_false() {
        assert!(!grants_write(&doc(json!({"username": "a"}))));
        assert!(!grants_write(&doc(json!({"read_only": true}))));
        assert!(!grants_write(&doc(json!({"read_only": null}))));
        assert!(!grants_write(&doc(json!({"read_only": "false"}))));
        assert!(!grants_write(&doc(json!({"read_only": 0}))));
        assert!(grants_write(&doc(json!({"read_only": false}))));
    }

    #[test]
    fn test_house_guardian_flag() {
        assert!(!is_house_guardian(&doc(json!({}))));
        assert!(!is_house_guardian(&doc(json!({"is_house_guardian": false}))));
        assert!(!is_house_guardian(&doc(json!({"is_house_guardian": "true"}))));
        assert!(is_house_guardian(&doc(json!({"is_house_guardian": true}))));
    }

    #[test]
    fn test_flags_from_records() {
        let student = doc(json!({"username": "alice", "is_house_guardian": true}));
        let admin = doc(json!({"username": "alice", "read_only": false}));

        let none = RoleFlags::from_records(None, None);
        assert_eq!(none, RoleFlags::default());

        let both = RoleFlags::from_records(Some(&student), Some(&admin));
        assert!(both.is_student && both.is_student_house_guardian);
        assert!(both.is_admin && both.is_admin_write);
        assert!(both.at_least_house_guardian_write());
    }

    #[test]
    fn test_flags_serialize_with_wire_names() {
        let flags = RoleFlags {
            is_student: true,
            ..Default::default()
        };
        let value = serde_json::to_value(flags).unwrap();
        assert_eq!(
            value,
            json!({
                "is_student": true,
                "is_student_hg": false,
                "is_admin": false,
                "is_admin_write": false
            })
        );
    }

    #[test]
    fn test_decision_labels() {
        let allow = AccessDecision::Allow;
        let deny = AccessDecision::Deny(DenyReason::NotAdmin);
        assert!(allow.is_allowed());
        assert!(!deny.is_allowed());
        assert_eq!(allow.label(), "allow");
        assert_eq!(deny.label(), "deny");
    }

    #[test]
    fn test_requirement_owner_and_display() {
        let req = AccessRequirement::self_or_admin_write("alice");
        assert_eq!(req.owner(), Some("alice"));
        assert_eq!(req.to_string(), "self_or_admin_write(alice)");
        assert_eq!(AccessRequirement::AdminRead.owner(), None);
        assert_eq!(AccessRequirement::AdminRead.to_string(), "admin_read");
    }
}

//! Authorization decisions over a verified identity.
//!
//! Pure, no I/O. Every protected operation across users, projects, tasks,
//! and time entries supplies its required groups and, where relevant, the
//! resource's owner identifier; the policy answers allow or deny. The
//! group set on the identity is never elevated here.

use crate::auth::claims::VerifiedIdentity;
use crate::config::Config;

/// Group granting unconditional access.
pub const GROUP_ADMIN: &str = "admin-group";

/// Group for time-entry reviewers.
pub const GROUP_REVIEWERS: &str = "reviewers-group";

/// Group for ordinary users.
pub const GROUP_USERS: &str = "user-group";

/// The outcome of an authorization query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The operation may proceed.
    Allow,
    /// The operation is refused for the given reason.
    Deny(DenyReason),
}

impl Decision {
    /// True when the decision permits the operation.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Why an authorization query was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No verified identity was supplied (verification not performed
    /// upstream); never treated as anonymous-allow.
    MissingIdentity,
    /// The identity holds none of the required groups.
    MissingGroup,
    /// The resource belongs to a different subject.
    NotOwner,
}

/// One authorization question, consumed once.
#[derive(Debug)]
pub struct AccessQuery<'a> {
    /// The authenticated identity, if verification succeeded upstream.
    pub identity: Option<&'a VerifiedIdentity>,

    /// Groups of which at least one is required; empty means no group
    /// requirement.
    pub required_groups: &'a [String],

    /// Owner identifier of the resource under access, when the operation
    /// is ownership-scoped.
    pub resource_owner: Option<&'a str>,
}

/// Role/ownership policy, constructed from configuration and shared by
/// reference with every consumer.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    admin_group: String,
}

impl AccessPolicy {
    /// Create a policy with the given admin group.
    pub fn new(admin_group: impl Into<String>) -> Self {
        Self {
            admin_group: admin_group.into(),
        }
    }

    /// Create a policy from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.admin_group.clone())
    }

    /// Decide an authorization query.
    ///
    /// Precedence:
    /// 1. no identity: deny;
    /// 2. admin group membership: allow unconditionally;
    /// 3. non-empty required groups with empty intersection: deny;
    /// 4. owner set and not matching the subject: deny;
    /// 5. otherwise allow.
    #[must_use]
    pub fn authorize(&self, query: &AccessQuery<'_>) -> Decision {
        let Some(identity) = query.identity else {
            return Decision::Deny(DenyReason::MissingIdentity);
        };

        if identity.has_group(&self.admin_group) {
            return Decision::Allow;
        }

        if !query.required_groups.is_empty()
            && !query
                .required_groups
                .iter()
                .any(|group| identity.has_group(group))
        {
            return Decision::Deny(DenyReason::MissingGroup);
        }

        if let Some(owner) = query.resource_owner {
            if !owner_matches(&identity.subject, owner) {
                return Decision::Deny(DenyReason::NotOwner);
            }
        }

        Decision::Allow
    }
}

/// Compare a token subject against a resource owner identifier.
///
/// Owners may be recorded as subject strings or as numeric row
/// identifiers, so a failed string comparison falls back to numeric
/// equality when both sides parse as integers. The canonical identifier
/// type should eventually be unified; see DESIGN notes.
fn owner_matches(subject: &str, owner: &str) -> bool {
    if subject == owner {
        return true;
    }

    match (subject.parse::<u64>(), owner.parse::<u64>()) {
        (Ok(subject_id), Ok(owner_id)) => subject_id == owner_id,
        _ => false,
    }
}

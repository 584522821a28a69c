use std::{collections::HashSet, fmt::Display, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Hash, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    TrustedMember,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::TrustedMember => "trusted_member",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "trusted_member" => Ok(Role::TrustedMember),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Named authorization policies guarding write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Admin,
    TrustedMember,
}

impl Policy {
    /// Roles accepted by the policy, any one of them is sufficient.
    pub const fn roles(&self) -> &'static [Role] {
        match self {
            Policy::Admin => &[Role::Admin],
            Policy::TrustedMember => &[Role::TrustedMember, Role::Admin],
        }
    }

    pub fn allows(&self, subject: &impl Authorization) -> bool {
        subject.has_any_role(self.roles())
    }
}

pub trait TimeLimited {
    fn set_validity(&mut self, until: SystemTime);
    fn check_validity(&self) -> bool;
}

pub trait Authorization {
    fn has_role(&self, role: &Role) -> bool;

    fn has_any_role<'a, I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a Role>,
    {
        roles.into_iter().any(|role| self.has_role(role))
    }

    fn has_all_roles<'a, I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a Role>,
    {
        roles.into_iter().all(|role| self.has_role(role))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiClaim {
    pub sub: String,
    pub exp: u64,
    pub roles: HashSet<Role>,
}

impl ApiClaim {
    /// Creates claim with zero expiration, validity is set when token is issued
    pub fn new_expired(sub: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        ApiClaim {
            sub: sub.into(),
            exp: 0,
            roles: roles.into_iter().collect(),
        }
    }

    /// Subject of API tokens is the user id
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

impl Authorization for ApiClaim {
    fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl TimeLimited for ApiClaim {
    fn set_validity(&mut self, until: SystemTime) {
        self.exp = unix_secs(until);
    }

    fn check_validity(&self) -> bool {
        self.exp > unix_secs(SystemTime::now())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_role() {
        let claim = ApiClaim::new_expired("123", [Role::Admin]);
        assert!(claim.has_role(&Role::Admin));
        assert!(!claim.has_role(&Role::TrustedMember));
        assert!(claim.has_any_role(&[Role::TrustedMember, Role::Admin]));
        assert!(!claim.has_all_roles(&[Role::TrustedMember, Role::Admin]));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" trusted_member".parse::<Role>().unwrap(), Role::TrustedMember);
        assert!("trusted".parse::<Role>().is_err());
        assert_eq!(Role::TrustedMember.to_string(), "trusted_member");

        let json = serde_json::to_string(&Role::TrustedMember).unwrap();
        assert_eq!(json, "\"trusted_member\"");
    }

    #[test]
    fn test_policies() {
        let admin = ApiClaim::new_expired("a", [Role::Admin]);
        let trusted = ApiClaim::new_expired("t", [Role::TrustedMember]);
        let nobody = ApiClaim::new_expired("n", []);

        assert!(Policy::Admin.allows(&admin));
        assert!(!Policy::Admin.allows(&trusted));
        assert!(Policy::TrustedMember.allows(&admin));
        assert!(Policy::TrustedMember.allows(&trusted));
        assert!(!Policy::TrustedMember.allows(&nobody));
    }

    #[test]
    fn test_validity() {
        let mut claim = ApiClaim::new_expired("x", []);
        assert!(!claim.check_validity());
        claim.set_validity(SystemTime::now() + Duration::from_secs(60));
        assert!(claim.check_validity());
    }

    #[test]
    fn test_user_id() {
        let id = Uuid::new_v4();
        let claim = ApiClaim::new_expired(id.to_string(), []);
        assert_eq!(claim.user_id(), Some(id));
        let claim = ApiClaim::new_expired("not-uuid", []);
        assert_eq!(claim.user_id(), None);
    }
}

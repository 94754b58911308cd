use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClinicError;

/// The role assigned to an acting identity by the identity provider.
///
/// A closed variant rather than a free string: access decisions dispatch on
/// the variant, so an unknown role is rejected once at the boundary instead
/// of falling through string comparisons at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(ClinicError::Unauthorized(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

/// The acting identity for a single core operation.
///
/// Constructed explicitly at the server boundary from the identity
/// provider's claims and passed into every core call. There is no implicit
/// or thread-local identity anywhere in the codebase; role is immutable for
/// the duration of a request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub actor_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(actor_id: Uuid, role: Role) -> Self {
        Self { actor_id, role }
    }

    pub fn patient(actor_id: Uuid) -> Self {
        Self::new(actor_id, Role::Patient)
    }

    pub fn doctor(actor_id: Uuid) -> Self {
        Self::new(actor_id, Role::Doctor)
    }

    pub fn admin(actor_id: Uuid) -> Self {
        Self::new(actor_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

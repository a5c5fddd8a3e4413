//! Authorization guards for LECTERN.
//!
//! Everything here is pure policy: no I/O, no state. Callers resolve the
//! [`Actor`] from the request and the resource from storage, then ask whether
//! the mutation is allowed before touching anything.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role carried by an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// The authenticated identity performing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A resource owned by a single user.
pub trait Owned {
    fn owner_id(&self) -> &str;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("user {actor} is not authorized to modify this resource")]
    NotOwner { actor: String },

    #[error("user {actor} requires the admin role")]
    AdminRequired { actor: String },
}

/// Owners and admins may mutate a resource; nobody else may.
pub fn can_mutate<R: Owned + ?Sized>(actor: &Actor, resource: &R) -> bool {
    actor.id == resource.owner_id() || actor.is_admin()
}

/// [`can_mutate`] as a guard.
pub fn ensure_can_mutate<R: Owned + ?Sized>(actor: &Actor, resource: &R) -> Result<(), AuthzError> {
    if can_mutate(actor, resource) {
        Ok(())
    } else {
        tracing::debug!(
            target: "lectern-authz",
            actor = %actor.id,
            owner = %resource.owner_id(),
            "mutation denied"
        );
        Err(AuthzError::NotOwner {
            actor: actor.id.clone(),
        })
    }
}

pub fn require_admin(actor: &Actor) -> Result<(), AuthzError> {
    if actor.is_admin() {
        Ok(())
    } else {
        tracing::debug!(target: "lectern-authz", actor = %actor.id, "admin role required");
        Err(AuthzError::AdminRequired {
            actor: actor.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note {
        author: String,
    }

    impl Owned for Note {
        fn owner_id(&self) -> &str {
            &self.author
        }
    }

    fn note(author: &str) -> Note {
        Note {
            author: author.to_string(),
        }
    }

    #[test]
    fn owner_may_mutate() {
        let actor = Actor::new("alice", Role::User);
        assert!(can_mutate(&actor, &note("alice")));
    }

    #[test]
    fn admin_may_mutate_anything() {
        let actor = Actor::new("root", Role::Admin);
        assert!(can_mutate(&actor, &note("alice")));
        assert!(ensure_can_mutate(&actor, &note("bob")).is_ok());
    }

    #[test]
    fn stranger_is_denied() {
        let actor = Actor::new("bob", Role::User);
        assert!(!can_mutate(&actor, &note("alice")));
        assert_eq!(
            ensure_can_mutate(&actor, &note("alice")),
            Err(AuthzError::NotOwner {
                actor: "bob".to_string()
            })
        );
    }

    #[test]
    fn admin_guard() {
        assert!(require_admin(&Actor::new("root", Role::Admin)).is_ok());
        assert!(require_admin(&Actor::new("bob", Role::User)).is_err());
    }

    #[test]
    fn roles_use_lowercase_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }
}

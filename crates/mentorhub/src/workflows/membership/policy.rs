//! Pure capability checks. Nothing here touches storage; guards run before any state is read.

use serde::Serialize;

use super::domain::Actor;

pub fn can_manage_catalog(actor: &Actor) -> bool {
    actor.is_staff() || actor.is_superuser()
}

pub fn can_apply(actor: &Actor) -> bool {
    actor.is_authenticated() && !actor.is_staff()
}

pub fn can_administer(actor: &Actor) -> bool {
    actor.is_superuser()
}

/// Named gate for a family of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageCatalog,
    Apply,
    Administer,
}

impl Capability {
    pub fn allows(self, actor: &Actor) -> bool {
        match self {
            Self::ManageCatalog => can_manage_catalog(actor),
            Self::Apply => can_apply(actor),
            Self::Administer => can_administer(actor),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ManageCatalog => "manage catalog",
            Self::Apply => "apply to projects",
            Self::Administer => "administer users",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("authentication required")]
    Unauthenticated,
    #[error("actor is not allowed to {}", .0.label())]
    Forbidden(Capability),
}

/// Guard clause used at the top of every gated operation.
pub fn require(actor: &Actor, capability: Capability) -> Result<(), AccessDenied> {
    if !actor.is_authenticated() {
        return Err(AccessDenied::Unauthenticated);
    }
    if capability.allows(actor) {
        Ok(())
    } else {
        Err(AccessDenied::Forbidden(capability))
    }
}

pub fn require_authenticated(actor: &Actor) -> Result<(), AccessDenied> {
    if actor.is_authenticated() {
        Ok(())
    } else {
        Err(AccessDenied::Unauthenticated)
    }
}

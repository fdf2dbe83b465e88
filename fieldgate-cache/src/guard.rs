//! Access requirements for routes and UI elements.
//!
//! A guard names what it needs and asks the service for a decision. Until the
//! map is loaded the decision is [`Access::Pending`], so callers can show a
//! loading state instead of a denial.

use crate::service::PermissionService;

/// What a route or element needs before it is shown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Requirement {
    /// No permission needed.
    #[default]
    None,
    Single(String),
    /// At least one of the codenames.
    AnyOf(Vec<String>),
    /// Every codename.
    AllOf(Vec<String>),
}

/// Outcome of evaluating a [`Requirement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Pending,
    Granted,
    /// Codenames that were not granted.
    Denied { missing: Vec<String> },
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl Requirement {
    pub fn single(codename: impl Into<String>) -> Self {
        Self::Single(codename.into())
    }

    pub fn any_of<I, S>(codenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(codenames.into_iter().map(Into::into).collect())
    }

    pub fn all_of<I, S>(codenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllOf(codenames.into_iter().map(Into::into).collect())
    }

    /// Decide access against the service's current map. Never blocks.
    pub fn evaluate(&self, service: &PermissionService) -> Access {
        let codenames = match self {
            Self::None => return Access::Granted,
            Self::Single(codename) => std::slice::from_ref(codename),
            Self::AnyOf(codenames) | Self::AllOf(codenames) => codenames.as_slice(),
        };

        if !service.is_loaded() {
            return Access::Pending;
        }

        let missing: Vec<String> = codenames
            .iter()
            .filter(|c| !service.has_permission(c))
            .cloned()
            .collect();

        let granted = match self {
            Self::AnyOf(_) => missing.len() < codenames.len(),
            _ => missing.is_empty(),
        };

        if granted {
            Access::Granted
        } else {
            Access::Denied { missing }
        }
    }
}

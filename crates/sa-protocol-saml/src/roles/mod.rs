//! SAML roles and their local implementors.
//!
//! - [`Role`] - the SAML functions this authority can perform
//! - [`RoleRegistry`] - which implementor performs which role
//! - [`RoleImplementor`] - capabilities an implementor declares
//! - [`ImplementorDirectory`] - resolves registered paths to implementors

mod implementor;
mod registry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use implementor::{BasicImplementor, ImplementorDirectory, InMemoryDirectory, RoleImplementor};
pub use registry::RoleRegistry;

/// A SAML role this authority can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Identity provider (`IDPSSODescriptor`).
    Idp,
    /// Service provider (`SPSSODescriptor`).
    Sp,
    /// Attribute provider; supplies attributes to another role and has no
    /// descriptor of its own.
    Ap,
    /// Authentication authority.
    Authn,
    /// Policy decision point.
    Pdp,
}

impl Role {
    /// All roles in registry order.
    pub const ALL: [Self; 5] = [Self::Idp, Self::Sp, Self::Ap, Self::Authn, Self::Pdp];

    /// Returns the short role name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idp => "idp",
            Self::Sp => "sp",
            Self::Ap => "ap",
            Self::Authn => "authn",
            Self::Pdp => "pdp",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// Path of a local role implementor, e.g. `/saml/idp`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImplementorPath(String);

impl ImplementorPath {
    /// Creates a path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the non-empty path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for ImplementorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImplementorPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for ImplementorPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_roundtrip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("aa".parse::<Role>().is_err());
    }

    #[test]
    fn path_segments_skip_empty() {
        let path = ImplementorPath::from("/saml//idp/");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["saml", "idp"]);
    }
}

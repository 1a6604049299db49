//! Method routing.
//!
//! Two addressing schemes coexist: path-style `resource/action` methods map
//! to structured endpoints, and flat legacy names (`api_getEvents`) pass
//! through untouched. [`resolve`] is pure and never rejects; a
//! [`RouteTable`] optionally narrows the accepted methods to an explicit
//! list checked when the table is built.

use std::collections::BTreeSet;

use evkit_core::{ConfigError, RouteTarget, TransportError};

/// Map a method string to its route target.
///
/// Exactly one `/` with non-empty text on both sides is path-style;
/// anything else is a legacy name, passed through verbatim.
pub fn resolve(method: &str) -> RouteTarget {
    match method.split_once('/') {
        Some((resource, action))
            if !resource.is_empty() && !action.is_empty() && !action.contains('/') =>
        {
            RouteTarget::Path {
                resource: resource.to_string(),
                action: action.to_string(),
            }
        }
        _ => RouteTarget::Legacy {
            name: method.to_string(),
        },
    }
}

/// Which methods the dispatcher forwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RouteTable {
    /// Every method is forwarded; unknown ones fail at the transport.
    #[default]
    Open,
    /// Only the listed methods are forwarded.
    Explicit(BTreeSet<String>),
}

impl RouteTable {
    pub fn open() -> Self {
        Self::Open
    }

    /// Build an explicit table, rejecting blank, whitespace-bearing,
    /// malformed path-style and duplicate entries.
    pub fn explicit<I, S>(methods: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = BTreeSet::new();
        for method in methods {
            let method = method.into();
            validate_method(&method)?;
            if !table.insert(method.clone()) {
                return Err(ConfigError::InvalidValue {
                    field: "routes".to_string(),
                    reason: format!("duplicate route '{}'", method),
                });
            }
        }
        Ok(Self::Explicit(table))
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Open => None,
            Self::Explicit(methods) => Some(methods.len()),
        }
    }

    /// Route a method through the table.
    pub fn lookup(&self, method: &str) -> Result<RouteTarget, TransportError> {
        match self {
            Self::Open => Ok(resolve(method)),
            Self::Explicit(methods) if methods.contains(method) => Ok(resolve(method)),
            Self::Explicit(_) => Err(TransportError::UnknownRoute {
                method: method.to_string(),
            }),
        }
    }
}

fn validate_method(method: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        field: "routes".to_string(),
        reason: format!("'{}' {}", method, reason),
    };
    if method.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if method.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    if method.contains('/') && resolve(method).is_legacy() {
        return Err(invalid("must be exactly <resource>/<action>"));
    }
    Ok(())
}

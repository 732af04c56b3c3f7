//! Backend identity.
//!
//! A backend is identified by its base URL exactly as configured. The
//! identity is the key into circuit breaker state and the prefix the
//! dispatcher joins request paths onto.

use std::fmt;
use std::sync::Arc;

/// Opaque identity of a single backend (its base URL).
///
/// Cheap to clone; the string is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(Arc<str>);

impl BackendId {
    pub fn new(base_url: impl Into<Arc<str>>) -> Self {
        Self(base_url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base URL without a trailing slash, ready to have a path appended.
    pub fn base(&self) -> &str {
        self.0.trim_end_matches('/')
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BackendId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

//! Core multi-tenant types for relay.

use std::fmt;

/// A tenant identifier.
///
/// Opaque to relay: it is whatever the caller claims in `tenant_id`
/// and whatever the job store keys its rows by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TenantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Context carried with every store operation.
///
/// Store calls take this explicitly so that tenant scoping never depends
/// on the order in which calls were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    /// Correlation id of the inbound request, when there is one.
    pub request_id: Option<String>,
}

impl TenantContext {
    /// Convenience constructor from a string.
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId(tenant.into()),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn tenant(&self) -> &str {
        self.tenant_id.as_str()
    }

    /// True when `other` names the same tenant as this context.
    pub fn owns(&self, other: &str) -> bool {
        self.tenant_id.0 == other
    }
}

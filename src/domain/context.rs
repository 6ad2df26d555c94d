//! Operation Context
//!
//! Contains metadata about the current operation, for tracing and for
//! authorization decisions that need to know who is acting.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Context for an operation, carried through the call stack via an axum
/// `Extension` and attached to log lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// API key ID resolved from the credential, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<Uuid>,

    /// Principal the credential resolved to; `None` means anonymous.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<Uuid>,

    /// Whether the resolved API key carries the elevated capability.
    pub is_elevated: bool,

    /// Correlation ID for request tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Client IP address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    /// Create a new anonymous context.
    pub fn new() -> Self {
        Self {
            api_key_id: None,
            principal_id: None,
            is_elevated: false,
            correlation_id: None,
            client_ip: None,
        }
    }

    pub fn with_api_key(mut self, api_key_id: Uuid) -> Self {
        self.api_key_id = Some(api_key_id);
        self
    }

    pub fn with_principal(mut self, principal_id: Uuid) -> Self {
        self.principal_id = Some(principal_id);
        self
    }

    pub fn with_elevated(mut self, is_elevated: bool) -> Self {
        self.is_elevated = is_elevated;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Generate a new correlation ID if not present.
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    /// True if the principal is anonymous (no credential resolved).
    pub fn is_anonymous(&self) -> bool {
        self.principal_id.is_none()
    }

    /// True if `actor` is the resolved principal, or the context is elevated.
    pub fn may_act_as(&self, actor: Uuid) -> bool {
        self.is_elevated || self.principal_id == Some(actor)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let api_key_id = Uuid::new_v4();
        let principal_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_api_key(api_key_id)
            .with_principal(principal_id)
            .with_correlation_id(correlation_id);

        assert_eq!(context.api_key_id, Some(api_key_id));
        assert_eq!(context.principal_id, Some(principal_id));
        assert_eq!(context.correlation_id, Some(correlation_id));
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert!(context.correlation_id.is_some());
        assert_eq!(context.correlation_id.unwrap(), id);

        let id2 = context.ensure_correlation_id();
        assert_eq!(id, id2);
    }

    #[test]
    fn test_may_act_as() {
        let principal_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        let context = OperationContext::new().with_principal(principal_id);
        assert!(context.may_act_as(principal_id));
        assert!(!context.may_act_as(other));

        let elevated = OperationContext::new()
            .with_principal(other)
            .with_elevated(true);
        assert!(elevated.may_act_as(principal_id));
    }

    #[test]
    fn test_is_anonymous() {
        let context = OperationContext::new();
        assert!(context.is_anonymous());

        let context = context.with_principal(Uuid::new_v4());
        assert!(!context.is_anonymous());
    }
}

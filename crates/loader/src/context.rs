//! Invocation context and region derivation

use serde::{Deserialize, Serialize};

/// Environment variable that overrides the ARN-derived region
pub const REGION_ENV_VAR: &str = "AWS_REGION";

/// Read-only facts about the function invocation a resolver is bound to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    /// Function name, used as the default secret name
    pub function_name: String,

    /// ARN the function was invoked through
    pub invoked_function_arn: String,
}

impl InvocationContext {
    /// Create a context from a function name and its invoked ARN
    #[must_use]
    pub fn new(function_name: impl Into<String>, invoked_function_arn: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            invoked_function_arn: invoked_function_arn.into(),
        }
    }

    /// Region segment of the invoked ARN.
    ///
    /// ARNs have the shape `arn:partition:service:region:account:resource`.
    /// Returns `None` when the ARN is malformed or the region segment is empty.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        let mut parts = self.invoked_function_arn.splitn(6, ':');
        if parts.next() != Some("arn") {
            return None;
        }
        parts.nth(2).filter(|region| !region.is_empty())
    }
}

//! Newtype wrappers for type safety

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Subscription ID newtype, unique within the process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Create a subscription ID from an existing value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh ID
    #[must_use]
    pub fn generate() -> Self {
        let n = NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed);
        Self(format!("sub_{n}"))
    }

    /// Get the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SubscriptionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SubscriptionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SubscriptionId::generate();
        let b = SubscriptionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("sub_"));
    }
}

//! Allow-list authorization.

use hostctl_core::CallerId;

/// Reply sent to callers outside the allow-list.
pub const REJECTION_TEXT: &str = "⛔ You are not authorized to use this bot.";

/// Outcome of checking a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Checks caller identities against an immutable allow-list.
///
/// An empty allow-list admits everyone.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGate {
    allowed: Vec<CallerId>,
}

impl AuthorizationGate {
    pub fn new(allow_list: impl IntoIterator<Item = CallerId>) -> Self {
        let mut allowed: Vec<CallerId> = Vec::new();
        for id in allow_list {
            if !id.as_str().is_empty() && !allowed.contains(&id) {
                allowed.push(id);
            }
        }
        if allowed.is_empty() {
            tracing::warn!("No allow-list configured; every caller is authorized");
        } else {
            tracing::info!(count = allowed.len(), "Allow-list loaded");
        }
        Self { allowed }
    }

    /// Gate with no allow-list.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    #[must_use]
    pub fn evaluate(&self, caller: &CallerId) -> Access {
        if self.is_open() || self.allowed.contains(caller) {
            Access::Allow
        } else {
            Access::Deny
        }
    }

    #[must_use]
    pub fn is_authorized(&self, caller: &CallerId) -> bool {
        self.evaluate(caller) == Access::Allow
    }

    /// Allow-listed callers in configured order.
    pub fn callers(&self) -> impl Iterator<Item = &CallerId> {
        self.allowed.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(ids: &[&str]) -> AuthorizationGate {
        AuthorizationGate::new(ids.iter().map(|id| CallerId::from(*id)))
    }

    #[test]
    fn test_single_entry_allow_list() {
        let gate = gate(&["42"]);
        assert!(gate.is_authorized(&CallerId::from("42")));
        assert!(!gate.is_authorized(&CallerId::from("43")));
        assert_eq!(gate.evaluate(&CallerId::from("43")), Access::Deny);
    }

    #[test]
    fn test_empty_allow_list_admits_everyone() {
        let gate = gate(&[]);
        assert!(gate.is_open());
        assert!(gate.is_authorized(&CallerId::from("anyone")));
        assert!(AuthorizationGate::open().is_authorized(&CallerId::from("1")));
    }

    #[test]
    fn test_caller_ids_are_normalized() {
        let gate = gate(&[" 7 "]);
        assert!(gate.is_authorized(&CallerId::from(7_i64)));
        assert!(gate.is_authorized(&CallerId::from("7\n")));
    }

    #[test]
    fn test_blank_entries_do_not_open_or_match() {
        let gate = gate(&["", "5"]);
        assert!(!gate.is_open());
        assert!(!gate.is_authorized(&CallerId::from("")));
        assert_eq!(gate.callers().count(), 1);
    }
}

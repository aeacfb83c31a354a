//! Plan execution behind the authorization gate.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use hostctl_core::{
    CallerId, CapabilitySet, Invocation, PlanStep, ResultEnvelope, SessionHandle, TurnItem,
};
use thiserror::Error;

use crate::{AuthorizationGate, SessionRegistry, auth::REJECTION_TEXT};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Caller is not on the allow-list. Displays the rejection text.
    #[error("{}", REJECTION_TEXT)]
    Unauthorized(CallerId),
}

/// Runs plans step by step, turning every outcome into a turn item.
///
/// Capability failures and panics become error envelopes; the only error a
/// caller sees is `Unauthorized`.
pub struct Dispatcher {
    gate: AuthorizationGate,
    sessions: Arc<SessionRegistry>,
    capabilities: CapabilitySet,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(
        gate: AuthorizationGate,
        sessions: Arc<SessionRegistry>,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            gate,
            sessions,
            capabilities,
        }
    }

    #[must_use]
    pub const fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    #[must_use]
    pub fn is_authorized(&self, caller: &CallerId) -> bool {
        self.gate.is_authorized(caller)
    }

    fn authorize(&self, caller: &CallerId) -> Result<(), DispatchError> {
        if self.gate.is_authorized(caller) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "Unauthorized access attempt");
            Err(DispatchError::Unauthorized(caller.clone()))
        }
    }

    /// The caller's session, created on first authorized contact.
    ///
    /// # Errors
    /// Returns `Unauthorized` for callers outside the allow-list.
    pub fn session(&self, caller: &CallerId) -> Result<Arc<SessionHandle>, DispatchError> {
        self.authorize(caller)?;
        Ok(self.sessions.get_or_create(caller))
    }

    /// Forget the caller's session.
    ///
    /// # Errors
    /// Returns `Unauthorized` for callers outside the allow-list.
    pub fn clear_session(&self, caller: &CallerId) -> Result<bool, DispatchError> {
        self.authorize(caller)?;
        Ok(self.sessions.clear(caller))
    }

    /// Execute a plan in order.
    ///
    /// Every step runs even when earlier ones fail.
    ///
    /// # Errors
    /// Returns `Unauthorized` without invoking anything for callers outside
    /// the allow-list.
    pub async fn execute(
        &self,
        caller: &CallerId,
        plan: &[PlanStep],
    ) -> Result<Vec<TurnItem>, DispatchError> {
        self.authorize(caller)?;

        let mut items = Vec::with_capacity(plan.len());
        for step in plan {
            let item = match step {
                PlanStep::Text { text } => TurnItem::Text(text.clone()),
                PlanStep::Invoke(invocation) => TurnItem::Envelope(self.invoke(invocation).await),
            };
            items.push(item);
        }
        Ok(items)
    }

    /// Invoke one capability and collapse the outcome into an envelope.
    pub async fn invoke(&self, invocation: &Invocation) -> ResultEnvelope {
        let name = invocation.capability.as_str();
        let Some(capability) = self.capabilities.get(name) else {
            tracing::warn!(capability = %name, "Unknown capability requested");
            return ResultEnvelope::error(format!("Unknown capability: {name}"))
                .with_capability(name);
        };

        tracing::info!(capability = %name, "Invoking capability");
        let outcome = AssertUnwindSafe(capability.invoke(&invocation.args))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(output)) => output.into_envelope(name),
            Ok(Err(e)) => {
                tracing::warn!(capability = %name, error = %e, "Capability failed");
                ResultEnvelope::error(format!("{name} failed: {e}"))
                    .with_capability(name)
                    .with_payload(e.detail())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(capability = %name, %reason, "Capability panicked");
                ResultEnvelope::error(format!("{name} failed: {reason}")).with_capability(name)
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "capability panicked".to_string())
}

//! Reasoner that accepts plans written directly as JSON.

use async_trait::async_trait;
use hostctl_core::{PlanStep, Reasoner, ReasonerError, SessionHandle};
use serde::Deserialize;

/// Reply step for messages that are not a plan.
pub const NO_PLAN_TEXT: &str = "I couldn't map that to any action. Send a JSON plan, \
for example [{\"type\": \"invoke\", \"capability\": \"get_cwd\"}], or use /help.";

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanDocument {
    Steps(Vec<PlanStep>),
    Wrapped { steps: Vec<PlanStep> },
}

/// Interprets a message as an already-resolved plan.
///
/// Natural-language understanding is left to an external reasoner; this one
/// only parses an array of steps or `{"steps": [...]}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPlanReasoner;

impl JsonPlanReasoner {
    /// Parse a message as a plan.
    ///
    /// # Errors
    /// Returns `InvalidPlan` when the message looks like JSON but is not a plan.
    pub fn parse(message: &str) -> Result<Option<Vec<PlanStep>>, ReasonerError> {
        let trimmed = message.trim();
        if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
            return Ok(None);
        }
        let document: PlanDocument = serde_json::from_str(trimmed)
            .map_err(|e| ReasonerError::InvalidPlan(e.to_string()))?;
        Ok(Some(match document {
            PlanDocument::Steps(steps) | PlanDocument::Wrapped { steps } => steps,
        }))
    }
}

#[async_trait]
impl Reasoner for JsonPlanReasoner {
    async fn plan(
        &self,
        session: &SessionHandle,
        message: &str,
    ) -> Result<Vec<PlanStep>, ReasonerError> {
        let steps = Self::parse(message)?;
        tracing::debug!(
            session = %session.continuation_token,
            steps = steps.as_ref().map_or(0, Vec::len),
            "Plan resolved"
        );
        Ok(steps.unwrap_or_else(|| vec![PlanStep::text(NO_PLAN_TEXT)]))
    }
}

//! Core abstractions for remote host control.
//!
//! This crate provides the fundamental building blocks:
//! - `ResultEnvelope` - Uniform result record for every capability call
//! - `CapabilityArgs` - Argument mapping with one default-sentinel convention
//! - `PlanStep` / `TurnItem` - Ordered plans and what executing them produces
//! - `Capability` and `Reasoner` traits, plus the `CapabilitySet` registry
//! - `AgentConfig` - Settings supplied by the hosting process

pub mod args;
pub mod catalog;
pub mod config;
pub mod envelope;
pub mod plan;
pub mod traits;

pub use args::CapabilityArgs;
pub use catalog::{CapabilityInfo, CapabilitySet};
pub use config::{AgentConfig, ScreenConfig};
pub use envelope::{Payload, ResultEnvelope, Status};
pub use plan::{CallerId, Invocation, PlanStep, TurnItem};
pub use traits::{
    Capability, CapabilityError, CapabilityOutput, Reasoner, ReasonerError, SessionHandle,
};

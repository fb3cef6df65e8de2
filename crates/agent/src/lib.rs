//! WebPilot agent core
//!
//! Sense → decide → validate → execute → record, until the oracle reports the
//! task complete, asks for human input, or a limit is hit.

use std::time::Duration;
use thiserror::Error;

pub mod classifier;
pub mod context;
pub mod decision;
pub mod environment;
pub mod executor;
pub mod loop_agent;
pub mod oracle;
pub mod parser;
pub mod retry;
pub mod safety;
pub mod settings;
pub mod state;
pub mod strategy;

pub use classifier::{ClassificationRule, TaskCategory, TaskClassifier};
pub use context::{ContextBuilder, DecisionPrompt};
pub use decision::{Action, ActionKind, Decision, Target};
pub use environment::{
    Actuator, Button, EnvError, EnvResult, Environment, FullSnapshot, Heading, Input, Link,
    PageSnapshot, QuickSnapshot, Sensor, TabInfo,
};
pub use executor::ActionExecutor;
pub use loop_agent::{AgentLoop, RunGuard, TaskOutcome};
pub use oracle::{DecisionOracle, LlmOracle};
pub use parser::parse_decision;
pub use retry::{Backoff, RetryPolicy, SensorRetry};
pub use safety::{is_affirmative, Assessment, ConfirmationRequest, Confirmer, GateVerdict, SafetyGate};
pub use settings::AgentSettings;
pub use state::{AgentRunState, History};
pub use strategy::{dispatch, TaskStrategy};

/// Agent errors
///
/// Fatal loop outcomes each have their own variant so callers can tell an
/// iteration limit from a tripped breaker or a cancellation.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("required field '{field}' is missing for action '{action}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unrecognized action: {0}")]
    UnknownAction(String),

    #[error("action rejected: {0}")]
    Rejected(String),

    #[error("environment error: {0}")]
    Environment(#[from] EnvError),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("environment unavailable: {0}")]
    SensorUnavailable(String),

    #[error("could not read page state: {0}")]
    Sensor(EnvError),

    #[error("iteration limit reached ({0})")]
    IterationLimit(u32),

    #[error("too many consecutive errors ({errors}), last: {last}")]
    CircuitBreaker { errors: u32, last: String },

    #[error("task canceled")]
    Canceled,

    #[error("task deadline exceeded ({0:?})")]
    DeadlineExceeded(Duration),
}

impl AgentError {
    /// True for cancellation and deadline expiry
    pub fn is_canceled(&self) -> bool {
        matches!(self, AgentError::Canceled | AgentError::DeadlineExceeded(_))
    }

    /// True for outcomes that end the task run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::SensorUnavailable(_)
                | AgentError::Sensor(_)
                | AgentError::IterationLimit(_)
                | AgentError::CircuitBreaker { .. }
                | AgentError::Canceled
                | AgentError::DeadlineExceeded(_)
        )
    }
}

impl From<webpilot_provider::ProviderError> for AgentError {
    fn from(err: webpilot_provider::ProviderError) -> Self {
        AgentError::Oracle(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

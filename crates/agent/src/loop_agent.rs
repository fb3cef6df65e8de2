//! Agent loop - core control engine
//!
//! One instance drives one environment. Running two loops against the same
//! environment at once is not supported and not checked.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classifier::TaskClassifier;
use crate::context::ContextBuilder;
use crate::decision::{ActionKind, Decision};
use crate::environment::{EnvError, Environment, PageSnapshot};
use crate::executor::ActionExecutor;
use crate::oracle::DecisionOracle;
use crate::parser::parse_decision;
use crate::retry::{adaptation_note, Backoff};
use crate::safety::{Confirmer, GateVerdict, SafetyGate};
use crate::settings::AgentSettings;
use crate::state::{AgentRunState, CANCELED_PREFIX, LOOP_MARKER};
use crate::strategy::{dispatch, TaskStrategy};
use crate::{AgentError, Result};

/// How a task run ended, other than by error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { summary: Option<String> },
    NeedsInput { prompt: String },
}

enum Step {
    Continue,
    Finished(TaskOutcome),
}

/// Races every blocking call against cancellation and the task deadline
#[derive(Debug, Clone)]
pub struct RunGuard {
    cancel: CancellationToken,
    deadline: Instant,
    timeout: Duration,
}

impl RunGuard {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Canceled),
            _ = tokio::time::sleep_until(self.deadline) => Err(AgentError::DeadlineExceeded(self.timeout)),
            out = fut => Ok(out),
        }
    }

    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return Ok(());
        }
        self.run(tokio::time::sleep(duration)).await
    }
}

/// The sense → decide → validate → execute → record loop
pub struct AgentLoop<E, O>
where
    E: Environment + ?Sized,
    O: DecisionOracle + ?Sized,
{
    env: Arc<E>,
    oracle: Arc<O>,
    confirmer: Arc<dyn Confirmer>,
    settings: AgentSettings,
    classifier: TaskClassifier,
    context: ContextBuilder,
    gate: SafetyGate,
    executor: ActionExecutor,
}

impl<E, O> AgentLoop<E, O>
where
    E: Environment + ?Sized,
    O: DecisionOracle + ?Sized,
{
    pub fn new(
        env: Arc<E>,
        oracle: Arc<O>,
        confirmer: Arc<dyn Confirmer>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            env,
            oracle,
            confirmer,
            context: ContextBuilder::new(settings.history_window),
            executor: ActionExecutor::new(settings.wait_timeout, settings.wait_pause),
            classifier: TaskClassifier::default(),
            gate: SafetyGate::new(),
            settings,
        }
    }

    /// Replace the default classification rules
    pub fn with_classifier(mut self, classifier: TaskClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn environment(&self) -> &Arc<E> {
        &self.env
    }

    /// Run a task with fresh state
    pub async fn execute(&self, task: &str, cancel: &CancellationToken) -> Result<TaskOutcome> {
        let mut state = AgentRunState::new();
        self.run(task, &mut state, cancel).await
    }

    /// Run a task, continuing from `state`
    pub async fn run(
        &self,
        task: &str,
        state: &mut AgentRunState,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome> {
        let guard = RunGuard::new(cancel.clone(), self.settings.task_timeout);
        let category = self.classifier.classify(task);
        let strategy = dispatch(category);
        info!("◆ Starting task ({}): {}", category, task);

        while state.iteration < self.settings.max_iterations {
            state.iteration += 1;
            debug!("Agent iteration {}", state.iteration);

            match self.step(task, state, strategy.as_ref(), &guard).await? {
                Step::Finished(outcome) => return Ok(outcome),
                Step::Continue => {}
            }
        }

        warn!("◆ Iteration limit reached ({})", self.settings.max_iterations);
        Err(AgentError::IterationLimit(self.settings.max_iterations))
    }

    async fn step(
        &self,
        task: &str,
        state: &mut AgentRunState,
        strategy: &dyn TaskStrategy,
        guard: &RunGuard,
    ) -> Result<Step> {
        let snapshot = self.sense(guard).await?;

        let prompt = self.context.build(task, &state.history, &snapshot, strategy);
        let raw = match guard.run(self.oracle.decide(&prompt)).await? {
            Ok(raw) => raw,
            Err(e) => {
                warn!("◆ Decision failed: {}", e);
                return self.fail(state, guard, e, None).await;
            }
        };
        let mut decision = parse_decision(&raw);
        info!("◆ Decision: {} ({})", decision.action, decision.reasoning);

        if decision.is_complete {
            let markers = state.history.completion_markers(self.settings.loop_window);
            if markers >= self.settings.loop_threshold {
                warn!(
                    "◆ Completion claimed {} times in the last {} steps, continuing",
                    markers, self.settings.loop_window
                );
                decision.is_complete = false;
                state.history.push(LOOP_MARKER);
            } else {
                info!("◆ Task complete");
                return Ok(Step::Finished(TaskOutcome::Completed {
                    summary: decision.summary,
                }));
            }
        }

        if decision.needs_input {
            info!("◆ Task needs user input");
            return Ok(Step::Finished(TaskOutcome::NeedsInput {
                prompt: decision.input_prompt.unwrap_or_default(),
            }));
        }

        if decision.action == ActionKind::Complete {
            debug!("Skipping complete action after loop detection");
            state
                .history
                .push(format!("{}: skipped, completion not accepted", ActionKind::Complete));
            guard.sleep(self.settings.iteration_pause).await?;
            return Ok(Step::Continue);
        }

        if let Err(e) = strategy.validate(&decision) {
            return self.fail(state, guard, e, Some(&decision)).await;
        }

        if !self.confirm(&decision, &snapshot, strategy, guard).await? {
            info!("◆ Destructive action '{}' canceled by user", decision.action);
            state.history.push(format!(
                "{}: destructive action '{}' declined by user",
                CANCELED_PREFIX, decision.action
            ));
            guard.sleep(self.settings.iteration_pause).await?;
            return Ok(Step::Continue);
        }

        match guard
            .run(self.executor.execute(self.env.as_ref(), &decision))
            .await?
        {
            Ok(()) => {
                self.settings.retry.record_success(state);
                state.history.push(decision.summary_line());
                guard.sleep(self.settings.iteration_pause).await?;
                Ok(Step::Continue)
            }
            Err(e) => {
                warn!("◆ Action '{}' failed: {}", decision.action, e);
                self.fail(state, guard, e, Some(&decision)).await
            }
        }
    }

    /// Quick snapshot, falling back to a full one with bounded retries
    async fn sense(&self, guard: &RunGuard) -> Result<PageSnapshot> {
        match guard.run(self.env.quick_snapshot()).await? {
            Ok(quick) => return Ok(PageSnapshot::Quick(quick)),
            Err(EnvError::Closed) => return Err(unavailable()),
            Err(e) => debug!("Quick snapshot failed, using full snapshot: {}", e),
        }

        let retry = self.settings.sensor_retry;
        let mut attempt = 1;
        loop {
            match guard.run(self.env.full_snapshot()).await? {
                Ok(full) => return Ok(PageSnapshot::Full(full)),
                Err(EnvError::Closed) => return Err(unavailable()),
                Err(e) if e.is_transient() && attempt < retry.attempts => {
                    warn!(
                        "◆ Snapshot attempt {}/{} failed: {}",
                        attempt, retry.attempts, e
                    );
                    guard.sleep(retry.pause_after(attempt)).await?;
                    attempt += 1;
                }
                Err(e) => {
                    error!("◆ Could not read page state: {}", e);
                    return Err(AgentError::Sensor(e));
                }
            }
        }
    }

    /// True when the action may run
    async fn confirm(
        &self,
        decision: &Decision,
        snapshot: &PageSnapshot,
        strategy: &dyn TaskStrategy,
        guard: &RunGuard,
    ) -> Result<bool> {
        let forced = strategy.requires_confirmation(decision);
        if !forced && !self.gate.is_potentially_destructive(decision) {
            return Ok(true);
        }

        let verdict = guard
            .run(self.gate.review(
                self.oracle.as_ref(),
                self.confirmer.as_ref(),
                decision,
                &snapshot.summary(),
                forced,
            ))
            .await?;
        Ok(verdict == GateVerdict::Proceed)
    }

    /// Count a failure, back off, or trip the breaker
    async fn fail(
        &self,
        state: &mut AgentRunState,
        guard: &RunGuard,
        err: AgentError,
        decision: Option<&Decision>,
    ) -> Result<Step> {
        let message = err.to_string();
        if let Some(decision) = decision {
            state.history.push(format!(
                "ERROR during '{}': {}. Strategy: {}",
                decision.action,
                message,
                adaptation_note(&message)
            ));
        }

        match self.settings.retry.record_failure(state) {
            Backoff::Trip => {
                error!(
                    "◆ Stopping after {} consecutive errors",
                    state.consecutive_errors
                );
                Err(AgentError::CircuitBreaker {
                    errors: state.consecutive_errors,
                    last: message,
                })
            }
            Backoff::Retry(delay) => {
                debug!("Backing off for {:?}", delay);
                guard.sleep(delay).await?;
                Ok(Step::Continue)
            }
        }
    }
}

fn unavailable() -> AgentError {
    AgentError::SensorUnavailable("environment closed".to_string())
}

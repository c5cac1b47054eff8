//! The calibration workflow as a synchronous transition function.
//!
//! [`CalibrationMachine::handle`] takes one [`Event`] and the current
//! instant and returns the [`Effect`]s the driver must carry out. It never
//! performs I/O and never reads the clock itself, so every transition can be
//! tested directly.
//!
//! ```text
//!            open            confirm           accepted
//!   Idle ──────────▶ Selecting ──────▶ Submitting ──────▶ Polling
//!    ▲                  ▲  │ select        │ rejected        │ done / failed / timeout
//!    │ close (any)      │  └───┘           ▼                 ▼
//!    └──────────────────┴──── retry ── Failed ◀──────── Succeeded | Failed
//! ```
//!
//! Responses are matched against the active request: dispatch results by
//! `attempt`, poll results and ticks by `command_id` / `attempt`. Anything
//! that does not match is dropped, so a response that arrives after
//! close, retry or timeout cannot change the workflow.

use core::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::debug;

use tirta_types::{CommandStatus, DispatchRequest, NodeTarget, SensorKind};

use crate::events::CalibrationEvent;

use super::config::CalibrationConfig;

/// Workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    /// No workflow open.
    Idle,
    /// Waiting for the operator to pick a sensor and confirm.
    Selecting,
    /// Dispatch request in flight.
    Submitting,
    /// Command accepted; polling its status.
    Polling,
    /// The node reported completion.
    Succeeded,
    /// Dispatch failed, the node reported failure, or the timeout elapsed.
    Failed,
}

impl CalibrationState {
    /// Whether the request has reached an outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CalibrationState::Succeeded | CalibrationState::Failed)
    }

    /// Whether a request is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, CalibrationState::Submitting | CalibrationState::Polling)
    }
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalibrationState::Idle => "idle",
            CalibrationState::Selecting => "selecting",
            CalibrationState::Submitting => "submitting",
            CalibrationState::Polling => "polling",
            CalibrationState::Succeeded => "succeeded",
            CalibrationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a calibration failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The dispatch request failed; the command never started.
    DispatchError(String),
    /// The node reported `failed`.
    Reported,
    /// No terminal status within the timeout.
    Timeout {
        /// The configured timeout that elapsed.
        after: Duration,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::DispatchError(e) => write!(f, "dispatch failed: {e}"),
            FailureReason::Reported => write!(f, "the node reported a calibration failure"),
            FailureReason::Timeout { after } => {
                write!(f, "no result within {}s", after.as_secs())
            }
        }
    }
}

/// Terminal result of one calibration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationOutcome {
    Succeeded,
    Failed(FailureReason),
}

impl CalibrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CalibrationOutcome::Succeeded)
    }

    /// The failure reason, if any.
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            CalibrationOutcome::Succeeded => None,
            CalibrationOutcome::Failed(reason) => Some(reason),
        }
    }
}

impl fmt::Display for CalibrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationOutcome::Succeeded => write!(f, "calibration succeeded"),
            CalibrationOutcome::Failed(reason) => write!(f, "calibration failed: {reason}"),
        }
    }
}

/// The active request. Exists from confirm until close or retry.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRequest {
    /// Sequence number within this machine.
    pub attempt: u64,
    pub target: NodeTarget,
    pub sensor: SensorKind,
    /// Assigned by the dispatch endpoint.
    pub command_id: Option<String>,
    /// Monotonic submission time; the timeout anchor.
    pub submitted_at: Instant,
    /// Wall-clock submission time, for display.
    pub submitted_wall: OffsetDateTime,
}

/// Input to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Open the workflow for a node.
    Open(NodeTarget),
    /// Choose a sensor.
    Select(SensorKind),
    /// Submit the selection.
    Confirm,
    /// Close or cancel from any state.
    Close,
    /// Start over after an outcome.
    Retry,
    DispatchAccepted { attempt: u64, command_id: String },
    DispatchRejected { attempt: u64, error: String },
    StatusObserved { command_id: String, status: CommandStatus },
    PollMissed { command_id: String, error: String },
    /// Timeout check for the given attempt.
    Tick { attempt: u64 },
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Open(_) => "open",
            Event::Select(_) => "select",
            Event::Confirm => "confirm",
            Event::Close => "close",
            Event::Retry => "retry",
            Event::DispatchAccepted { .. } => "dispatch_accepted",
            Event::DispatchRejected { .. } => "dispatch_rejected",
            Event::StatusObserved { .. } => "status_observed",
            Event::PollMissed { .. } => "poll_missed",
            Event::Tick { .. } => "tick",
        }
    }
}

/// Work the driver must carry out after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send the dispatch request.
    Dispatch { attempt: u64, request: DispatchRequest },
    /// Start the poll loop and the timeout ticker.
    StartPolling {
        attempt: u64,
        command_id: String,
        submitted_at: Instant,
    },
    /// Stop every timer and in-flight call of the current request.
    StopTimers,
    /// The request reached an outcome.
    Finished(CalibrationOutcome),
    /// Publish a notification.
    Notify(CalibrationEvent),
}

/// Read-only view of the machine for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub state: CalibrationState,
    pub target: Option<NodeTarget>,
    pub selected: Option<SensorKind>,
    pub attempt: u64,
    pub command_id: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    pub last_status: Option<CommandStatus>,
    pub polls: u32,
    pub missed_polls: u32,
    pub outcome: Option<CalibrationOutcome>,
}

/// The calibration state machine.
#[derive(Debug, Clone)]
pub struct CalibrationMachine {
    config: CalibrationConfig,
    state: CalibrationState,
    target: Option<NodeTarget>,
    selected: Option<SensorKind>,
    request: Option<CalibrationRequest>,
    next_attempt: u64,
    last_status: Option<CommandStatus>,
    polls: u32,
    missed_polls: u32,
    outcome: Option<CalibrationOutcome>,
}

impl CalibrationMachine {
    /// Create an idle machine.
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: CalibrationState::Idle,
            target: None,
            selected: None,
            request: None,
            next_attempt: 1,
            last_status: None,
            polls: 0,
            missed_polls: 0,
            outcome: None,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn selected(&self) -> Option<SensorKind> {
        self.selected
    }

    pub fn request(&self) -> Option<&CalibrationRequest> {
        self.request.as_ref()
    }

    pub fn outcome(&self) -> Option<&CalibrationOutcome> {
        self.outcome.as_ref()
    }

    /// Current view for presentation.
    pub fn snapshot(&self) -> CalibrationSnapshot {
        CalibrationSnapshot {
            state: self.state,
            target: self.target.clone(),
            selected: self.selected,
            attempt: self.request.as_ref().map_or(0, |r| r.attempt),
            command_id: self.request.as_ref().and_then(|r| r.command_id.clone()),
            submitted_at: self.request.as_ref().map(|r| r.submitted_wall),
            last_status: self.last_status,
            polls: self.polls,
            missed_polls: self.missed_polls,
            outcome: self.outcome.clone(),
        }
    }

    /// Apply one event.
    ///
    /// Events that do not apply to the current state, or that belong to a
    /// request other than the active one, leave the machine unchanged and
    /// return no effects.
    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Effect> {
        use CalibrationState as S;

        let name = event.name();
        let mut effects = Vec::new();
        let from = self.state;

        match (self.state, event) {
            (_, Event::Close) => {
                if self.state == S::Idle {
                    return effects;
                }
                if self.request.is_some() {
                    effects.push(Effect::StopTimers);
                }
                self.reset();
            }

            (S::Idle, Event::Open(target)) => {
                self.target = Some(target);
                self.state = S::Selecting;
            }

            (S::Selecting, Event::Select(kind)) => {
                self.selected = Some(kind);
                effects.push(Effect::Notify(CalibrationEvent::SensorSelected { sensor: kind }));
            }

            (S::Selecting, Event::Confirm) => {
                let (Some(target), Some(sensor)) = (self.target.clone(), self.selected) else {
                    debug!(state = %self.state, "Confirm ignored: no sensor selected");
                    return effects;
                };
                let attempt = self.next_attempt;
                self.next_attempt += 1;
                let request = DispatchRequest::calibration(&target, sensor);
                self.request = Some(CalibrationRequest {
                    attempt,
                    target,
                    sensor,
                    command_id: None,
                    submitted_at: now,
                    submitted_wall: OffsetDateTime::now_utc(),
                });
                self.state = S::Submitting;
                effects.push(Effect::Dispatch { attempt, request });
            }

            (S::Submitting, Event::DispatchAccepted { attempt, command_id })
                if self.is_active_attempt(attempt) =>
            {
                let Some(request) = self.request.as_mut() else {
                    return effects;
                };
                request.command_id = Some(command_id.clone());
                let submitted_at = request.submitted_at;
                self.state = S::Polling;
                effects.push(Effect::StartPolling {
                    attempt,
                    command_id,
                    submitted_at,
                });
            }

            (S::Submitting, Event::DispatchRejected { attempt, error })
                if self.is_active_attempt(attempt) =>
            {
                self.finish(
                    CalibrationOutcome::Failed(FailureReason::DispatchError(error)),
                    &mut effects,
                );
            }

            (S::Polling, Event::StatusObserved { command_id, status })
                if self.is_active_command(&command_id) =>
            {
                if self.timed_out(now) {
                    self.finish_timeout(&mut effects);
                    return self.with_state_change(from, effects);
                }
                self.polls += 1;
                self.last_status = Some(status);
                effects.push(Effect::Notify(CalibrationEvent::StatusPolled {
                    command_id,
                    status,
                }));
                match status {
                    CommandStatus::Done => self.finish(CalibrationOutcome::Succeeded, &mut effects),
                    CommandStatus::Failed => self.finish(
                        CalibrationOutcome::Failed(FailureReason::Reported),
                        &mut effects,
                    ),
                    CommandStatus::Pending => {}
                }
            }

            (S::Polling, Event::PollMissed { command_id, error })
                if self.is_active_command(&command_id) =>
            {
                if self.timed_out(now) {
                    self.finish_timeout(&mut effects);
                    return self.with_state_change(from, effects);
                }
                self.missed_polls += 1;
                effects.push(Effect::Notify(CalibrationEvent::PollMissed { command_id, error }));
            }

            (S::Polling, Event::Tick { attempt }) if self.is_active_attempt(attempt) => {
                if self.timed_out(now) {
                    self.finish_timeout(&mut effects);
                }
            }

            (S::Succeeded | S::Failed, Event::Retry) => {
                effects.push(Effect::StopTimers);
                self.request = None;
                self.selected = None;
                self.outcome = None;
                self.last_status = None;
                self.polls = 0;
                self.missed_polls = 0;
                self.state = S::Selecting;
            }

            (state, _) => {
                debug!(%state, event = name, "Event ignored");
                return effects;
            }
        }

        self.with_state_change(from, effects)
    }

    fn with_state_change(&self, from: CalibrationState, mut effects: Vec<Effect>) -> Vec<Effect> {
        if self.state != from {
            effects.push(Effect::Notify(CalibrationEvent::StateChanged {
                from,
                to: self.state,
            }));
        }
        effects
    }

    /// The timeout is measured from submission and preempts any later poll result.
    fn timed_out(&self, now: Instant) -> bool {
        let elapsed = self
            .request
            .as_ref()
            .map_or(Duration::ZERO, |r| now.saturating_duration_since(r.submitted_at));
        elapsed >= self.config.timeout
    }

    fn finish_timeout(&mut self, effects: &mut Vec<Effect>) {
        self.finish(
            CalibrationOutcome::Failed(FailureReason::Timeout {
                after: self.config.timeout,
            }),
            effects,
        );
    }

    fn is_active_attempt(&self, attempt: u64) -> bool {
        self.request.as_ref().is_some_and(|r| r.attempt == attempt)
    }

    fn is_active_command(&self, command_id: &str) -> bool {
        self.request
            .as_ref()
            .and_then(|r| r.command_id.as_deref())
            .is_some_and(|id| id == command_id)
    }

    fn finish(&mut self, outcome: CalibrationOutcome, effects: &mut Vec<Effect>) {
        self.state = if outcome.is_success() {
            CalibrationState::Succeeded
        } else {
            CalibrationState::Failed
        };
        self.outcome = Some(outcome.clone());
        effects.push(Effect::StopTimers);
        effects.push(Effect::Finished(outcome));
    }

    fn reset(&mut self) {
        self.state = CalibrationState::Idle;
        self.target = None;
        self.selected = None;
        self.request = None;
        self.last_status = None;
        self.polls = 0;
        self.missed_polls = 0;
        self.outcome = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> CalibrationMachine {
        CalibrationMachine::new(CalibrationConfig::default())
    }

    fn target() -> NodeTarget {
        NodeTarget::new("12", "Hulu")
    }

    /// Drive a fresh machine into `Polling` with command id `cmd-1`.
    fn polling(now: Instant) -> CalibrationMachine {
        let mut m = machine();
        m.handle(Event::Open(target()), now);
        m.handle(Event::Select(SensorKind::Ph), now);
        m.handle(Event::Confirm, now);
        m.handle(
            Event::DispatchAccepted {
                attempt: 1,
                command_id: "cmd-1".into(),
            },
            now,
        );
        assert_eq!(m.state(), CalibrationState::Polling);
        m
    }

    fn has_effect(effects: &[Effect], pred: impl Fn(&Effect) -> bool) -> bool {
        effects.iter().any(pred)
    }

    // --- Transition table ---

    #[test]
    fn test_open_enters_selecting() {
        let mut m = machine();
        let effects = m.handle(Event::Open(target()), Instant::now());
        assert_eq!(m.state(), CalibrationState::Selecting);
        assert_eq!(
            effects,
            vec![Effect::Notify(CalibrationEvent::StateChanged {
                from: CalibrationState::Idle,
                to: CalibrationState::Selecting,
            })]
        );
    }

    #[test]
    fn test_confirm_without_selection_is_ignored() {
        let mut m = machine();
        let now = Instant::now();
        m.handle(Event::Open(target()), now);
        let effects = m.handle(Event::Confirm, now);
        assert!(effects.is_empty());
        assert_eq!(m.state(), CalibrationState::Selecting);
    }

    #[test]
    fn test_confirm_dispatches_selected_command() {
        let mut m = machine();
        let now = Instant::now();
        m.handle(Event::Open(target()), now);
        m.handle(Event::Select(SensorKind::Ph), now);
        m.handle(Event::Select(SensorKind::Turbidity), now);
        let effects = m.handle(Event::Confirm, now);

        assert_eq!(m.state(), CalibrationState::Submitting);
        let Some(Effect::Dispatch { attempt, request }) = effects.first() else {
            panic!("expected dispatch, got {effects:?}");
        };
        assert_eq!(*attempt, 1);
        assert_eq!(request.command, "kalibrasi_turb");
        assert_eq!(request.node_id, "12");
        assert_eq!(request.node, "Hulu");
        assert_eq!(m.request().map(|r| r.submitted_at), Some(now));
    }

    #[test]
    fn test_dispatch_accepted_starts_polling() {
        let now = Instant::now();
        let mut m = machine();
        m.handle(Event::Open(target()), now);
        m.handle(Event::Select(SensorKind::Salinity), now);
        m.handle(Event::Confirm, now);
        let later = now + Duration::from_millis(400);
        let effects = m.handle(
            Event::DispatchAccepted {
                attempt: 1,
                command_id: "cmd-1".into(),
            },
            later,
        );
        assert!(has_effect(&effects, |e| matches!(
            e,
            Effect::StartPolling { attempt: 1, command_id, submitted_at }
                if command_id == "cmd-1" && *submitted_at == now
        )));
        assert_eq!(m.snapshot().command_id.as_deref(), Some("cmd-1"));
    }

    #[test]
    fn test_dispatch_rejected_fails_without_polling() {
        let now = Instant::now();
        let mut m = machine();
        m.handle(Event::Open(target()), now);
        m.handle(Event::Select(SensorKind::Ph), now);
        m.handle(Event::Confirm, now);
        let effects = m.handle(
            Event::DispatchRejected {
                attempt: 1,
                error: "connection refused".into(),
            },
            now,
        );
        assert_eq!(m.state(), CalibrationState::Failed);
        assert!(!has_effect(&effects, |e| matches!(e, Effect::StartPolling { .. })));
        assert!(has_effect(&effects, |e| *e == Effect::StopTimers));
        assert_eq!(
            m.outcome(),
            Some(&CalibrationOutcome::Failed(FailureReason::DispatchError(
                "connection refused".into()
            )))
        );
    }

    #[test]
    fn test_pending_status_keeps_polling() {
        let now = Instant::now();
        let mut m = polling(now);
        let effects = m.handle(
            Event::StatusObserved {
                command_id: "cmd-1".into(),
                status: CommandStatus::Pending,
            },
            now,
        );
        assert_eq!(m.state(), CalibrationState::Polling);
        assert!(!has_effect(&effects, |e| matches!(e, Effect::Finished(_))));
        assert_eq!(m.snapshot().polls, 1);
    }

    #[test]
    fn test_done_status_succeeds() {
        let now = Instant::now();
        let mut m = polling(now);
        let effects = m.handle(
            Event::StatusObserved {
                command_id: "cmd-1".into(),
                status: CommandStatus::Done,
            },
            now,
        );
        assert_eq!(m.state(), CalibrationState::Succeeded);
        assert!(has_effect(&effects, |e| *e == Effect::StopTimers));
        assert!(has_effect(&effects, |e| *e
            == Effect::Finished(CalibrationOutcome::Succeeded)));
    }

    #[test]
    fn test_failed_status_is_reported_failure() {
        let now = Instant::now();
        let mut m = polling(now);
        m.handle(
            Event::StatusObserved {
                command_id: "cmd-1".into(),
                status: CommandStatus::Failed,
            },
            now,
        );
        assert_eq!(
            m.outcome(),
            Some(&CalibrationOutcome::Failed(FailureReason::Reported))
        );
    }

    #[test]
    fn test_poll_miss_is_absorbed() {
        let now = Instant::now();
        let mut m = polling(now);
        let effects = m.handle(
            Event::PollMissed {
                command_id: "cmd-1".into(),
                error: "timeout".into(),
            },
            now,
        );
        assert_eq!(m.state(), CalibrationState::Polling);
        assert_eq!(m.snapshot().missed_polls, 1);
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_timeout_at_threshold() {
        let now = Instant::now();
        let mut m = polling(now);

        let effects = m.handle(Event::Tick { attempt: 1 }, now + Duration::from_secs(59));
        assert!(effects.is_empty());
        assert_eq!(m.state(), CalibrationState::Polling);

        m.handle(Event::Tick { attempt: 1 }, now + Duration::from_secs(60));
        assert_eq!(m.state(), CalibrationState::Failed);
        assert_eq!(
            m.outcome(),
            Some(&CalibrationOutcome::Failed(FailureReason::Timeout {
                after: Duration::from_secs(60)
            }))
        );
    }

    #[test]
    fn test_late_done_after_timeout_is_ignored() {
        let now = Instant::now();
        let mut m = polling(now);
        m.handle(Event::Tick { attempt: 1 }, now + Duration::from_secs(61));
        let effects = m.handle(
            Event::StatusObserved {
                command_id: "cmd-1".into(),
                status: CommandStatus::Done,
            },
            now + Duration::from_secs(62),
        );
        assert!(effects.is_empty());
        assert_eq!(m.state(), CalibrationState::Failed);
    }

    #[test]
    fn test_done_past_timeout_before_tick_fails() {
        let now = Instant::now();
        let mut m = polling(now);
        let effects = m.handle(
            Event::StatusObserved {
                command_id: "cmd-1".into(),
                status: CommandStatus::Done,
            },
            now + Duration::from_secs(61),
        );
        let timeout = CalibrationOutcome::Failed(FailureReason::Timeout {
            after: Duration::from_secs(60),
        });
        assert_eq!(m.state(), CalibrationState::Failed);
        assert_eq!(m.outcome(), Some(&timeout));
        assert_eq!(m.snapshot().polls, 0);
        assert!(has_effect(&effects, |e| *e == Effect::Finished(timeout.clone())));
        assert!(!has_effect(&effects, |e| matches!(
            e,
            Effect::Notify(CalibrationEvent::StatusPolled { .. })
        )));
    }

    #[test]
    fn test_poll_miss_past_timeout_fails() {
        let now = Instant::now();
        let mut m = polling(now);
        m.handle(
            Event::PollMissed {
                command_id: "cmd-1".into(),
                error: "connection reset".into(),
            },
            now + Duration::from_secs(60),
        );
        assert!(matches!(
            m.outcome(),
            Some(CalibrationOutcome::Failed(FailureReason::Timeout { .. }))
        ));
        assert_eq!(m.snapshot().missed_polls, 0);
    }

    #[test]
    fn test_close_from_polling_stops_timers() {
        let now = Instant::now();
        let mut m = polling(now);
        let effects = m.handle(Event::Close, now);
        assert_eq!(effects[0], Effect::StopTimers);
        assert_eq!(m.state(), CalibrationState::Idle);
        assert!(m.request().is_none());
        assert!(m.snapshot().target.is_none());
    }

    #[test]
    fn test_close_when_idle_is_noop() {
        let mut m = machine();
        assert!(m.handle(Event::Close, Instant::now()).is_empty());
    }

    #[test]
    fn test_retry_clears_selection_and_keeps_target() {
        let now = Instant::now();
        let mut m = polling(now);
        m.handle(
            Event::StatusObserved {
                command_id: "cmd-1".into(),
                status: CommandStatus::Failed,
            },
            now,
        );
        let effects = m.handle(Event::Retry, now);
        assert!(has_effect(&effects, |e| *e == Effect::StopTimers));
        assert_eq!(m.state(), CalibrationState::Selecting);
        let snap = m.snapshot();
        assert!(snap.selected.is_none());
        assert!(snap.outcome.is_none());
        assert!(snap.command_id.is_none());
        assert_eq!(snap.target, Some(target()));
    }

    #[test]
    fn test_retry_ignored_while_polling() {
        let now = Instant::now();
        let mut m = polling(now);
        assert!(m.handle(Event::Retry, now).is_empty());
        assert_eq!(m.state(), CalibrationState::Polling);
    }

    // --- Stale responses ---

    #[test]
    fn test_stale_status_after_retry_is_dropped() {
        let now = Instant::now();
        let mut m = polling(now);
        m.handle(
            Event::StatusObserved {
                command_id: "cmd-1".into(),
                status: CommandStatus::Failed,
            },
            now,
        );
        m.handle(Event::Retry, now);
        m.handle(Event::Select(SensorKind::DissolvedOxygen), now);
        let effects = m.handle(Event::Confirm, now);
        assert!(has_effect(&effects, |e| matches!(e, Effect::Dispatch { attempt: 2, .. })));
        m.handle(
            Event::DispatchAccepted {
                attempt: 2,
                command_id: "cmd-2".into(),
            },
            now,
        );

        let effects = m.handle(
            Event::StatusObserved {
                command_id: "cmd-1".into(),
                status: CommandStatus::Done,
            },
            now,
        );
        assert!(effects.is_empty());
        assert_eq!(m.state(), CalibrationState::Polling);
        assert_eq!(m.snapshot().command_id.as_deref(), Some("cmd-2"));
    }

    #[test]
    fn test_stale_dispatch_response_is_dropped() {
        let now = Instant::now();
        let mut m = machine();
        m.handle(Event::Open(target()), now);
        m.handle(Event::Select(SensorKind::Ph), now);
        m.handle(Event::Confirm, now);
        m.handle(Event::Close, now);
        m.handle(Event::Open(target()), now);
        m.handle(Event::Select(SensorKind::Ph), now);
        m.handle(Event::Confirm, now);

        let effects = m.handle(
            Event::DispatchAccepted {
                attempt: 1,
                command_id: "old".into(),
            },
            now,
        );
        assert!(effects.is_empty());
        assert_eq!(m.state(), CalibrationState::Submitting);
    }

    #[test]
    fn test_stale_tick_is_dropped() {
        let now = Instant::now();
        let mut m = polling(now);
        let effects = m.handle(Event::Tick { attempt: 7 }, now + Duration::from_secs(120));
        assert!(effects.is_empty());
        assert_eq!(m.state(), CalibrationState::Polling);
    }

    #[test]
    fn test_open_ignored_when_not_idle() {
        let now = Instant::now();
        let mut m = machine();
        m.handle(Event::Open(target()), now);
        let effects = m.handle(Event::Open(NodeTarget::new("99", "Other")), now);
        assert!(effects.is_empty());
        assert_eq!(m.snapshot().target, Some(target()));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(CalibrationOutcome::Succeeded.to_string(), "calibration succeeded");
        let timeout = CalibrationOutcome::Failed(FailureReason::Timeout {
            after: Duration::from_secs(60),
        });
        assert_eq!(timeout.to_string(), "calibration failed: no result within 60s");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_event() -> impl Strategy<Value = Event> {
        let command_id = (0u8..3).prop_map(|n| format!("cmd-{n}"));
        let status = prop_oneof![
            Just(CommandStatus::Pending),
            Just(CommandStatus::Done),
            Just(CommandStatus::Failed),
        ];
        prop_oneof![
            Just(Event::Open(NodeTarget::new("1", "Hulu"))),
            prop::sample::select(SensorKind::ALL.to_vec()).prop_map(Event::Select),
            Just(Event::Confirm),
            Just(Event::Close),
            Just(Event::Retry),
            (1u64..4, command_id.clone())
                .prop_map(|(attempt, command_id)| Event::DispatchAccepted { attempt, command_id }),
            (1u64..4).prop_map(|attempt| Event::DispatchRejected {
                attempt,
                error: "rejected".into(),
            }),
            (command_id.clone(), status)
                .prop_map(|(command_id, status)| Event::StatusObserved { command_id, status }),
            command_id.prop_map(|command_id| Event::PollMissed {
                command_id,
                error: "flaky".into(),
            }),
            (1u64..4).prop_map(|attempt| Event::Tick { attempt }),
        ]
    }

    proptest! {
        /// Outcomes are final until the operator retries or closes, only a
        /// confirm can start network work, and nothing succeeds past the
        /// timeout.
        #[test]
        fn random_event_sequences_keep_invariants(
            steps in proptest::collection::vec((arb_event(), 0u64..30), 1..60)
        ) {
            let config = CalibrationConfig::default();
            let mut m = CalibrationMachine::new(config);
            let mut now = Instant::now();

            for (event, advance) in steps {
                now += Duration::from_secs(advance);
                let was_terminal = m.state().is_terminal();
                let is_confirm = event == Event::Confirm;
                let resets = matches!(event, Event::Retry | Event::Close);
                let submitted_at = m.request().map(|r| r.submitted_at);

                let effects = m.handle(event, now);

                for (i, effect) in effects.iter().enumerate() {
                    match effect {
                        Effect::Dispatch { .. } => prop_assert!(is_confirm),
                        Effect::StartPolling { .. } | Effect::Finished(_) => {
                            prop_assert!(!was_terminal || resets);
                        }
                        _ => {}
                    }
                    if matches!(effect, Effect::Finished(_)) {
                        prop_assert!(i > 0 && effects[i - 1] == Effect::StopTimers);
                    }
                    // nothing succeeds once the timeout has passed
                    if *effect == Effect::Finished(CalibrationOutcome::Succeeded) {
                        let elapsed = submitted_at.map(|t| now.saturating_duration_since(t));
                        prop_assert!(elapsed.is_some_and(|e| e < config.timeout));
                    }
                }

                prop_assert_eq!(m.state().is_terminal(), m.outcome().is_some());
                if m.state() == CalibrationState::Idle {
                    prop_assert!(m.request().is_none());
                }
            }
        }
    }
}

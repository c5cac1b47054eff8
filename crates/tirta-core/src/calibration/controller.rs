//! Async driver for the calibration state machine.
//!
//! [`CalibrationController`] owns a [`CalibrationMachine`] and runs in its
//! own Tokio task. It communicates through channels:
//!
//! - Receives [`Intent`]s from a [`CalibrationHandle`] and acknowledges each
//!   one once it has been applied
//! - Receives results from the dispatch task, the poll loop and the timeout
//!   ticker it spawns
//! - Publishes a [`CalibrationSnapshot`] on a `watch` channel after every
//!   event and [`CalibrationEvent`]s on a broadcast channel
//!
//! Events are processed one at a time, so the machine is never touched
//! concurrently. Network calls and timers of the active request share one
//! [`CancellationToken`]; close, retry and every terminal outcome cancel it
//! before anything else happens.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tirta_types::{CommandStatus, DispatchRequest, NodeTarget, SensorKind};

use crate::error::{Error, Result};
use crate::events::{CalibrationEvent, EventDispatcher, EventReceiver};
use crate::traits::CommandApi;

use super::config::CalibrationConfig;
use super::machine::{
    CalibrationMachine, CalibrationOutcome, CalibrationSnapshot, CalibrationState, Effect, Event,
};

/// Capacity of the intent channel.
const INTENT_CAPACITY: usize = 32;

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Open(NodeTarget),
    Select(SensorKind),
    Confirm,
    Close,
    Retry,
    Shutdown,
}

/// Background task that drives one calibration workflow.
pub struct CalibrationController {
    api: Arc<dyn CommandApi>,
    machine: CalibrationMachine,
    intent_rx: mpsc::Receiver<(Intent, oneshot::Sender<()>)>,
    /// Results from spawned tasks.
    result_tx: mpsc::UnboundedSender<Event>,
    result_rx: mpsc::UnboundedReceiver<Event>,
    snapshot_tx: watch::Sender<CalibrationSnapshot>,
    events: EventDispatcher,
    /// Scopes every task of the active request.
    cancel_token: CancellationToken,
}

impl CalibrationController {
    /// Create a controller and the handle that talks to it.
    ///
    /// The controller does nothing until [`run`](Self::run) is awaited; use
    /// [`spawn`](Self::spawn) to do both.
    pub fn new(
        api: Arc<dyn CommandApi>,
        config: CalibrationConfig,
    ) -> Result<(Self, CalibrationHandle)> {
        config.validate()?;

        let machine = CalibrationMachine::new(config);
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_CAPACITY);
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let events = EventDispatcher::default();

        let handle = CalibrationHandle {
            intent_tx,
            snapshot_rx,
            events: events.clone(),
        };
        let controller = Self {
            api,
            machine,
            intent_rx,
            result_tx,
            result_rx,
            snapshot_tx,
            events,
            cancel_token: CancellationToken::new(),
        };
        Ok((controller, handle))
    }

    /// Create a controller and run it on the current Tokio runtime.
    pub fn spawn(api: Arc<dyn CommandApi>, config: CalibrationConfig) -> Result<CalibrationHandle> {
        let (controller, handle) = Self::new(api, config)?;
        tokio::spawn(controller.run());
        Ok(handle)
    }

    /// Run the controller's main loop.
    ///
    /// Consumes the controller and runs until [`Intent::Shutdown`] is
    /// received or every handle is dropped.
    pub async fn run(mut self) {
        debug!("Calibration controller started");

        loop {
            tokio::select! {
                intent = self.intent_rx.recv() => {
                    match intent {
                        Some((Intent::Shutdown, _)) | None => break,
                        Some((intent, ack)) => {
                            self.apply(intent_event(intent));
                            let _ = ack.send(());
                        }
                    }
                }
                Some(event) = self.result_rx.recv() => {
                    self.apply(event);
                }
            }
        }

        self.cancel_token.cancel();
        debug!("Calibration controller stopped");
    }

    fn apply(&mut self, event: Event) {
        let effects = self.machine.handle(event, Instant::now());
        for effect in effects {
            self.execute(effect);
        }
        self.snapshot_tx.send_replace(self.machine.snapshot());
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Dispatch { attempt, request } => self.start_dispatch(attempt, request),
            Effect::StartPolling {
                attempt,
                command_id,
                submitted_at,
            } => self.start_polling(attempt, command_id, submitted_at),
            Effect::StopTimers => {
                self.cancel_token.cancel();
            }
            Effect::Finished(outcome) => self.finished(outcome),
            Effect::Notify(event) => self.notify(event),
        }
    }

    fn notify(&self, event: CalibrationEvent) {
        if let CalibrationEvent::PollMissed { command_id, error } = &event {
            warn!(command_id = %command_id, error = %error, "Status poll failed, will retry");
        }
        self.events.send(event);
    }

    fn start_dispatch(&mut self, attempt: u64, request: DispatchRequest) {
        // Fresh scope for the new request.
        self.cancel_token.cancel();
        self.cancel_token = CancellationToken::new();

        info!(
            attempt,
            node_id = %request.node_id,
            command = %request.command,
            "Dispatching calibration command"
        );
        self.events.send(CalibrationEvent::Dispatched {
            attempt,
            node_id: request.node_id.clone(),
            command: request.command.clone(),
        });

        let api = Arc::clone(&self.api);
        let tx = self.result_tx.clone();
        let token = self.cancel_token.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                result = api.dispatch(&request) => result,
            };
            let event = match result {
                Ok(record) => Event::DispatchAccepted {
                    attempt,
                    command_id: record.id,
                },
                Err(e) => Event::DispatchRejected {
                    attempt,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }

    fn start_polling(&mut self, attempt: u64, command_id: String, submitted_at: Instant) {
        let config = *self.machine.config();
        info!(attempt, command_id = %command_id, "Command accepted, polling status");
        self.events.send(CalibrationEvent::Accepted {
            attempt,
            command_id: command_id.clone(),
        });

        tokio::spawn(poll_loop(
            Arc::clone(&self.api),
            command_id,
            config.poll_interval,
            self.result_tx.clone(),
            self.cancel_token.clone(),
        ));
        tokio::spawn(timeout_ticker(
            attempt,
            submitted_at,
            config.tick_interval,
            self.result_tx.clone(),
            self.cancel_token.clone(),
        ));
    }

    fn finished(&mut self, outcome: CalibrationOutcome) {
        match &outcome {
            CalibrationOutcome::Succeeded => info!("Calibration succeeded"),
            CalibrationOutcome::Failed(reason) => warn!(reason = %reason, "Calibration failed"),
        }
        self.events.send(CalibrationEvent::Finished { outcome });
    }
}

fn intent_event(intent: Intent) -> Event {
    match intent {
        Intent::Open(target) => Event::Open(target),
        Intent::Select(kind) => Event::Select(kind),
        Intent::Confirm => Event::Confirm,
        Intent::Close | Intent::Shutdown => Event::Close,
        Intent::Retry => Event::Retry,
    }
}

/// Query the status endpoint until a terminal status or cancellation.
///
/// The first poll runs immediately. A poll only starts after the previous
/// one returned.
async fn poll_loop(
    api: Arc<dyn CommandApi>,
    command_id: String,
    poll_interval: Duration,
    tx: mpsc::UnboundedSender<Event>,
    token: CancellationToken,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = api.command_status(&command_id) => result,
        };

        let event = match result {
            Ok(record) => {
                let status = record.map_or(CommandStatus::Pending, |r| r.status());
                debug!(command_id = %command_id, %status, "Status polled");
                Event::StatusObserved {
                    command_id: command_id.clone(),
                    status,
                }
            }
            Err(e) => Event::PollMissed {
                command_id: command_id.clone(),
                error: e.to_string(),
            },
        };
        let terminal = matches!(&event, Event::StatusObserved { status, .. } if status.is_terminal());

        if tx.send(event).is_err() || terminal {
            break;
        }
    }
}

/// Emit a timeout check every `tick_interval` until cancelled.
async fn timeout_ticker(
    attempt: u64,
    submitted_at: Instant,
    tick_interval: Duration,
    tx: mpsc::UnboundedSender<Event>,
    token: CancellationToken,
) {
    let start = submitted_at + tick_interval;
    let mut ticker = interval_at(start.max(Instant::now()), tick_interval);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if tx.send(Event::Tick { attempt }).is_err() {
                    break;
                }
            }
        }
    }
}

/// Cloneable handle to a running [`CalibrationController`].
///
/// Each intent returns once the controller has applied it, so the next
/// [`snapshot`](Self::snapshot) already reflects it. Later progress is
/// observed through [`subscribe`](Self::subscribe), [`events`](Self::events)
/// or [`wait_for_outcome`](Self::wait_for_outcome).
#[derive(Debug, Clone)]
pub struct CalibrationHandle {
    intent_tx: mpsc::Sender<(Intent, oneshot::Sender<()>)>,
    snapshot_rx: watch::Receiver<CalibrationSnapshot>,
    events: EventDispatcher,
}

impl CalibrationHandle {
    async fn send(&self, intent: Intent) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.intent_tx
            .send((intent, ack_tx))
            .await
            .map_err(|_| Error::ControllerClosed)?;
        ack_rx.await.map_err(|_| Error::ControllerClosed)
    }

    /// Open the workflow for a node.
    pub async fn open(&self, target: NodeTarget) -> Result<()> {
        self.send(Intent::Open(target)).await
    }

    /// Choose the sensor to calibrate.
    pub async fn select(&self, kind: SensorKind) -> Result<()> {
        self.send(Intent::Select(kind)).await
    }

    /// Submit the current selection.
    pub async fn confirm(&self) -> Result<()> {
        self.send(Intent::Confirm).await
    }

    /// Close the workflow, abandoning any request in flight.
    pub async fn cancel(&self) -> Result<()> {
        self.send(Intent::Close).await
    }

    /// Start over after an outcome.
    pub async fn retry(&self) -> Result<()> {
        self.send(Intent::Retry).await
    }

    /// Current state.
    pub fn snapshot(&self) -> CalibrationSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that is notified on every state update.
    pub fn subscribe(&self) -> watch::Receiver<CalibrationSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Receiver for calibration events.
    pub fn events(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Wait until the active request has an outcome.
    ///
    /// Returns [`Error::Cancelled`] if the workflow is closed first and
    /// [`Error::ControllerClosed`] if the controller stops.
    pub async fn wait_for_outcome(&self) -> Result<CalibrationOutcome> {
        let mut rx = self.snapshot_rx.clone();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if let Some(outcome) = &snapshot.outcome {
                    return Ok(outcome.clone());
                }
                if snapshot.state == CalibrationState::Idle {
                    return Err(Error::Cancelled);
                }
            }
            rx.changed().await.map_err(|_| Error::ControllerClosed)?;
        }
    }

    /// Wait until the workflow reaches `state`.
    pub async fn wait_for_state(&self, state: CalibrationState) -> Result<CalibrationSnapshot> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|s| s.state == state)
            .await
            .map_err(|_| Error::ControllerClosed)?;
        Ok(snapshot.clone())
    }

    /// Stop the controller and wait for it to exit.
    pub async fn shutdown(&self) -> Result<()> {
        // Already gone counts as shut down.
        let (ack_tx, _) = oneshot::channel();
        if self.intent_tx.send((Intent::Shutdown, ack_tx)).await.is_err() {
            return Ok(());
        }
        let mut rx = self.snapshot_rx.clone();
        while rx.changed().await.is_ok() {}
        Ok(())
    }
}

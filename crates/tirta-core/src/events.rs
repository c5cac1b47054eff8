//! Calibration event system.
//!
//! The controller publishes a [`CalibrationEvent`] for every observable step
//! of a request. The presentation layer decides how to surface them (spinner
//! text, toasts, log lines); nothing here renders anything.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use tirta_types::{CommandStatus, SensorKind};

use crate::calibration::{CalibrationOutcome, CalibrationState};

/// Events emitted by the calibration controller.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum CalibrationEvent {
    /// The workflow moved between states.
    StateChanged {
        from: CalibrationState,
        to: CalibrationState,
    },
    /// A sensor was selected.
    SensorSelected { sensor: SensorKind },
    /// The dispatch request was sent.
    Dispatched {
        attempt: u64,
        node_id: String,
        command: String,
    },
    /// The backend accepted the command.
    Accepted { attempt: u64, command_id: String },
    /// A status poll returned.
    StatusPolled {
        command_id: String,
        status: CommandStatus,
    },
    /// A status poll failed; polling continues.
    PollMissed { command_id: String, error: String },
    /// The request reached an outcome.
    Finished { outcome: CalibrationOutcome },
}

/// Sender for calibration events.
pub type EventSender = broadcast::Sender<CalibrationEvent>;

/// Receiver for calibration events.
pub type EventReceiver = broadcast::Receiver<CalibrationEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: CalibrationEvent) {
        // no receivers is fine
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::FailureReason;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dispatcher_fan_out() {
        let dispatcher = EventDispatcher::default();
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();
        assert_eq!(dispatcher.receiver_count(), 2);

        let event = CalibrationEvent::Accepted {
            attempt: 1,
            command_id: "c".into(),
        };
        dispatcher.send(event.clone());
        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[test]
    fn test_send_without_receivers() {
        let dispatcher = EventDispatcher::new(4);
        dispatcher.send(CalibrationEvent::SensorSelected {
            sensor: SensorKind::Ph,
        });
        assert_eq!(dispatcher.receiver_count(), 0);
    }

    #[test]
    fn test_event_serialization() {
        let event = CalibrationEvent::Finished {
            outcome: CalibrationOutcome::Failed(FailureReason::Timeout {
                after: Duration::from_secs(60),
            }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "finished");
        assert_eq!(json["outcome"]["failed"]["timeout"]["after"]["secs"], 60);

        let event = CalibrationEvent::StatusPolled {
            command_id: "7".into(),
            status: CommandStatus::Pending,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"status_polled","command_id":"7","status":"pending"}"#);
    }
}

//! Turns driver heartbeats into connection-level events.

use mongodb::event::sdam::SdamEvent;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::connection::{DriverEvent, EventSink};

/// Tracks which servers answered their last heartbeat.
///
/// The connection counts as up while at least one server is healthy: the
/// first healthy server reports `Connected`, losing the last one reports
/// `Disconnected`, and a failure while nothing was ever healthy is an `Error`.
#[derive(Debug, Default)]
pub struct HeartbeatTracker {
    healthy: HashSet<String>,
}

impl HeartbeatTracker {
    pub fn succeeded(&mut self, server: &str) -> Option<DriverEvent> {
        let was_down = self.healthy.is_empty();
        self.healthy.insert(server.to_string());
        was_down.then_some(DriverEvent::Connected)
    }

    pub fn failed(&mut self, server: &str, message: String) -> Option<DriverEvent> {
        let was_healthy = self.healthy.remove(server);
        if !self.healthy.is_empty() {
            tracing::debug!(server, %message, "server unreachable, others still healthy");
            return None;
        }
        if was_healthy {
            Some(DriverEvent::Disconnected)
        } else {
            Some(DriverEvent::Error(message))
        }
    }

    pub fn is_up(&self) -> bool {
        !self.healthy.is_empty()
    }
}

/// Callback for `ClientOptions::sdam_event_handler`.
pub fn topology_monitor(events: EventSink) -> impl Fn(SdamEvent) + Send + Sync + 'static {
    let tracker = Mutex::new(HeartbeatTracker::default());

    move |event| {
        let mut tracker = tracker.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = match event {
            SdamEvent::ServerHeartbeatSucceeded(ev) => {
                tracker.succeeded(&ev.server_address.to_string())
            }
            SdamEvent::ServerHeartbeatFailed(ev) => {
                tracker.failed(&ev.server_address.to_string(), ev.failure.to_string())
            }
            _ => None,
        };
        if let Some(outcome) = outcome {
            events.emit(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_healthy_server_connects() {
        let mut tracker = HeartbeatTracker::default();
        assert_eq!(tracker.succeeded("a:1"), Some(DriverEvent::Connected));
        assert_eq!(tracker.succeeded("a:1"), None);
        assert_eq!(tracker.succeeded("b:2"), None);
        assert!(tracker.is_up());
    }

    #[test]
    fn failure_before_any_success_is_an_error() {
        let mut tracker = HeartbeatTracker::default();
        assert_eq!(
            tracker.failed("a:1", "connection refused".into()),
            Some(DriverEvent::Error("connection refused".into()))
        );
        assert!(!tracker.is_up());
    }

    #[test]
    fn losing_the_last_server_disconnects() {
        let mut tracker = HeartbeatTracker::default();
        tracker.succeeded("a:1");
        tracker.succeeded("b:2");

        assert_eq!(tracker.failed("a:1", "timeout".into()), None);
        assert_eq!(tracker.failed("b:2", "timeout".into()), Some(DriverEvent::Disconnected));
        assert_eq!(
            tracker.failed("b:2", "timeout".into()),
            Some(DriverEvent::Error("timeout".into()))
        );
        assert_eq!(tracker.succeeded("a:1"), Some(DriverEvent::Connected));
    }
}

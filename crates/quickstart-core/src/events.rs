use std::time::Duration;

use tokio::sync::mpsc;

/// Participant identifier within a channel. `0` asks the engine to assign one.
pub type Uid = u32;

/// Why a remote participant left the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineReason {
    Quit,
    Dropped,
    BecameAudience,
}

impl OfflineReason {
    pub fn code(self) -> i32 {
        match self {
            OfflineReason::Quit => 0,
            OfflineReason::Dropped => 1,
            OfflineReason::BecameAudience => 2,
        }
    }

    /// Unknown codes are treated as a dropped connection.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => OfflineReason::Quit,
            2 => OfflineReason::BecameAudience,
            _ => OfflineReason::Dropped,
        }
    }
}

/// Notifications emitted by the engine from its own worker context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    JoinSucceeded {
        channel: String,
        uid: Uid,
        elapsed: Duration,
    },
    UserJoined {
        uid: Uid,
        elapsed: Duration,
    },
    UserOffline {
        uid: Uid,
        reason: OfflineReason,
    },
}

/// Sending half handed to the engine as its event callback target.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSender {
    /// Deliver an event. A closed channel means the screen is gone; the event
    /// is dropped.
    pub fn send(&self, event: EngineEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("engine event dropped, receiver closed: {:?}", e.0);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }
}

pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

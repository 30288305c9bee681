use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::events::{EngineEvent, EventReceiver};
use crate::screen::CallScreen;
use crate::ui::UiHandle;

/// Moves engine events onto the UI queue.
///
/// Runs on whatever context the engine delivers on; the screen only ever sees
/// the events from inside a UI task.
pub struct EventAdapter {
    events: EventReceiver,
    ui: UiHandle<CallScreen>,
}

impl EventAdapter {
    pub fn new(events: EventReceiver, ui: UiHandle<CallScreen>) -> Self {
        Self { events, ui }
    }

    /// Forward whatever is already queued without waiting.
    pub fn forward_pending(&mut self) -> usize {
        let mut forwarded = 0;
        while let Some(event) = self.events.try_recv() {
            if !self.forward(event) {
                break;
            }
            forwarded += 1;
        }
        forwarded
    }

    /// Forward until the engine side or the UI queue goes away.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            if !self.forward(event) {
                break;
            }
        }
        tracing::debug!("event adapter stopped");
    }

    pub fn spawn(self, rt: &Handle) -> JoinHandle<()> {
        rt.spawn(self.run())
    }

    fn forward(&self, event: EngineEvent) -> bool {
        tracing::debug!("engine event: {event:?}");
        self.ui.post(move |screen| screen.handle_event(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::events::{self, OfflineReason};
    use crate::lifecycle::LifecycleState;
    use crate::permissions::PERMISSION_REQUEST_CODE;
    use crate::settings::{Credentials, Settings};
    use crate::surfaces::VideoContainer;
    use crate::testing::{FakePermissions, RecordingFactory, RecordingHost};
    use crate::ui::UiQueue;

    fn build() -> (CallScreen, EventReceiver, RecordingFactory, RecordingHost) {
        let factory = RecordingFactory::new();
        let host = RecordingHost::new();
        let (tx, rx) = events::channel();
        let settings = Settings {
            credentials: Credentials {
                app_id: "wss://rtc.example.com".into(),
                channel_name: "demo".into(),
                token: "tok".into(),
            },
            ..Default::default()
        };
        let screen = CallScreen::new(
            settings,
            33,
            Box::new(factory.clone()),
            Box::new(host.clone()),
            tx,
        );
        (screen, rx, factory, host)
    }

    #[test]
    fn events_reach_screen_only_after_ui_drain() {
        let (mut screen, rx, factory, host) = build();
        let mut queue = UiQueue::new();
        let mut adapter = EventAdapter::new(rx, queue.handle());
        screen.on_create(&FakePermissions::all_granted()).unwrap();

        let engine_events = factory.events();
        engine_events.send(EngineEvent::UserJoined { uid: 7, elapsed: Duration::ZERO });
        engine_events.send(EngineEvent::UserOffline { uid: 3, reason: OfflineReason::Quit });

        assert_eq!(adapter.forward_pending(), 2);
        assert!(screen.remote_surface(7).is_none());

        assert_eq!(queue.run_pending(&mut screen), 2);
        assert!(screen.remote_surface(7).is_some());
        assert_eq!(host.notices(), vec!["User offline: 3".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawned_adapter_forwards_from_engine_thread() {
        let (mut screen, rx, factory, host) = build();
        let mut queue = UiQueue::new();
        let adapter = EventAdapter::new(rx, queue.handle()).spawn(&Handle::current());

        let perms = FakePermissions::denied();
        screen.on_create(&perms).unwrap();
        perms.grant_requested();
        screen
            .on_request_permissions_result(PERMISSION_REQUEST_CODE, &perms)
            .unwrap();
        assert_eq!(screen.lifecycle_state(), LifecycleState::Active);

        let engine_events = factory.events();
        std::thread::spawn(move || {
            engine_events.send(EngineEvent::JoinSucceeded {
                channel: "demo".into(),
                uid: 11,
                elapsed: Duration::from_millis(40),
            });
            engine_events.send(EngineEvent::UserJoined { uid: 7, elapsed: Duration::ZERO });
        })
        .join()
        .unwrap();

        let mut ran = 0;
        for _ in 0..100 {
            ran += queue.run_pending(&mut screen);
            if ran == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ran, 2);
        assert_eq!(host.surfaces_in(VideoContainer::Remote).len(), 1);

        // The adapter stops once every event sender is gone.
        screen.on_destroy();
        drop(screen);
        drop(factory);
        adapter.await.unwrap();
    }
}

use std::time::Duration;

use crate::channel::ChannelJoin;
use crate::engine::{EngineConfig, EngineFactory};
use crate::errors::QuickstartError;
use crate::events::{EngineEvent, EventSender, OfflineReason, Uid};
use crate::lifecycle::{EngineLifecycle, LifecycleState};
use crate::media::{LocalVideo, RemoteVideoBinder};
use crate::permissions::{PermissionGate, PermissionHost, PERMISSION_REQUEST_CODE};
use crate::settings::Settings;
use crate::surfaces::{SurfaceAllocator, SurfaceHost, SurfaceId};

pub const JOIN_SUCCESS_NOTICE: &str = "Join channel success";

/// Single-screen call controller.
///
/// Owned by the UI thread. Drives the forward path
/// (permissions → engine → preview → join), reacts to engine events posted
/// through the UI queue, and tears everything down on destroy.
pub struct CallScreen {
    settings: Settings,
    gate: PermissionGate,
    lifecycle: EngineLifecycle,
    factory: Box<dyn EngineFactory>,
    events: EventSender,
    host: Box<dyn SurfaceHost>,
    surfaces: SurfaceAllocator,
    local: LocalVideo,
    remotes: RemoteVideoBinder,
}

impl CallScreen {
    pub fn new(
        settings: Settings,
        sdk_int: u32,
        factory: Box<dyn EngineFactory>,
        host: Box<dyn SurfaceHost>,
        events: EventSender,
    ) -> Self {
        Self {
            settings,
            gate: PermissionGate::new(sdk_int),
            lifecycle: EngineLifecycle::new(),
            factory,
            events,
            host,
            surfaces: SurfaceAllocator::new(),
            local: LocalVideo::new(),
            remotes: RemoteVideoBinder::new(),
        }
    }

    /// Screen start: proceed if permitted, otherwise prompt.
    pub fn on_create(&mut self, permissions: &dyn PermissionHost) -> Result<(), QuickstartError> {
        if self.gate.check(permissions) {
            self.initialize_and_join()
        } else {
            self.gate.request(permissions);
            Ok(())
        }
    }

    /// Answer from the OS prompt.
    ///
    /// Grants that arrive once the engine exists (or after the screen was
    /// destroyed) are ignored.
    pub fn on_request_permissions_result(
        &mut self,
        request_code: i32,
        permissions: &dyn PermissionHost,
    ) -> Result<(), QuickstartError> {
        if request_code != PERMISSION_REQUEST_CODE {
            tracing::debug!(request_code, "ignoring foreign permission result");
            return Ok(());
        }
        if !self.gate.check(permissions) {
            let missing = self.gate.missing(permissions);
            tracing::warn!("permissions denied: {missing:?}");
            return Ok(());
        }
        if self.lifecycle.state() != LifecycleState::Uninitialized {
            tracing::debug!(state = ?self.lifecycle.state(), "permission grant after init, ignored");
            return Ok(());
        }
        self.initialize_and_join()
    }

    /// Create the engine, start the local preview and join the channel.
    ///
    /// An error here is terminal for the screen.
    pub fn initialize_and_join(&mut self) -> Result<(), QuickstartError> {
        let credentials = self.settings.credentials.clone();
        credentials.validate()?;

        self.lifecycle.initialize(
            self.factory.as_ref(),
            EngineConfig {
                app_id: credentials.app_id.clone(),
                events: self.events.clone(),
            },
        )?;

        let media = &self.settings.media;
        let engine = self.lifecycle.engine()?;
        self.local
            .setup(&self.surfaces, self.host.as_mut(), engine, media.render_mode)?;

        ChannelJoin::new(credentials, media.channel_options()).join(engine)
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::JoinSucceeded { channel, uid, elapsed } => {
                self.on_join_succeeded(&channel, uid, elapsed)
            }
            EngineEvent::UserJoined { uid, elapsed } => self.on_user_joined(uid, elapsed),
            EngineEvent::UserOffline { uid, reason } => self.on_user_offline(uid, reason),
        }
    }

    pub fn on_join_succeeded(&mut self, channel: &str, uid: Uid, elapsed: Duration) {
        tracing::info!(channel, uid, elapsed_ms = elapsed.as_millis() as u64, "joined channel");
        self.host.show_notice(JOIN_SUCCESS_NOTICE);
    }

    pub fn on_user_joined(&mut self, uid: Uid, elapsed: Duration) {
        tracing::info!(uid, elapsed_ms = elapsed.as_millis() as u64, "remote user joined");
        let engine = match self.lifecycle.engine() {
            Ok(engine) => engine,
            Err(e) => {
                tracing::debug!(uid, "user joined ignored: {e}");
                return;
            }
        };
        if let Err(e) = self.remotes.bind(
            uid,
            &self.surfaces,
            self.host.as_mut(),
            engine,
            self.settings.media.render_mode,
        ) {
            tracing::warn!(uid, "failed to bind remote video: {e}");
        }
    }

    pub fn on_user_offline(&mut self, uid: Uid, reason: OfflineReason) {
        tracing::info!(uid, ?reason, "remote user offline");
        self.host.show_notice(&format!("User offline: {uid}"));
        self.remotes
            .release(uid, self.host.as_mut(), self.lifecycle.engine().ok());
    }

    /// Stop preview, leave, destroy the engine, then drop every surface.
    pub fn on_destroy(&mut self) {
        self.lifecycle.teardown();
        self.local.release(self.host.as_mut());
        self.remotes.release_all(self.host.as_mut());
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn local_surface(&self) -> Option<SurfaceId> {
        self.local.surface()
    }

    pub fn remote_surface(&self, uid: Uid) -> Option<SurfaceId> {
        self.remotes.surface_for(uid)
    }

    pub fn remote_uids(&self) -> Vec<Uid> {
        self.remotes.uids()
    }
}

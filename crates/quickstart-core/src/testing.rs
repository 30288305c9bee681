//! Recording doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::engine::{ChannelMediaOptions, EngineConfig, EngineFactory, RtcEngine, VideoCanvas};
use crate::errors::QuickstartError;
use crate::events::{EventSender, Uid};
use crate::permissions::{Permission, PermissionHost};
use crate::surfaces::{SurfaceHost, SurfaceId, VideoContainer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    EnableVideo,
    SetupLocalVideo(VideoCanvas),
    StartPreview,
    JoinChannel {
        token: String,
        channel: String,
        uid: Uid,
        options: ChannelMediaOptions,
    },
    SetupRemoteVideo(VideoCanvas),
    RemoveRemoteVideo(Uid),
    StopPreview,
    LeaveChannel,
    Destroy,
}

#[derive(Default)]
struct FactoryState {
    calls: Vec<EngineCall>,
    created: usize,
    events: Option<EventSender>,
    app_id: Option<String>,
    fail_create: Option<String>,
    fail_leave: bool,
    fail_next_setup_remote: bool,
    fail_start_preview: bool,
}

#[derive(Clone, Default)]
pub struct RecordingFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(msg: &str) -> Self {
        let f = Self::default();
        f.state.lock().unwrap().fail_create = Some(msg.to_string());
        f
    }

    pub fn fail_leave(&self) {
        self.state.lock().unwrap().fail_leave = true;
    }

    /// The next `setup_remote_video` is rejected; later ones succeed.
    pub fn fail_next_setup_remote(&self) {
        self.state.lock().unwrap().fail_next_setup_remote = true;
    }

    pub fn fail_start_preview(&self) {
        self.state.lock().unwrap().fail_start_preview = true;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn app_id(&self) -> Option<String> {
        self.state.lock().unwrap().app_id.clone()
    }

    /// The event target handed to the most recently created engine.
    pub fn events(&self) -> EventSender {
        self.state
            .lock()
            .unwrap()
            .events
            .clone()
            .expect("no engine created")
    }
}

impl EngineFactory for RecordingFactory {
    fn create(&self, config: EngineConfig) -> Result<Box<dyn RtcEngine>, QuickstartError> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.fail_create {
            return Err(QuickstartError::EngineCreation(msg.clone()));
        }
        state.created += 1;
        state.app_id = Some(config.app_id);
        state.events = Some(config.events);
        Ok(Box::new(RecordingEngine {
            state: self.state.clone(),
        }))
    }
}

pub struct RecordingEngine {
    state: Arc<Mutex<FactoryState>>,
}

impl RecordingEngine {
    fn record(&self, call: EngineCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl RtcEngine for RecordingEngine {
    fn enable_video(&mut self) -> Result<(), QuickstartError> {
        self.record(EngineCall::EnableVideo);
        Ok(())
    }

    fn setup_local_video(&mut self, canvas: VideoCanvas) -> Result<(), QuickstartError> {
        self.record(EngineCall::SetupLocalVideo(canvas));
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), QuickstartError> {
        self.record(EngineCall::StartPreview);
        if self.state.lock().unwrap().fail_start_preview {
            return Err(QuickstartError::Engine("camera unavailable".into()));
        }
        Ok(())
    }

    fn join_channel(
        &mut self,
        token: &str,
        channel: &str,
        uid: Uid,
        options: &ChannelMediaOptions,
    ) -> Result<(), QuickstartError> {
        self.record(EngineCall::JoinChannel {
            token: token.to_string(),
            channel: channel.to_string(),
            uid,
            options: options.clone(),
        });
        Ok(())
    }

    fn setup_remote_video(&mut self, canvas: VideoCanvas) -> Result<(), QuickstartError> {
        self.record(EngineCall::SetupRemoteVideo(canvas));
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_setup_remote) {
            return Err(QuickstartError::Engine("busy".into()));
        }
        Ok(())
    }

    fn remove_remote_video(&mut self, uid: Uid) -> Result<(), QuickstartError> {
        self.record(EngineCall::RemoveRemoteVideo(uid));
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), QuickstartError> {
        self.record(EngineCall::StopPreview);
        Ok(())
    }

    fn leave_channel(&mut self) -> Result<(), QuickstartError> {
        self.record(EngineCall::LeaveChannel);
        if self.state.lock().unwrap().fail_leave {
            return Err(QuickstartError::Engine("not in channel".into()));
        }
        Ok(())
    }

    fn destroy(self: Box<Self>) {
        self.record(EngineCall::Destroy);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Create(SurfaceId),
    Add(VideoContainer, SurfaceId),
    Remove(VideoContainer, SurfaceId),
    Overlay(SurfaceId, bool),
    Notice(String),
}

#[derive(Clone, Default)]
pub struct RecordingHost {
    calls: Arc<Mutex<Vec<HostCall>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Notice(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    /// Surfaces currently inside `container`, in insertion order.
    pub fn surfaces_in(&self, container: VideoContainer) -> Vec<SurfaceId> {
        let mut current = Vec::new();
        for call in self.calls() {
            match call {
                HostCall::Add(c, id) if c == container => current.push(id),
                HostCall::Remove(c, id) if c == container => current.retain(|s| *s != id),
                _ => {}
            }
        }
        current
    }

    pub fn is_overlay(&self, surface: SurfaceId) -> bool {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|c| match c {
                HostCall::Overlay(id, overlay) if id == surface => Some(overlay),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl SurfaceHost for RecordingHost {
    fn create_surface(&mut self, surface: SurfaceId) {
        self.calls.lock().unwrap().push(HostCall::Create(surface));
    }

    fn add_to_container(&mut self, container: VideoContainer, surface: SurfaceId) {
        self.calls.lock().unwrap().push(HostCall::Add(container, surface));
    }

    fn remove_from_container(&mut self, container: VideoContainer, surface: SurfaceId) {
        self.calls.lock().unwrap().push(HostCall::Remove(container, surface));
    }

    fn set_media_overlay(&mut self, surface: SurfaceId, overlay: bool) {
        self.calls.lock().unwrap().push(HostCall::Overlay(surface, overlay));
    }

    fn show_notice(&mut self, message: &str) {
        self.calls.lock().unwrap().push(HostCall::Notice(message.to_string()));
    }
}

#[derive(Default)]
pub struct FakePermissions {
    granted: Mutex<HashSet<Permission>>,
    requests: Mutex<Vec<(Vec<Permission>, i32)>>,
}

impl FakePermissions {
    pub fn denied() -> Self {
        Self::default()
    }

    pub fn granting(perms: &[Permission]) -> Self {
        let f = Self::default();
        f.granted.lock().unwrap().extend(perms.iter().copied());
        f
    }

    pub fn all_granted() -> Self {
        Self::granting(&[
            Permission::RecordAudio,
            Permission::Camera,
            Permission::ReadPhoneState,
            Permission::BluetoothConnect,
        ])
    }

    /// Simulates the user accepting every pending prompt.
    pub fn grant_requested(&self) {
        let requested: Vec<Permission> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(perms, _)| perms.clone())
            .collect();
        self.granted.lock().unwrap().extend(requested);
    }

    pub fn requests(&self) -> Vec<(Vec<Permission>, i32)> {
        self.requests.lock().unwrap().clone()
    }
}

impl PermissionHost for FakePermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        self.granted.lock().unwrap().contains(&permission)
    }

    fn request(&self, permissions: &[Permission], request_code: i32) {
        self.requests
            .lock()
            .unwrap()
            .push((permissions.to_vec(), request_code));
    }
}

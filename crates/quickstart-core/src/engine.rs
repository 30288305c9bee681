//! Seam to the external real-time engine.
//!
//! The engine owns capture, encoding, transport and decoding. This crate only
//! drives it through [`RtcEngine`] and listens to the events it sends on the
//! [`EventSender`] passed in [`EngineConfig`].

use serde::{Deserialize, Serialize};

use crate::errors::QuickstartError;
use crate::events::{EventSender, Uid};
use crate::surfaces::SurfaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Fill the surface, cropping overflow.
    Hidden,
    /// Letterbox to show the whole frame.
    #[default]
    Fit,
    Adaptive,
}

impl RenderMode {
    pub fn code(self) -> i32 {
        match self {
            RenderMode::Hidden => 1,
            RenderMode::Fit => 2,
            RenderMode::Adaptive => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    Broadcaster,
    Audience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelProfile {
    Communication,
    LiveBroadcasting,
}

/// Binds a surface to a video stream. `uid == 0` is the local stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCanvas {
    pub surface: SurfaceId,
    pub render_mode: RenderMode,
    pub uid: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMediaOptions {
    pub client_role: ClientRole,
    pub channel_profile: ChannelProfile,
    pub publish_microphone_track: bool,
    pub publish_camera_track: bool,
    pub auto_subscribe_audio: bool,
    pub auto_subscribe_video: bool,
}

impl Default for ChannelMediaOptions {
    fn default() -> Self {
        Self {
            client_role: ClientRole::Broadcaster,
            channel_profile: ChannelProfile::LiveBroadcasting,
            publish_microphone_track: true,
            publish_camera_track: true,
            auto_subscribe_audio: true,
            auto_subscribe_video: true,
        }
    }
}

pub struct EngineConfig {
    pub app_id: String,
    pub events: EventSender,
}

/// Operations the screen drives on the engine.
///
/// Errors are synchronous rejections only. Whether a join worked is reported
/// later as an [`EngineEvent`](crate::events::EngineEvent).
pub trait RtcEngine: Send {
    fn enable_video(&mut self) -> Result<(), QuickstartError>;
    fn setup_local_video(&mut self, canvas: VideoCanvas) -> Result<(), QuickstartError>;
    fn start_preview(&mut self) -> Result<(), QuickstartError>;
    fn join_channel(
        &mut self,
        token: &str,
        channel: &str,
        uid: Uid,
        options: &ChannelMediaOptions,
    ) -> Result<(), QuickstartError>;
    fn setup_remote_video(&mut self, canvas: VideoCanvas) -> Result<(), QuickstartError>;
    fn remove_remote_video(&mut self, uid: Uid) -> Result<(), QuickstartError>;
    fn stop_preview(&mut self) -> Result<(), QuickstartError>;
    fn leave_channel(&mut self) -> Result<(), QuickstartError>;
    fn destroy(self: Box<Self>);
}

pub trait EngineFactory: Send {
    fn create(&self, config: EngineConfig) -> Result<Box<dyn RtcEngine>, QuickstartError>;
}

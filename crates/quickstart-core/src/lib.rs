//! Real-time video quickstart core logic.
//!
//! Drives a one-screen video call: permission gating, engine lifecycle,
//! local preview, channel join and remote video binding. The engine and the
//! host UI are reached through traits so the crate stays platform-free.
//! Consumed by native shells via UniFFI bindings.

pub mod adapter;
pub mod audio;
pub mod channel;
pub mod engine;
pub mod errors;
pub mod events;
pub mod lifecycle;
#[cfg(feature = "livekit")]
pub mod livekit_engine;
pub mod media;
pub mod participants;
pub mod permissions;
pub mod screen;
pub mod settings;
pub mod surfaces;
pub mod ui;
pub mod video;

#[cfg(test)]
mod testing;

pub use adapter::EventAdapter;
pub use audio::PlayoutBuffer;
pub use engine::{
    ChannelMediaOptions, ChannelProfile, ClientRole, EngineConfig, EngineFactory, RenderMode,
    RtcEngine, VideoCanvas,
};
pub use errors::QuickstartError;
pub use events::{EngineEvent, EventReceiver, EventSender, OfflineReason, Uid};
pub use lifecycle::{EngineLifecycle, LifecycleState};
pub use permissions::{Permission, PermissionHost, PERMISSION_REQUEST_CODE};
pub use screen::CallScreen;
pub use settings::{Credentials, MediaSettings, Settings, SettingsStore};
pub use surfaces::{SurfaceHost, SurfaceId, VideoContainer};
pub use ui::{UiHandle, UiQueue};
pub use video::{FrameRenderer, I420Frame};

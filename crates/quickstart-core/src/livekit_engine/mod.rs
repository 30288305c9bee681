//! [`RtcEngine`] backed by a LiveKit room.
//!
//! `app_id` is the LiveKit server URL and the join token is a LiveKit access
//! token. Channel names are informational: the room is whatever the token
//! grants. Participant identities are mapped to numeric uids by a
//! [`UidRegistry`].
//!
//! Enabled with the `livekit` feature.

mod capture;
mod render;
mod token;

pub use capture::CaptureFeed;
pub use token::{DEV_TOKEN_TTL, mint_dev_token};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::StreamExt;
use livekit::options::TrackPublishOptions;
use livekit::prelude::*;
use livekit::track::{RemoteTrack, TrackSource as LkTrackSource};
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use livekit::webrtc::prelude::{AudioSourceOptions, RtcAudioSource, RtcVideoSource, VideoResolution};
use livekit::webrtc::video_source::native::NativeVideoSource;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

use crate::audio::{PLAYOUT_CHANNELS, PLAYOUT_SAMPLE_RATE, PlayoutBuffer};
use crate::engine::{
    ChannelMediaOptions, ClientRole, EngineConfig, EngineFactory, RtcEngine, VideoCanvas,
};
use crate::errors::QuickstartError;
use crate::events::{EngineEvent, EventSender, OfflineReason, Uid};
use crate::participants::UidRegistry;
use crate::video::FrameRenderer;
use render::RenderTask;

const CAMERA_WIDTH: u32 = 1280;
const CAMERA_HEIGHT: u32 = 720;

/// Creates [`LiveKitEngine`]s on a shared runtime.
///
/// The capture feed and playout buffer outlive individual engines so the
/// host can keep one handle to each.
pub struct LiveKitEngineFactory {
    rt: Handle,
    renderer: Arc<dyn FrameRenderer>,
    capture: Arc<CaptureFeed>,
    playout: Arc<PlayoutBuffer>,
}

impl LiveKitEngineFactory {
    pub fn new(rt: Handle, renderer: Arc<dyn FrameRenderer>) -> Self {
        let capture = Arc::new(CaptureFeed::new(renderer.clone()));
        Self {
            rt,
            renderer,
            capture,
            playout: Arc::new(PlayoutBuffer::new()),
        }
    }

    pub fn capture(&self) -> Arc<CaptureFeed> {
        self.capture.clone()
    }

    pub fn playout(&self) -> Arc<PlayoutBuffer> {
        self.playout.clone()
    }
}

impl EngineFactory for LiveKitEngineFactory {
    fn create(&self, config: EngineConfig) -> Result<Box<dyn RtcEngine>, QuickstartError> {
        let server_url = parse_server_url(&config.app_id)?;
        tracing::info!("creating LiveKit engine for {server_url}");
        Ok(Box::new(LiveKitEngine {
            server_url: server_url.to_string(),
            events: config.events,
            rt: self.rt.clone(),
            renderer: self.renderer.clone(),
            capture: self.capture.clone(),
            playout: self.playout.clone(),
            shared: Arc::new(Shared::default()),
            video_enabled: false,
            session: None,
        }))
    }
}

fn parse_server_url(app_id: &str) -> Result<Url, QuickstartError> {
    let url = Url::parse(app_id)
        .map_err(|e| QuickstartError::EngineCreation(format!("invalid server URL {app_id:?}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" | "http" | "https" => Ok(url),
        other => Err(QuickstartError::EngineCreation(format!(
            "unsupported server URL scheme: {other}"
        ))),
    }
}

#[derive(Default)]
struct SessionState {
    uids: UidRegistry,
    canvases: HashMap<Uid, VideoCanvas>,
    video_tracks: HashMap<Uid, RemoteVideoTrack>,
    renderers: HashMap<Uid, RenderTask>,
    audio_tasks: HashMap<String, JoinHandle<()>>,
}

impl SessionState {
    /// Start a frame loop once both the canvas and the track for `uid` exist.
    fn start_rendering(&mut self, uid: Uid, rt: &Handle, renderer: &Arc<dyn FrameRenderer>) {
        if self.renderers.contains_key(&uid) {
            return;
        }
        let (Some(canvas), Some(track)) = (self.canvases.get(&uid), self.video_tracks.get(&uid))
        else {
            return;
        };
        let task = RenderTask::spawn(rt, uid, *canvas, track.clone(), renderer.clone());
        self.renderers.insert(uid, task);
    }

    fn stop_rendering(&mut self, uid: Uid) {
        if let Some(task) = self.renderers.remove(&uid) {
            task.stop();
        }
    }

    fn drop_participant(&mut self, uid: Uid) {
        self.stop_rendering(uid);
        self.video_tracks.remove(&uid);
    }

    /// Drop everything tied to the room. Canvases survive so a rejoin
    /// renders into the same surfaces.
    fn reset(&mut self) {
        for (_, task) in self.renderers.drain() {
            task.stop();
        }
        for (sid, handle) in self.audio_tasks.drain() {
            handle.abort();
            tracing::debug!("audio playout aborted for track {sid}");
        }
        self.video_tracks.clear();
        self.uids.clear();
    }

    /// Reset after the room went away on its own. Returns the remote uids
    /// that were still present, which the host has to hear about.
    fn close(&mut self, local_uid: Uid) -> Vec<Uid> {
        let remote = self
            .uids
            .uids()
            .into_iter()
            .filter(|uid| *uid != local_uid)
            .collect();
        self.reset();
        remote
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<SessionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Session {
    task: JoinHandle<()>,
    room: Arc<tokio::sync::Mutex<Option<Arc<Room>>>>,
}

pub struct LiveKitEngine {
    server_url: String,
    events: EventSender,
    rt: Handle,
    renderer: Arc<dyn FrameRenderer>,
    capture: Arc<CaptureFeed>,
    playout: Arc<PlayoutBuffer>,
    shared: Arc<Shared>,
    video_enabled: bool,
    session: Option<Session>,
}

impl LiveKitEngine {
    /// A session whose task has finished (connect failure, server
    /// disconnect) no longer blocks a new join.
    fn session_in_progress(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }
}

impl RtcEngine for LiveKitEngine {
    fn enable_video(&mut self) -> Result<(), QuickstartError> {
        self.video_enabled = true;
        Ok(())
    }

    fn setup_local_video(&mut self, canvas: VideoCanvas) -> Result<(), QuickstartError> {
        if canvas.uid != 0 {
            return Err(QuickstartError::Engine(format!(
                "local canvas must use uid 0, got {}",
                canvas.uid
            )));
        }
        self.capture.set_local_canvas(Some(canvas));
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), QuickstartError> {
        if !self.video_enabled {
            return Err(QuickstartError::Engine("video is not enabled".into()));
        }
        self.capture.set_preview(true);
        Ok(())
    }

    fn join_channel(
        &mut self,
        token: &str,
        channel: &str,
        uid: Uid,
        options: &ChannelMediaOptions,
    ) -> Result<(), QuickstartError> {
        if self.session_in_progress() {
            return Err(QuickstartError::Engine("already in a channel".into()));
        }
        if token.is_empty() {
            return Err(QuickstartError::Engine("empty token".into()));
        }
        if uid != 0 {
            tracing::debug!(uid, "requested uid ignored, identity comes from the token");
        }

        let ctx = SessionContext {
            url: self.server_url.clone(),
            token: token.to_string(),
            channel: channel.to_string(),
            options: options.clone(),
            video_enabled: self.video_enabled,
            started: Instant::now(),
            events: self.events.clone(),
            rt: self.rt.clone(),
            renderer: self.renderer.clone(),
            capture: self.capture.clone(),
            playout: self.playout.clone(),
            shared: self.shared.clone(),
            room: Arc::new(tokio::sync::Mutex::new(None)),
        };
        let room = ctx.room.clone();
        let task = self.rt.spawn(run_session(ctx));
        self.session = Some(Session { task, room });
        Ok(())
    }

    fn setup_remote_video(&mut self, canvas: VideoCanvas) -> Result<(), QuickstartError> {
        if canvas.uid == 0 {
            return Err(QuickstartError::Engine("remote canvas needs a remote uid".into()));
        }
        let mut state = self.shared.lock();
        state.stop_rendering(canvas.uid);
        state.canvases.insert(canvas.uid, canvas);
        if self.video_enabled {
            state.start_rendering(canvas.uid, &self.rt, &self.renderer);
        }
        Ok(())
    }

    fn remove_remote_video(&mut self, uid: Uid) -> Result<(), QuickstartError> {
        let mut state = self.shared.lock();
        state.stop_rendering(uid);
        state.canvases.remove(&uid);
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), QuickstartError> {
        self.capture.set_preview(false);
        Ok(())
    }

    fn leave_channel(&mut self) -> Result<(), QuickstartError> {
        let Some(session) = self.session.take() else {
            tracing::debug!("leave_channel without an active session");
            return Ok(());
        };
        session.task.abort();
        self.shared.lock().reset();
        self.capture.set_camera(None);
        self.capture.set_microphone(None);
        self.playout.clear();

        let room = session.room;
        self.rt.spawn(async move {
            if let Some(room) = room.lock().await.take() {
                if let Err(e) = room.close().await {
                    tracing::warn!("error closing room: {e}");
                }
            }
        });
        tracing::info!("left channel");
        Ok(())
    }

    fn destroy(mut self: Box<Self>) {
        if self.session.is_some() {
            let _ = self.leave_channel();
        }
        {
            let mut state = self.shared.lock();
            state.reset();
            state.canvases.clear();
        }
        self.capture.reset();
        tracing::info!("LiveKit engine destroyed");
    }
}

#[derive(Clone)]
struct SessionContext {
    url: String,
    token: String,
    channel: String,
    options: ChannelMediaOptions,
    video_enabled: bool,
    started: Instant,
    events: EventSender,
    rt: Handle,
    renderer: Arc<dyn FrameRenderer>,
    capture: Arc<CaptureFeed>,
    playout: Arc<PlayoutBuffer>,
    shared: Arc<Shared>,
    room: Arc<tokio::sync::Mutex<Option<Arc<Room>>>>,
}

async fn run_session(ctx: SessionContext) {
    let mut room_options = RoomOptions::default();
    room_options.auto_subscribe = ctx.options.auto_subscribe_audio || ctx.options.auto_subscribe_video;

    tracing::info!(channel = %ctx.channel, "connecting to {}", ctx.url);
    let (room, mut room_events) = match Room::connect(&ctx.url, &ctx.token, room_options).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::error!(channel = %ctx.channel, "failed to join channel: {e}");
            return;
        }
    };
    let room = Arc::new(room);
    *ctx.room.lock().await = Some(room.clone());

    let local_identity = room.local_participant().identity().to_string();
    let (local_uid, existing) = {
        let mut state = ctx.shared.lock();
        let local_uid = state.uids.assign(&local_identity);
        let existing: Vec<Uid> = room
            .remote_participants()
            .values()
            .map(|p| state.uids.assign(&p.identity().to_string()))
            .collect();
        (local_uid, existing)
    };

    ctx.events.send(EngineEvent::JoinSucceeded {
        channel: ctx.channel.clone(),
        uid: local_uid,
        elapsed: ctx.started.elapsed(),
    });
    for uid in existing {
        ctx.events.send(EngineEvent::UserJoined { uid, elapsed: ctx.started.elapsed() });
    }

    publish_local_tracks(&room, &ctx).await;

    while let Some(event) = room_events.recv().await {
        match event {
            RoomEvent::ParticipantConnected(participant) => {
                let uid = ctx.shared.lock().uids.assign(&participant.identity().to_string());
                tracing::info!(uid, "participant connected");
                ctx.events.send(EngineEvent::UserJoined { uid, elapsed: ctx.started.elapsed() });
            }

            RoomEvent::ParticipantDisconnected(participant) => {
                let identity = participant.identity().to_string();
                let removed = {
                    let mut state = ctx.shared.lock();
                    let uid = state.uids.remove(&identity);
                    if let Some(uid) = uid {
                        state.drop_participant(uid);
                    }
                    uid
                };
                if let Some(uid) = removed {
                    tracing::info!(uid, "participant disconnected");
                    ctx.events.send(EngineEvent::UserOffline { uid, reason: OfflineReason::Quit });
                }
            }

            RoomEvent::TrackSubscribed { track, participant, .. } => {
                let identity = participant.identity().to_string();
                match track {
                    RemoteTrack::Video(video_track) => {
                        if !(ctx.video_enabled && ctx.options.auto_subscribe_video) {
                            continue;
                        }
                        let mut state = ctx.shared.lock();
                        let uid = state.uids.assign(&identity);
                        state.video_tracks.insert(uid, video_track);
                        state.start_rendering(uid, &ctx.rt, &ctx.renderer);
                    }
                    RemoteTrack::Audio(audio_track) => {
                        if !ctx.options.auto_subscribe_audio {
                            continue;
                        }
                        let sid = audio_track.sid().to_string();
                        let mut stream = NativeAudioStream::new(
                            audio_track.rtc_track(),
                            PLAYOUT_SAMPLE_RATE as i32,
                            PLAYOUT_CHANNELS as i32,
                        );
                        let playout = ctx.playout.clone();
                        let track_sid = sid.clone();
                        let handle = ctx.rt.spawn(async move {
                            tracing::info!("audio playout started for track {track_sid}");
                            while let Some(frame) = stream.next().await {
                                playout.push(&frame.data);
                            }
                            tracing::info!("audio playout ended for track {track_sid}");
                        });
                        ctx.shared.lock().audio_tasks.insert(sid, handle);
                    }
                }
            }

            RoomEvent::TrackUnsubscribed { track, participant, .. } => match track {
                RemoteTrack::Video(_) => {
                    let mut state = ctx.shared.lock();
                    if let Some(uid) = state.uids.get(&participant.identity().to_string()) {
                        state.drop_participant(uid);
                    }
                }
                RemoteTrack::Audio(audio_track) => {
                    let sid = audio_track.sid().to_string();
                    if let Some(handle) = ctx.shared.lock().audio_tasks.remove(&sid) {
                        handle.abort();
                    }
                }
            },

            RoomEvent::Disconnected { reason } => {
                tracing::info!("room disconnected: {reason:?}");
                break;
            }

            _ => {}
        }
    }

    let remaining = ctx.shared.lock().close(local_uid);
    for uid in remaining {
        ctx.events.send(EngineEvent::UserOffline { uid, reason: OfflineReason::Dropped });
    }
    ctx.capture.set_camera(None);
    ctx.capture.set_microphone(None);
    ctx.playout.clear();
    *ctx.room.lock().await = None;
    tracing::info!("session event loop exited");
}

async fn publish_local_tracks(room: &Room, ctx: &SessionContext) {
    if ctx.options.client_role == ClientRole::Audience {
        tracing::info!("audience role, nothing to publish");
        return;
    }

    if ctx.options.publish_microphone_track {
        let source = NativeAudioSource::new(
            AudioSourceOptions {
                echo_cancellation: true,
                noise_suppression: true,
                auto_gain_control: true,
            },
            PLAYOUT_SAMPLE_RATE,
            PLAYOUT_CHANNELS,
            100,
        );
        let track =
            LocalAudioTrack::create_audio_track("microphone", RtcAudioSource::Native(source.clone()));
        let published = room
            .local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: LkTrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await;
        match published {
            Ok(_) => ctx.capture.set_microphone(Some(source)),
            Err(e) => tracing::error!("failed to publish microphone: {e}"),
        }
    }

    if ctx.options.publish_camera_track && ctx.video_enabled {
        let source = NativeVideoSource::new(
            VideoResolution {
                width: CAMERA_WIDTH,
                height: CAMERA_HEIGHT,
            },
            false,
        );
        let track =
            LocalVideoTrack::create_video_track("camera", RtcVideoSource::Native(source.clone()));
        let published = room
            .local_participant()
            .publish_track(
                LocalTrack::Video(track),
                TrackPublishOptions {
                    source: LkTrackSource::Camera,
                    ..Default::default()
                },
            )
            .await;
        match published {
            Ok(_) => ctx.capture.set_camera(Some(source)),
            Err(e) => tracing::error!("failed to publish camera: {e}"),
        }
    }
}

//! UniFFI bindings for quickstart-core.
//!
//! Exposes a QuickstartClient that owns the call screen, the UI task queue
//! and the LiveKit-backed engine factory. The native shell forwards its
//! activity callbacks and drains UI tasks on its main thread whenever the
//! waker fires.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quickstart_core::livekit_engine::{CaptureFeed, LiveKitEngineFactory};
use quickstart_core::{
    CallScreen, Credentials, EventAdapter, FrameRenderer, I420Frame, Permission, PermissionHost,
    PlayoutBuffer, RenderMode, SettingsStore, SurfaceHost, SurfaceId, UiQueue,
};

uniffi::include_scaffolding!("quickstart");

// ── Android WebRTC initialization ────────────────────────────────────
//
// Called from Kotlin after System.loadLibrary and before the first client is
// created. libwebrtc needs the application class loader, which is not
// available inside JNI_OnLoad.

#[cfg(target_os = "android")]
#[unsafe(no_mangle)]
pub extern "C" fn Java_io_quickstart_QuickstartApplication_nativeInitWebrtc(
    env: *mut std::ffi::c_void,
    _class: *mut std::ffi::c_void,
) {
    let Ok(env) = (unsafe { jni::JNIEnv::from_raw(env as *mut jni::sys::JNIEnv) }) else {
        tracing::error!("nativeInitWebrtc: invalid JNIEnv");
        return;
    };
    let Ok(jvm) = env.get_java_vm() else {
        tracing::error!("nativeInitWebrtc: failed to get JavaVM");
        return;
    };

    libwebrtc::android::initialize_android(&jvm);

    // Dropping the JavaVM would call DestroyJavaVM.
    std::mem::forget(jvm);
    tracing::info!("WebRTC initialized");
}

// ── Namespace functions ──────────────────────────────────────────────

const DEFAULT_LOG_FILTER: &str = "quickstart_core=debug,quickstart_ffi=debug";

/// Install the tracing subscriber. Safe to call more than once; only the
/// first call has an effect. `RUST_LOG` wins over the default filter.
fn init_logging() {
    install_logging(None);
}

fn install_logging(filter: Option<&str>) {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let fallback = filter.unwrap_or(DEFAULT_LOG_FILTER);
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .try_init();
    });
}

fn required_permissions(sdk_int: u32) -> Vec<String> {
    quickstart_core::permissions::required_permissions(sdk_int)
        .into_iter()
        .map(|p| p.manifest_name().to_string())
        .collect()
}

fn permission_request_code() -> i32 {
    quickstart_core::PERMISSION_REQUEST_CODE
}

// ── FFI-safe type conversions ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoContainer {
    Local,
    Remote,
}

impl From<quickstart_core::VideoContainer> for VideoContainer {
    fn from(c: quickstart_core::VideoContainer) -> Self {
        match c {
            quickstart_core::VideoContainer::Local => Self::Local,
            quickstart_core::VideoContainer::Remote => Self::Remote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Active,
    Destroyed,
}

impl From<quickstart_core::LifecycleState> for LifecycleState {
    fn from(s: quickstart_core::LifecycleState) -> Self {
        match s {
            quickstart_core::LifecycleState::Uninitialized => Self::Uninitialized,
            quickstart_core::LifecycleState::Active => Self::Active,
            quickstart_core::LifecycleState::Destroyed => Self::Destroyed,
        }
    }
}

// ── Error conversion ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum QuickstartError {
    #[error("Configuration error: {msg}")]
    Config { msg: String },
    #[error("Engine creation failed: {msg}")]
    EngineCreation { msg: String },
    #[error("Engine error: {msg}")]
    Engine { msg: String },
    #[error("Lifecycle error: {msg}")]
    Lifecycle { msg: String },
    #[error("Engine not active: {msg}")]
    NotActive { msg: String },
}

impl From<quickstart_core::QuickstartError> for QuickstartError {
    fn from(e: quickstart_core::QuickstartError) -> Self {
        tracing::error!("QuickstartError: {e}");
        match e {
            quickstart_core::QuickstartError::Config(msg) => Self::Config { msg },
            quickstart_core::QuickstartError::EngineCreation(msg) => Self::EngineCreation { msg },
            quickstart_core::QuickstartError::Engine(msg) => Self::Engine { msg },
            quickstart_core::QuickstartError::Lifecycle(msg) => Self::Lifecycle { msg },
            quickstart_core::QuickstartError::NotActive(state) => Self::NotActive {
                msg: format!("{state:?}"),
            },
        }
    }
}

// ── Callback interfaces ───────────────────────────────────────────────

/// Native view operations.
///
/// Everything except `render_frame` runs on the thread that called into the
/// client, after the client has released its locks, so implementations may
/// call back into the client (for example `remote_uids` during relayout).
pub trait HostView: Send + Sync {
    fn create_surface(&self, surface_id: u64);
    fn add_to_container(&self, container: VideoContainer, surface_id: u64);
    fn remove_from_container(&self, container: VideoContainer, surface_id: u64);
    fn set_media_overlay(&self, surface_id: u64, overlay: bool);
    fn show_notice(&self, message: String);
    /// Called from engine threads with an RGBA8888 frame.
    fn render_frame(&self, surface_id: u64, width: u32, height: u32, rgba: Vec<u8>);
}

pub trait HostPermissions: Send + Sync {
    /// Answered synchronously while the client is busy. Must not call back
    /// into the client.
    fn is_granted(&self, permission: String) -> bool;
    /// Delivered after the client has released its locks.
    fn request(&self, permissions: Vec<String>, request_code: i32);
}

pub trait UiWaker: Send + Sync {
    /// Schedule `run_pending_ui_tasks` on the UI thread.
    fn wake(&self);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Bridges: FFI callbacks → core traits ──────────────────────────────

/// View call recorded while the screen is locked.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ViewCommand {
    CreateSurface(u64),
    AddToContainer(VideoContainer, u64),
    RemoveFromContainer(VideoContainer, u64),
    SetMediaOverlay(u64, bool),
    ShowNotice(String),
}

type PendingViewCommands = Arc<Mutex<Vec<ViewCommand>>>;

struct ViewBridge {
    pending: PendingViewCommands,
}

impl ViewBridge {
    fn push(&self, command: ViewCommand) {
        lock(&self.pending).push(command);
    }
}

impl SurfaceHost for ViewBridge {
    fn create_surface(&mut self, surface: SurfaceId) {
        self.push(ViewCommand::CreateSurface(surface.0));
    }

    fn add_to_container(&mut self, container: quickstart_core::VideoContainer, surface: SurfaceId) {
        self.push(ViewCommand::AddToContainer(container.into(), surface.0));
    }

    fn remove_from_container(
        &mut self,
        container: quickstart_core::VideoContainer,
        surface: SurfaceId,
    ) {
        self.push(ViewCommand::RemoveFromContainer(container.into(), surface.0));
    }

    fn set_media_overlay(&mut self, surface: SurfaceId, overlay: bool) {
        self.push(ViewCommand::SetMediaOverlay(surface.0, overlay));
    }

    fn show_notice(&mut self, message: &str) {
        self.push(ViewCommand::ShowNotice(message.to_string()));
    }
}

/// Deliver recorded view calls in order. The queue lock is not held while
/// the host runs.
fn replay_view_commands(pending: &Mutex<Vec<ViewCommand>>, view: &dyn HostView) {
    let commands = std::mem::take(&mut *lock(pending));
    for command in commands {
        match command {
            ViewCommand::CreateSurface(id) => view.create_surface(id),
            ViewCommand::AddToContainer(container, id) => view.add_to_container(container, id),
            ViewCommand::RemoveFromContainer(container, id) => {
                view.remove_from_container(container, id)
            }
            ViewCommand::SetMediaOverlay(id, overlay) => view.set_media_overlay(id, overlay),
            ViewCommand::ShowNotice(message) => view.show_notice(message),
        }
    }
}

struct ViewRenderer {
    view: Arc<dyn HostView>,
}

impl FrameRenderer for ViewRenderer {
    fn render(&self, surface: SurfaceId, _mode: RenderMode, frame: &I420Frame) {
        let Some(rgba) = frame.to_rgba() else {
            tracing::debug!(surface = surface.0, "inconsistent frame skipped");
            return;
        };
        // Scaling is left to the host view, which knows the surface size.
        self.view
            .render_frame(surface.0, frame.width, frame.height, rgba);
    }
}

struct PermissionBridge<'a> {
    host: &'a dyn HostPermissions,
    requests: Mutex<Vec<(Vec<String>, i32)>>,
}

impl<'a> PermissionBridge<'a> {
    fn new(host: &'a dyn HostPermissions) -> Self {
        Self {
            host,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Show the prompts requested while the screen was locked.
    fn flush(&self) {
        let requests = std::mem::take(&mut *lock(&self.requests));
        for (names, request_code) in requests {
            self.host.request(names, request_code);
        }
    }
}

impl PermissionHost for PermissionBridge<'_> {
    fn is_granted(&self, permission: Permission) -> bool {
        self.host.is_granted(permission.manifest_name().to_string())
    }

    fn request(&self, permissions: &[Permission], request_code: i32) {
        let names = permissions
            .iter()
            .map(|p| p.manifest_name().to_string())
            .collect();
        lock(&self.requests).push((names, request_code));
    }
}

// ── QuickstartClient: main FFI object ─────────────────────────────────

pub struct QuickstartClient {
    screen: Mutex<CallScreen>,
    view: Arc<dyn HostView>,
    pending_view: PendingViewCommands,
    ui: Mutex<UiQueue<CallScreen>>,
    settings: SettingsStore,
    capture: Arc<CaptureFeed>,
    playout: Arc<PlayoutBuffer>,
    _adapter: tokio::task::JoinHandle<()>,
    rt: tokio::runtime::Runtime,
}

impl QuickstartClient {
    pub fn new(
        data_dir: String,
        sdk_int: u32,
        view: Box<dyn HostView>,
        waker: Box<dyn UiWaker>,
    ) -> Result<Self, QuickstartError> {
        let settings = SettingsStore::new(&data_dir);
        let current = settings.get();
        install_logging(current.log_filter.as_deref());
        tracing::info!(sdk_int, "creating QuickstartClient");

        let rt = tokio::runtime::Runtime::new().map_err(|e| QuickstartError::EngineCreation {
            msg: format!("failed to create tokio runtime: {e}"),
        })?;

        let view: Arc<dyn HostView> = Arc::from(view);
        let factory = LiveKitEngineFactory::new(
            rt.handle().clone(),
            Arc::new(ViewRenderer { view: view.clone() }),
        );
        let capture = factory.capture();
        let playout = factory.playout();

        let pending_view = PendingViewCommands::default();
        let (events_tx, events_rx) = quickstart_core::events::channel();
        let screen = CallScreen::new(
            current,
            sdk_int,
            Box::new(factory),
            Box::new(ViewBridge {
                pending: pending_view.clone(),
            }),
            events_tx,
        );

        let ui = UiQueue::with_waker(Arc::new(move || waker.wake()));
        let adapter = EventAdapter::new(events_rx, ui.handle()).spawn(rt.handle());

        Ok(Self {
            screen: Mutex::new(screen),
            view,
            pending_view,
            ui: Mutex::new(ui),
            settings,
            capture,
            playout,
            _adapter: adapter,
            rt,
        })
    }

    pub fn on_create(&self, permissions: Box<dyn HostPermissions>) -> Result<(), QuickstartError> {
        let bridge = PermissionBridge::new(permissions.as_ref());
        let result = self.with_screen(|screen| screen.on_create(&bridge));
        bridge.flush();
        result.map_err(QuickstartError::from)
    }

    pub fn on_request_permissions_result(
        &self,
        request_code: i32,
        permissions: Box<dyn HostPermissions>,
    ) -> Result<(), QuickstartError> {
        let bridge = PermissionBridge::new(permissions.as_ref());
        let result =
            self.with_screen(|screen| screen.on_request_permissions_result(request_code, &bridge));
        bridge.flush();
        result.map_err(QuickstartError::from)
    }

    /// Run queued engine reactions. Must be called on the UI thread.
    pub fn run_pending_ui_tasks(&self) -> u32 {
        let ran = {
            let mut ui = lock(&self.ui);
            let mut screen = self.screen();
            ui.run_pending(&mut *screen)
        };
        self.flush_view();
        ran as u32
    }

    pub fn on_destroy(&self) {
        self.with_screen(CallScreen::on_destroy);
    }

    /// Persist credentials. They take effect for the next client.
    pub fn set_credentials(&self, app_id: String, channel_name: String, token: String) {
        self.settings.set_credentials(Credentials {
            app_id,
            channel_name,
            token,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_camera_frame(
        &self,
        width: u32,
        height: u32,
        y: Vec<u8>,
        u: Vec<u8>,
        v: Vec<u8>,
        stride_y: u32,
        stride_u: u32,
        stride_v: u32,
        rotation_degrees: u32,
    ) {
        let frame = I420Frame {
            width,
            height,
            y,
            u,
            v,
            stride_y,
            stride_u,
            stride_v,
        };
        if !frame.is_consistent() {
            tracing::warn!(width, height, "malformed camera frame dropped");
            return;
        }
        self.capture.push_camera_frame(&frame, rotation_degrees);
    }

    pub fn push_microphone_frame(&self, samples: Vec<i16>, sample_rate: u32, num_channels: u32) {
        self.rt.block_on(
            self.capture
                .push_microphone_frame(&samples, sample_rate, num_channels),
        );
    }

    /// Decoded remote audio, mono at 48 kHz, padded with silence.
    pub fn pull_playout(&self, num_samples: u32) -> Vec<i16> {
        let mut out = vec![0i16; num_samples as usize];
        self.playout.pull(&mut out);
        out
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.screen().lifecycle_state().into()
    }

    pub fn remote_uids(&self) -> Vec<u32> {
        self.screen().remote_uids()
    }

    fn screen(&self) -> MutexGuard<'_, CallScreen> {
        lock(&self.screen)
    }

    /// Run `f` on the locked screen, then hand the view calls it made to the
    /// host with no lock held.
    fn with_screen<R>(&self, f: impl FnOnce(&mut CallScreen) -> R) -> R {
        let result = f(&mut *self.screen());
        self.flush_view();
        result
    }

    fn flush_view(&self) {
        replay_view_commands(&self.pending_view, self.view.as_ref());
    }
}

impl Drop for QuickstartClient {
    fn drop(&mut self) {
        // Release the engine even if the host never reached onDestroy.
        self.with_screen(CallScreen::on_destroy);
    }
}

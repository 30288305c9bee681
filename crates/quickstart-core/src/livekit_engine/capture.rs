use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::prelude::*;
use livekit::webrtc::video_source::native::NativeVideoSource;

use crate::engine::VideoCanvas;
use crate::video::{FrameRenderer, I420Frame};

#[derive(Default)]
struct CaptureState {
    preview: bool,
    local: Option<VideoCanvas>,
    camera: Option<NativeVideoSource>,
    microphone: Option<NativeAudioSource>,
}

/// Entry point for host-captured camera and microphone data.
///
/// Camera frames go to the local preview surface while the preview runs and
/// to the published camera track once one exists. Frames arriving with
/// neither are dropped.
pub struct CaptureFeed {
    state: Mutex<CaptureState>,
    renderer: Arc<dyn FrameRenderer>,
}

impl CaptureFeed {
    pub fn new(renderer: Arc<dyn FrameRenderer>) -> Self {
        Self {
            state: Mutex::new(CaptureState::default()),
            renderer,
        }
    }

    pub fn push_camera_frame(&self, frame: &I420Frame, rotation_degrees: u32) {
        let (preview, camera) = {
            let state = self.lock();
            let preview = if state.preview { state.local } else { None };
            (preview, state.camera.clone())
        };

        if let Some(canvas) = preview {
            self.renderer.render(canvas.surface, canvas.render_mode, frame);
        }

        if let Some(source) = camera {
            let rotation = match rotation_degrees {
                90 => VideoRotation::VideoRotation90,
                180 => VideoRotation::VideoRotation180,
                270 => VideoRotation::VideoRotation270,
                _ => VideoRotation::VideoRotation0,
            };
            let video_frame = VideoFrame {
                rotation,
                timestamp_us: 0,
                buffer: copy_to_buffer(frame),
            };
            source.capture_frame(&video_frame);
        }
    }

    pub async fn push_microphone_frame(&self, samples: &[i16], sample_rate: u32, num_channels: u32) {
        let Some(source) = self.lock().microphone.clone() else {
            return;
        };
        let channels = num_channels.max(1);
        let frame = AudioFrame {
            data: samples.into(),
            sample_rate,
            num_channels: channels,
            samples_per_channel: samples.len() as u32 / channels,
        };
        if let Err(e) = source.capture_frame(&frame).await {
            tracing::debug!("microphone frame rejected: {e}");
        }
    }

    pub fn is_previewing(&self) -> bool {
        self.lock().preview
    }

    pub(crate) fn set_local_canvas(&self, canvas: Option<VideoCanvas>) {
        self.lock().local = canvas;
    }

    pub(crate) fn set_preview(&self, on: bool) {
        self.lock().preview = on;
    }

    pub(crate) fn set_camera(&self, source: Option<NativeVideoSource>) {
        self.lock().camera = source;
    }

    pub(crate) fn set_microphone(&self, source: Option<NativeAudioSource>) {
        self.lock().microphone = source;
    }

    /// Forget everything tied to one engine instance.
    pub(crate) fn reset(&self) {
        *self.lock() = CaptureState::default();
    }

    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn copy_to_buffer(frame: &I420Frame) -> I420Buffer {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let chroma_w = width.div_ceil(2);
    let chroma_h = height.div_ceil(2);

    let mut buffer = I420Buffer::new(frame.width, frame.height);
    let (dst_sy, dst_su, dst_sv) = buffer.strides();
    let (y_dst, u_dst, v_dst) = buffer.data_mut();

    copy_plane(&frame.y, frame.stride_y as usize, y_dst, dst_sy as usize, width, height);
    copy_plane(&frame.u, frame.stride_u as usize, u_dst, dst_su as usize, chroma_w, chroma_h);
    copy_plane(&frame.v, frame.stride_v as usize, v_dst, dst_sv as usize, chroma_w, chroma_h);
    buffer
}

fn copy_plane(src: &[u8], src_stride: usize, dst: &mut [u8], dst_stride: usize, w: usize, h: usize) {
    for row in 0..h {
        let s = row * src_stride;
        let d = row * dst_stride;
        dst[d..d + w].copy_from_slice(&src[s..s + w]);
    }
}

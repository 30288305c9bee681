//! Per-participant frame loops for remote video.

use std::sync::Arc;

use futures_util::StreamExt;
use livekit::prelude::RemoteVideoTrack;
use livekit::webrtc::prelude::BoxVideoFrame;
use livekit::webrtc::video_stream::native::NativeVideoStream;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::VideoCanvas;
use crate::events::Uid;
use crate::video::{FrameRenderer, I420Frame};

/// Running frame loop. Cancelled by `stop`.
pub(crate) struct RenderTask {
    cancel_tx: watch::Sender<bool>,
    _handle: JoinHandle<()>,
}

impl RenderTask {
    pub(crate) fn spawn(
        rt: &Handle,
        uid: Uid,
        canvas: VideoCanvas,
        track: RemoteVideoTrack,
        renderer: Arc<dyn FrameRenderer>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = rt.spawn(frame_loop(uid, canvas, track, renderer, cancel_rx));
        Self {
            cancel_tx,
            _handle: handle,
        }
    }

    pub(crate) fn stop(self) {
        let _ = self.cancel_tx.send(true);
    }
}

async fn frame_loop(
    uid: Uid,
    canvas: VideoCanvas,
    track: RemoteVideoTrack,
    renderer: Arc<dyn FrameRenderer>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    tracing::info!(uid, surface = canvas.surface.0, "frame loop started");
    let mut stream = NativeVideoStream::new(track.rtc_track());
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel_rx.changed() => {
                tracing::info!(uid, "frame loop cancelled");
                break;
            }
            next = stream.next() => {
                let Some(frame) = next else {
                    tracing::info!(uid, "video stream ended");
                    break;
                };
                frames += 1;
                if frames == 1 {
                    tracing::info!(
                        uid,
                        width = frame.buffer.width(),
                        height = frame.buffer.height(),
                        "first remote frame"
                    );
                }
                let Some(converted) = to_i420_frame(&frame) else {
                    continue;
                };
                renderer.render(canvas.surface, canvas.render_mode, &converted);
            }
        }
    }

    tracing::info!(uid, frames, "frame loop exited");
}

fn to_i420_frame(frame: &BoxVideoFrame) -> Option<I420Frame> {
    let buffer = &frame.buffer;
    if buffer.width() == 0 || buffer.height() == 0 {
        return None;
    }
    let i420 = buffer.to_i420();
    let (y, u, v) = i420.data();
    let (stride_y, stride_u, stride_v) = i420.strides();
    Some(I420Frame {
        width: buffer.width(),
        height: buffer.height(),
        y: y.to_vec(),
        u: u.to_vec(),
        v: v.to_vec(),
        stride_y,
        stride_u,
        stride_v,
    })
}
